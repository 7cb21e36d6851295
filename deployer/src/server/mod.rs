//! HTTP API and site serving

pub mod handlers;
pub mod serve;
pub mod state;
