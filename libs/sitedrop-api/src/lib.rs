//! Wire models for the sitedrop deployment API
//!
//! Shared between the server and anything that talks to it.

pub mod models;

pub use models::*;
