//! Sitedrop Library
//!
//! Core modules for the sitedrop front-end deployment service.

pub mod app;
pub mod blob;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod jobs;
pub mod logs;
pub mod server;
pub mod storage;
pub mod utils;
pub mod workers;
