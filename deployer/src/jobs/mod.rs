//! Deployment job tracking
//!
//! The store owns every job's state; the pipeline writes through a [`store::JobWriter`]
//! and progress streams read through a [`store::JobReader`].

pub mod model;
pub mod store;
pub mod stream;
