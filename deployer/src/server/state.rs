//! Server state

use std::sync::Arc;
use std::time::Duration;

use crate::blob::BlobStore;
use crate::deploy::pipeline::Pipeline;
use crate::jobs::store::JobReader;

/// Server state shared across handlers
pub struct ServerState {
    pub pipeline: Arc<Pipeline>,
    pub jobs: JobReader,
    pub blobs: Arc<dyn BlobStore>,
    pub allowed_hosts: Vec<String>,

    /// Progress stream poll interval
    pub poll_interval: Duration,

    /// SSE keep-alive interval
    pub keep_alive: Duration,
}

impl ServerState {
    pub fn new(
        pipeline: Arc<Pipeline>,
        blobs: Arc<dyn BlobStore>,
        allowed_hosts: Vec<String>,
        poll_interval: Duration,
        keep_alive: Duration,
    ) -> Self {
        Self {
            jobs: JobReader::new(pipeline.jobs()),
            pipeline,
            blobs,
            allowed_hosts,
            poll_interval,
            keep_alive,
        }
    }
}
