//! Integration tests for sitedrop

mod support;
mod test_fsm;
mod test_job_store;
mod test_pipeline;
mod test_router;
mod test_stream;
