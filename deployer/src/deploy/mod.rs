//! Deployment module
//!
//! Source ingestion, project location, framework classification, building and
//! publishing, tied together by the [`pipeline::Pipeline`].

pub mod archive;
pub mod builder;
pub mod classifier;
pub mod fsm;
pub mod git;
pub mod locator;
pub mod naming;
pub mod pipeline;
pub mod publisher;
pub mod runner;
