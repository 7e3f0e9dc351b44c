//! Incremental movie catalog ingestion.
//!
//! A [`ingest::ResumptionEngine`] pages through the upstream catalog under a
//! page/time budget, stops at the first already-known movie, checkpoints its
//! cursor after every page and writes the new movies oldest first.

pub mod api;
pub mod catalog;
pub mod config;
pub mod database_ops;
pub mod error;
pub mod ingest;
pub mod invalidation;
pub mod models;
pub mod telemetry;

pub mod util {
    pub mod env;
}

pub use config::Config;
pub use error::CrawlError;
pub use ingest::ResumptionEngine;
pub use models::{Movie, ProgressState, RunReport};
