// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod bootstrap;
pub mod config;
pub mod dedup;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod notify;
pub mod pipeline;
pub mod scoring;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::dedup::DedupStore;
pub use crate::ingest::types::{Post, Source, SourceAdapter};
pub use crate::notify::NotifierMux;
pub use crate::pipeline::{Pipeline, RunSummary};
pub use crate::scoring::{PainPoint, ScoredPost, ScoringEngine};
