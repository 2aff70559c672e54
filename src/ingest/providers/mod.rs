// src/ingest/providers/mod.rs
//! Source adapters. Each one runs either against the live API (`Mode::Http`)
//! or against captured response bodies (`Mode::Fixture`, one per query).

pub mod github;
pub mod hackernews;
pub mod reddit;
pub mod stackoverflow;

use anyhow::Result;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::ingest::types::{Post, Source};

pub(crate) enum Mode {
    Fixture(Vec<String>),
    Http(reqwest::Client),
}

impl Mode {
    /// Fixture body for the `idx`-th query; queries beyond the captured set see nothing.
    fn fixture(bodies: &[String], idx: usize) -> Option<&str> {
        bodies.get(idx).map(String::as_str)
    }
}

/// Decode raw items one by one so a single malformed entry only drops itself.
pub(crate) fn decode_items<T: DeserializeOwned>(items: Vec<Value>, source: Source) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<T>(v) {
            Ok(it) => Some(it),
            Err(e) => {
                tracing::debug!(target: "ingest", source = source.as_str(), error = %e, "skipping malformed item");
                None
            }
        })
        .collect()
}

/// Adapter boundary: failures become an empty batch plus a warning.
pub(crate) fn swallow_errors(source: Source, res: Result<Vec<Post>>) -> Result<Vec<Post>> {
    match res {
        Ok(posts) => {
            tracing::info!(target: "ingest", source = source.as_str(), count = posts.len(), "collected");
            Ok(posts)
        }
        Err(e) => {
            tracing::warn!(target: "ingest", source = source.as_str(), error = ?e, "collect failed");
            counter!("scout_adapter_errors_total", "source" => source.as_str()).increment(1);
            Ok(Vec::new())
        }
    }
}

/// Reference time for the lookback window; pinned in tests so fixtures stay fresh.
pub(crate) fn reference_now(pinned: Option<DateTime<Utc>>) -> DateTime<Utc> {
    pinned.unwrap_or_else(Utc::now)
}
