// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Forum/issue tracker a post was collected from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    StackOverflow,
    HackerNews,
    Reddit,
    GitHub,
}

impl Source {
    pub const ALL: [Source; 4] = [
        Source::StackOverflow,
        Source::HackerNews,
        Source::Reddit,
        Source::GitHub,
    ];

    /// Stable lowercase key, used for persistence and metric labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Source::StackOverflow => "stackoverflow",
            Source::HackerNews => "hackernews",
            Source::Reddit => "reddit",
            Source::GitHub => "github",
        }
    }

    /// Human label for chat messages.
    pub fn display_name(self) -> &'static str {
        match self {
            Source::StackOverflow => "Stack Overflow",
            Source::HackerNews => "Hacker News",
            Source::Reddit => "Reddit",
            Source::GitHub => "GitHub",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized forum post. Identity is `(source, external_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    pub source: Source,
    pub external_id: String, // unique per source
    pub url: String,
    pub title: String,
    pub body: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn key(&self) -> (Source, &str) {
        (self.source, self.external_id.as_str())
    }
}

/// A per-source fetcher.
///
/// Concrete adapters swallow their own transport/parse failures and return
/// `Ok(vec![])`; an `Err` reaching the pipeline is treated as a failed cycle.
#[async_trait::async_trait]
pub trait SourceAdapter: Send + Sync {
    async fn collect(&self) -> Result<Vec<Post>>;
    fn source(&self) -> Source;
    fn lookback_seconds(&self) -> u64;

    fn name(&self) -> &'static str {
        self.source().as_str()
    }
}
