// src/ingest/mod.rs
pub mod providers;
pub mod scheduler;
pub mod types;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// Upper bound for any single source request.
pub const SOURCE_HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Normalize upstream text: decode entities, strip tags, collapse whitespace.
/// The full text is kept; scoring looks at all of it.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags (Stack Overflow and HN bodies are HTML)
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}

/// Earliest unix timestamp still inside the lookback window.
pub fn cutoff_ts(now: DateTime<Utc>, lookback_seconds: u64) -> i64 {
    let lookback = i64::try_from(lookback_seconds).unwrap_or(i64::MAX);
    now.timestamp().saturating_sub(lookback)
}

/// Convert unix seconds to a UTC timestamp; `None` for out-of-range values.
pub fn from_unix(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

/// Tracks ids already emitted during one collect call (sources return the
/// same item for several queries).
#[derive(Debug, Default)]
pub struct BatchIds(HashSet<String>);

impl BatchIds {
    /// Returns true the first time an id is offered.
    pub fn insert(&mut self, id: &str) -> bool {
        self.0.insert(id.to_string())
    }
}

/// Shared reqwest client for source adapters.
pub fn source_http_client(user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(SOURCE_HTTP_TIMEOUT)
        .user_agent(user_agent)
        .build()
        .context("building source http client")
}
