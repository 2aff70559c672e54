// src/ingest/providers/reddit.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{decode_items, reference_now, swallow_errors, Mode};
use crate::ingest::types::{Post, Source, SourceAdapter};
use crate::ingest::{cutoff_ts, from_unix, normalize_text, source_http_client, BatchIds};

const BASE_URL: &str = "https://www.reddit.com/search.json";
const QUERIES: [&str; 3] = [
    "companies house api",
    "companies house iXBRL",
    "companies house rate limit",
];

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    data: ListingData,
}

#[derive(Debug, Default, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct Link {
    id: String,
    created_utc: f64,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    permalink: String,
    #[serde(default)]
    url: String,
}

/// Public JSON search (no OAuth); Reddit only needs a descriptive User-Agent.
pub struct RedditAdapter {
    mode: Mode,
    lookback_seconds: u64,
    now: Option<DateTime<Utc>>,
}

impl RedditAdapter {
    pub fn from_http(lookback_seconds: u64, user_agent: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http(source_http_client(user_agent)?),
            lookback_seconds,
            now: None,
        })
    }

    pub fn from_fixtures(bodies: Vec<String>, lookback_seconds: u64) -> Self {
        Self {
            mode: Mode::Fixture(bodies),
            lookback_seconds,
            now: None,
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn parse_into(&self, body: &str, cutoff: i64, ids: &mut BatchIds, out: &mut Vec<Post>) -> Result<()> {
        let listing: Listing = serde_json::from_str(body).context("parsing reddit json")?;
        let raw = listing.data.children.into_iter().map(|c| c.data).collect();
        for link in decode_items::<Link>(raw, Source::Reddit) {
            let created = link.created_utc as i64;
            if link.id.is_empty() || created < cutoff {
                continue;
            }
            let Some(created_at) = from_unix(created) else {
                continue;
            };
            if !ids.insert(&link.id) {
                continue;
            }
            let url = if link.permalink.is_empty() {
                link.url
            } else {
                format!("https://www.reddit.com{}", link.permalink)
            };
            let tags = if link.subreddit.is_empty() {
                Vec::new()
            } else {
                vec![link.subreddit]
            };
            out.push(Post {
                source: Source::Reddit,
                external_id: link.id,
                url,
                title: normalize_text(&link.title),
                body: normalize_text(&link.selftext),
                tags,
                created_at,
            });
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<Vec<Post>> {
        let cutoff = cutoff_ts(reference_now(self.now), self.lookback_seconds);
        let mut ids = BatchIds::default();
        let mut out = Vec::new();

        for (idx, query) in QUERIES.iter().enumerate() {
            match &self.mode {
                Mode::Fixture(bodies) => {
                    if let Some(b) = Mode::fixture(bodies, idx) {
                        self.parse_into(b, cutoff, &mut ids, &mut out)?;
                    }
                }
                Mode::Http(client) => {
                    let resp = client
                        .get(BASE_URL)
                        .query(&[("q", *query), ("sort", "new"), ("type", "link"), ("limit", "25")])
                        .send()
                        .await
                        .context("reddit get()")?;
                    let status = resp.status();
                    if !status.is_success() {
                        tracing::warn!(target: "ingest", source = "reddit", query, %status, "query failed");
                        continue;
                    }
                    let body = resp.text().await.context("reddit .text()")?;
                    self.parse_into(&body, cutoff, &mut ids, &mut out)?;
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for RedditAdapter {
    async fn collect(&self) -> Result<Vec<Post>> {
        swallow_errors(Source::Reddit, self.fetch().await)
    }

    fn source(&self) -> Source {
        Source::Reddit
    }

    fn lookback_seconds(&self) -> u64 {
        self.lookback_seconds
    }
}
