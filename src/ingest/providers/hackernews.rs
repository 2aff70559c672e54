// src/ingest/providers/hackernews.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{decode_items, reference_now, swallow_errors, Mode};
use crate::ingest::types::{Post, Source, SourceAdapter};
use crate::ingest::{cutoff_ts, from_unix, normalize_text, source_http_client, BatchIds};

const BASE_URL: &str = "https://hn.algolia.com/api/v1/search_by_date";
const QUERIES: [&str; 3] = ["companies house", "companies-house api", "iXBRL companies house"];

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    hits: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(rename = "objectID")]
    object_id: String,
    created_at_i: i64,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    story_text: Option<String>,
    #[serde(default)]
    comment_text: Option<String>,
    #[serde(default, rename = "_tags")]
    tags: Vec<String>,
}

/// Stories from the Algolia HN search API.
pub struct HackerNewsAdapter {
    mode: Mode,
    lookback_seconds: u64,
    now: Option<DateTime<Utc>>,
}

impl HackerNewsAdapter {
    pub fn from_http(lookback_seconds: u64, user_agent: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http(source_http_client(user_agent)?),
            lookback_seconds,
            now: None,
        })
    }

    /// One captured response body per query, in query order.
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
        let resp: Response = serde_json::from_str(body).context("parsing algolia json")?;
        for hit in decode_items::<Hit>(resp.hits, Source::HackerNews) {
            if hit.object_id.is_empty() || hit.created_at_i < cutoff {
                continue;
            }
            let Some(created_at) = from_unix(hit.created_at_i) else {
                continue;
            };
            if !ids.insert(&hit.object_id) {
                continue;
            }
            let url = hit
                .url
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("https://news.ycombinator.com/item?id={}", hit.object_id));
            let body = hit.story_text.or(hit.comment_text).unwrap_or_default();
            out.push(Post {
                source: Source::HackerNews,
                external_id: hit.object_id,
                url,
                title: normalize_text(hit.title.as_deref().unwrap_or_default()),
                body: normalize_text(&body),
                tags: hit.tags.into_iter().filter(|t| !t.starts_with("author_")).collect(),
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
                        .query(&[("query", *query), ("tags", "story"), ("hitsPerPage", "50")])
                        .send()
                        .await
                        .context("algolia get()")?;
                    let status = resp.status();
                    if !status.is_success() {
                        tracing::warn!(target: "ingest", source = "hackernews", query, %status, "query failed");
                        continue;
                    }
                    let body = resp.text().await.context("algolia .text()")?;
                    self.parse_into(&body, cutoff, &mut ids, &mut out)?;
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for HackerNewsAdapter {
    async fn collect(&self) -> Result<Vec<Post>> {
        swallow_errors(Source::HackerNews, self.fetch().await)
    }

    fn source(&self) -> Source {
        Source::HackerNews
    }

    fn lookback_seconds(&self) -> u64 {
        self.lookback_seconds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_760_000_000;

    #[tokio::test]
    async fn dedups_across_queries_and_builds_fallback_url() {
        let first = serde_json::json!({
            "hits": [
                {
                    "objectID": "4242",
                    "created_at_i": NOW - 30,
                    "title": "Show HN: Companies House graph explorer",
                    "url": null,
                    "story_text": "Director network <i>traversal</i>",
                    "_tags": ["story", "author_jane", "story_4242"]
                }
            ]
        })
        .to_string();
        let second = serde_json::json!({
            "hits": [
                { "objectID": "4242", "created_at_i": NOW - 30, "title": "dup" },
                { "objectID": "7", "created_at_i": "yesterday", "title": "bad ts" }
            ]
        })
        .to_string();

        let a = HackerNewsAdapter::from_fixtures(vec![first, second], 3_600)
            .at(from_unix(NOW).unwrap());
        let posts = a.collect().await.unwrap();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://news.ycombinator.com/item?id=4242");
        assert_eq!(posts[0].body, "Director network traversal");
        assert_eq!(posts[0].tags, vec!["story", "story_4242"]);
    }
}
