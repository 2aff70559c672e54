// src/ingest/providers/github.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::{decode_items, reference_now, swallow_errors, Mode};
use crate::ingest::types::{Post, Source, SourceAdapter};
use crate::ingest::{cutoff_ts, from_unix, normalize_text, source_http_client, BatchIds};

const BASE_URL: &str = "https://api.github.com/search/issues";
const QUERIES: [&str; 3] = [
    "companies house api",
    "companies house xbrl",
    "companies house rate limit",
];

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Issue {
    id: u64,
    created_at: String,
    #[serde(default)]
    html_url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    labels: Vec<Value>,
}

fn parse_rfc3339_to_unix(ts: &str) -> Option<i64> {
    OffsetDateTime::parse(ts, &Rfc3339)
        .ok()
        .map(|dt| dt.unix_timestamp())
}

/// Issues from the GitHub search API (token optional, raises the rate limit).
pub struct GitHubIssuesAdapter {
    mode: Mode,
    token: Option<String>,
    lookback_seconds: u64,
    now: Option<DateTime<Utc>>,
}

impl GitHubIssuesAdapter {
    pub fn from_http(lookback_seconds: u64, token: Option<String>, user_agent: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http(source_http_client(user_agent)?),
            token,
            lookback_seconds,
            now: None,
        })
    }

    pub fn from_fixtures(bodies: Vec<String>, lookback_seconds: u64) -> Self {
        Self {
            mode: Mode::Fixture(bodies),
            token: None,
            lookback_seconds,
            now: None,
        }
    }

    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn parse_into(&self, body: &str, cutoff: i64, ids: &mut BatchIds, out: &mut Vec<Post>) -> Result<()> {
        let resp: Response = serde_json::from_str(body).context("parsing github search json")?;
        for issue in decode_items::<Issue>(resp.items, Source::GitHub) {
            let Some(created) = parse_rfc3339_to_unix(&issue.created_at) else {
                continue;
            };
            if created < cutoff {
                continue;
            }
            let Some(created_at) = from_unix(created) else {
                continue;
            };
            let id = issue.id.to_string();
            if !ids.insert(&id) {
                continue;
            }
            let tags = issue
                .labels
                .iter()
                .filter_map(|l| l.get("name").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            out.push(Post {
                source: Source::GitHub,
                external_id: id,
                url: issue.html_url,
                title: issue.title,
                body: normalize_text(issue.body.as_deref().unwrap_or_default()),
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
                    let q = format!("{query} is:issue");
                    let mut req = client
                        .get(BASE_URL)
                        .header("Accept", "application/vnd.github+json")
                        .header("X-GitHub-Api-Version", "2022-11-28")
                        .query(&[
                            ("q", q.as_str()),
                            ("sort", "created"),
                            ("order", "desc"),
                            ("per_page", "30"),
                        ]);
                    if let Some(token) = &self.token {
                        req = req.bearer_auth(token);
                    }
                    let resp = req.send().await.context("github get()")?;
                    let status = resp.status();
                    if !status.is_success() {
                        tracing::warn!(target: "ingest", source = "github", query, %status, "query failed");
                        continue;
                    }
                    let body = resp.text().await.context("github .text()")?;
                    self.parse_into(&body, cutoff, &mut ids, &mut out)?;
                }
            }
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for GitHubIssuesAdapter {
    async fn collect(&self) -> Result<Vec<Post>> {
        swallow_errors(Source::GitHub, self.fetch().await)
    }

    fn source(&self) -> Source {
        Source::GitHub
    }

    fn lookback_seconds(&self) -> u64 {
        self.lookback_seconds
    }
}
