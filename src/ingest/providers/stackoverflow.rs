// src/ingest/providers/stackoverflow.rs
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use super::{decode_items, reference_now, swallow_errors, Mode};
use crate::ingest::types::{Post, Source, SourceAdapter};
use crate::ingest::{cutoff_ts, from_unix, normalize_text, source_http_client};

const BASE_URL: &str = "https://api.stackexchange.com/2.3/questions";
const TAGS: &str = "companies-house;xbrl;uk-company-api";
const SITE: &str = "stackoverflow";

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    items: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Item {
    question_id: u64,
    creation_date: i64,
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// Recent questions carrying Companies House / XBRL tags.
pub struct StackOverflowAdapter {
    mode: Mode,
    api_key: Option<String>,
    lookback_seconds: u64,
    now: Option<DateTime<Utc>>,
}

impl StackOverflowAdapter {
    pub fn from_http(lookback_seconds: u64, api_key: Option<String>, user_agent: &str) -> Result<Self> {
        Ok(Self {
            mode: Mode::Http(source_http_client(user_agent)?),
            api_key,
            lookback_seconds,
            now: None,
        })
    }

    pub fn from_fixture(body: &str, lookback_seconds: u64) -> Self {
        Self {
            mode: Mode::Fixture(vec![body.to_string()]),
            api_key: None,
            lookback_seconds,
            now: None,
        }
    }

    /// Pin "now" for the lookback filter.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = Some(now);
        self
    }

    fn parse(&self, body: &str) -> Result<Vec<Post>> {
        let resp: Response = serde_json::from_str(body).context("parsing stackexchange json")?;
        let cutoff = cutoff_ts(reference_now(self.now), self.lookback_seconds);

        let mut out = Vec::new();
        for it in decode_items::<Item>(resp.items, Source::StackOverflow) {
            if it.creation_date < cutoff {
                continue;
            }
            let Some(created_at) = from_unix(it.creation_date) else {
                continue;
            };
            out.push(Post {
                source: Source::StackOverflow,
                external_id: it.question_id.to_string(),
                url: it.link,
                title: normalize_text(&it.title),
                body: normalize_text(&it.body),
                tags: it.tags,
                created_at,
            });
        }
        Ok(out)
    }

    async fn fetch(&self) -> Result<Vec<Post>> {
        match &self.mode {
            Mode::Fixture(bodies) => match Mode::fixture(bodies, 0) {
                Some(b) => self.parse(b),
                None => Ok(Vec::new()),
            },
            Mode::Http(client) => {
                let mut params = vec![
                    ("tagged", TAGS.to_string()),
                    ("site", SITE.to_string()),
                    ("order", "desc".to_string()),
                    ("sort", "creation".to_string()),
                    ("filter", "withbody".to_string()),
                    ("pagesize", "50".to_string()),
                ];
                if let Some(key) = &self.api_key {
                    params.push(("key", key.clone()));
                }
                let resp = client
                    .get(BASE_URL)
                    .query(&params)
                    .send()
                    .await
                    .context("stackexchange get()")?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("stackexchange returned {status}");
                }
                let body = resp.text().await.context("stackexchange .text()")?;
                self.parse(&body)
            }
        }
    }
}

#[async_trait]
impl SourceAdapter for StackOverflowAdapter {
    async fn collect(&self) -> Result<Vec<Post>> {
        swallow_errors(Source::StackOverflow, self.fetch().await)
    }

    fn source(&self) -> Source {
        Source::StackOverflow
    }

    fn lookback_seconds(&self) -> u64 {
        self.lookback_seconds
    }
}
