// src/dedup.rs
//! Seen-post tracking: an in-process cache in front of an optional persisted
//! table (`sql/scout_seen_posts.sql`, served through Supabase/PostgREST).
//!
//! Check-then-mark is not atomic; the table's UNIQUE(source, external_id)
//! plus merge-on-conflict upserts absorb racing writers.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::ingest::types::{Post, Source};
use crate::scoring::{PainPoint, ScoredPost};

pub const SEEN_TABLE: &str = "scout_seen_posts";
const STORE_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Row written once per unique post that cleared the threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeenRecord {
    pub source: Source,
    pub external_id: String,
    pub url: String,
    pub title: String,
    pub matched_pain_points: BTreeSet<PainPoint>,
    pub relevance_score: f64,
    pub notified: bool,
    pub created_at: DateTime<Utc>,
}

impl SeenRecord {
    pub fn from_scored(scored: &ScoredPost, notified: bool, now: DateTime<Utc>) -> Self {
        Self {
            source: scored.post.source,
            external_id: scored.post.external_id.clone(),
            url: scored.post.url.clone(),
            title: scored.post.title.clone(),
            matched_pain_points: scored.matched_pain_points.clone(),
            relevance_score: scored.score,
            notified,
            created_at: now,
        }
    }
}

/// Persistence backend behind the dedup cache.
#[async_trait::async_trait]
pub trait SeenStore: Send + Sync {
    fn name(&self) -> &'static str;
    async fn exists(&self, source: Source, external_id: &str) -> Result<bool>;
    /// Insert or merge; a duplicate key must not be an error.
    async fn upsert(&self, record: &SeenRecord) -> Result<()>;
}

/// Backend used when no database is configured: remembers nothing itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryOnlyStore;

#[async_trait::async_trait]
impl SeenStore for MemoryOnlyStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn exists(&self, _source: Source, _external_id: &str) -> Result<bool> {
        Ok(false)
    }

    async fn upsert(&self, _record: &SeenRecord) -> Result<()> {
        Ok(())
    }
}

/// PostgREST client for the `scout_seen_posts` table.
pub struct SupabaseSeenStore {
    base_url: String,
    key: String,
    client: reqwest::Client,
}

impl SupabaseSeenStore {
    pub fn new(base_url: &str, key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(STORE_HTTP_TIMEOUT)
            .build()
            .context("building supabase http client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, SEEN_TABLE)
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.header("apikey", &self.key).bearer_auth(&self.key)
    }
}

#[async_trait::async_trait]
impl SeenStore for SupabaseSeenStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn exists(&self, source: Source, external_id: &str) -> Result<bool> {
        let source_eq = format!("eq.{}", source.as_str());
        let id_eq = format!("eq.{external_id}");
        let resp = self
            .authed(self.client.get(self.table_url()))
            .query(&[
                ("select", "id"),
                ("source", source_eq.as_str()),
                ("external_id", id_eq.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await
            .context("supabase select")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("supabase select returned {status}");
        }
        let rows: Vec<serde_json::Value> = resp.json().await.context("supabase select json")?;
        Ok(!rows.is_empty())
    }

    async fn upsert(&self, record: &SeenRecord) -> Result<()> {
        let resp = self
            .authed(self.client.post(self.table_url()))
            .query(&[("on_conflict", "source,external_id")])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(record)
            .send()
            .await
            .context("supabase upsert")?;
        let status = resp.status();
        if !status.is_success() {
            bail!("supabase upsert returned {status}");
        }
        Ok(())
    }
}

/// Dedup facade used by the pipeline. Construct once per process and share.
pub struct DedupStore {
    seen: Mutex<HashSet<(Source, String)>>,
    backend: Arc<dyn SeenStore>,
}

impl DedupStore {
    pub fn new(backend: Arc<dyn SeenStore>) -> Self {
        Self {
            seen: Mutex::new(HashSet::new()),
            backend,
        }
    }

    /// Cache only, no persistence.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryOnlyStore))
    }

    /// Pick the backend from configuration: Supabase when both URL and key are
    /// set and the client builds, memory-only otherwise.
    pub fn from_config(supabase_url: Option<&str>, supabase_key: Option<&str>) -> Self {
        match (supabase_url, supabase_key) {
            (Some(url), Some(key)) => match SupabaseSeenStore::new(url, key) {
                Ok(store) => Self::new(Arc::new(store)),
                Err(e) => {
                    tracing::warn!(target: "dedup", error = ?e, "supabase client init failed, using memory only");
                    Self::in_memory()
                }
            },
            _ => Self::in_memory(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn cache_contains(&self, source: Source, external_id: &str) -> bool {
        let seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        seen.contains(&(source, external_id.to_string()))
    }

    fn cache_insert(&self, source: Source, external_id: &str) {
        let mut seen = self.seen.lock().unwrap_or_else(|p| p.into_inner());
        seen.insert((source, external_id.to_string()));
    }

    /// True if `(source, external_id)` was never marked. Backend errors count as new.
    pub async fn is_new(&self, post: &Post) -> bool {
        if self.cache_contains(post.source, &post.external_id) {
            return false;
        }
        match self.backend.exists(post.source, &post.external_id).await {
            Ok(true) => {
                self.cache_insert(post.source, &post.external_id);
                false
            }
            Ok(false) => true,
            Err(e) => {
                tracing::warn!(
                    target: "dedup",
                    backend = self.backend.name(),
                    source = post.source.as_str(),
                    external_id = %post.external_id,
                    error = ?e,
                    "dedup check failed, treating as new"
                );
                true
            }
        }
    }

    /// Record the post as seen. The cache is updated even if persistence fails.
    pub async fn mark_seen(&self, scored: &ScoredPost, notified: bool) {
        let post = &scored.post;
        self.cache_insert(post.source, &post.external_id);

        let record = SeenRecord::from_scored(scored, notified, Utc::now());
        if let Err(e) = self.backend.upsert(&record).await {
            tracing::warn!(
                target: "dedup",
                backend = self.backend.name(),
                source = post.source.as_str(),
                external_id = %post.external_id,
                error = ?e,
                "mark_seen persist failed"
            );
        }
    }

    /// Forget everything cached in-process (persisted rows are untouched).
    pub fn reset(&self) {
        self.seen.lock().unwrap_or_else(|p| p.into_inner()).clear();
    }
}
