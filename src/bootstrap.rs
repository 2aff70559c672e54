// src/bootstrap.rs
//! Wiring from `Settings` to a runnable scout: adapters, scorer, dedup,
//! notification channels and the pipeline that ties them together.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Settings;
use crate::dedup::DedupStore;
use crate::ingest::providers::{
    github::GitHubIssuesAdapter, hackernews::HackerNewsAdapter, reddit::RedditAdapter,
    stackoverflow::StackOverflowAdapter,
};
use crate::ingest::scheduler::{spawn_adapter_schedules, AdapterJob};
use crate::ingest::types::SourceAdapter;
use crate::notify::NotifierMux;
use crate::pipeline::{Pipeline, RunSummary};
use crate::scoring::ScoringEngine;

pub struct ScoutRuntime {
    pub settings: Settings,
    pub pipeline: Pipeline,
    pub adapters: Vec<Arc<dyn SourceAdapter>>,
}

impl ScoutRuntime {
    pub fn from_settings(settings: Settings) -> Result<Self> {
        let scorer = build_scoring_engine(&settings)?;
        let adapters = build_adapters(&settings)?;
        let dedup = DedupStore::from_config(settings.supabase_url.as_deref(), settings.supabase_key.as_deref());
        let notifier = NotifierMux::from_settings(&settings);

        info!(
            target: "startup",
            env = %settings.app_env,
            dedup_backend = dedup.backend_name(),
            channels = ?notifier.channel_names(),
            min_score = settings.min_relevance_score,
            dev_context_penalty = scorer.dev_context_penalty_enabled(),
            "scout runtime ready"
        );

        let pipeline = Pipeline::new(scorer, dedup, notifier, settings.min_relevance_score);
        Ok(Self {
            settings,
            pipeline,
            adapters,
        })
    }

    /// Adapters paired with their configured poll period.
    pub fn jobs(&self) -> Vec<AdapterJob> {
        self.adapters
            .iter()
            .map(|a| (Arc::clone(a), self.settings.poll_intervals.for_source(a.source())))
            .collect()
    }

    /// Start the per-adapter timers. Skipped when `APP_ENV=test`.
    pub fn start_schedules(&self) -> Vec<JoinHandle<()>> {
        if self.settings.app_env.eq_ignore_ascii_case("test") {
            info!(target: "startup", "APP_ENV=test, scheduler not started");
            return Vec::new();
        }
        let handles = spawn_adapter_schedules(self.pipeline.clone(), self.jobs());
        info!(target: "startup", jobs = handles.len(), "scheduler started");
        handles
    }

    pub async fn run_now(&self) -> Vec<RunSummary> {
        self.pipeline.run_all_adapters(&self.adapters).await
    }
}

/// Load the scoring tables and apply environment overrides.
pub fn build_scoring_engine(settings: &Settings) -> Result<ScoringEngine> {
    let mut engine = ScoringEngine::load(&settings.scoring_config_path).with_context(|| {
        format!(
            "loading scoring config from {}",
            settings.scoring_config_path.display()
        )
    })?;
    if let Some(on) = settings.dev_context_penalty {
        engine = engine.with_dev_context_penalty(on);
    }
    Ok(engine.with_dev_log(settings.scoring_dev_log))
}

/// Live HTTP adapters for every source.
pub fn build_adapters(settings: &Settings) -> Result<Vec<Arc<dyn SourceAdapter>>> {
    let lb = settings.lookback_seconds;
    let ua = settings.reddit_user_agent.as_str();
    let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
        Arc::new(
            StackOverflowAdapter::from_http(lb, settings.stackoverflow_api_key.clone(), ua)
                .context("stackoverflow adapter")?,
        ),
        Arc::new(HackerNewsAdapter::from_http(lb, ua).context("hackernews adapter")?),
        Arc::new(RedditAdapter::from_http(lb, ua).context("reddit adapter")?),
        Arc::new(
            GitHubIssuesAdapter::from_http(lb, settings.github_token.clone(), ua)
                .context("github adapter")?,
        ),
    ];
    Ok(adapters)
}
