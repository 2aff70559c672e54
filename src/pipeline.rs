// src/pipeline.rs
//! collect -> score -> threshold -> dedup -> notify -> mark seen, per adapter.

use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::sync::Arc;

use crate::dedup::DedupStore;
use crate::ingest::types::{Source, SourceAdapter};
use crate::notify::NotifierMux;
use crate::scoring::ScoringEngine;

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("scout_posts_collected_total", "Posts returned by adapters.");
        describe_counter!(
            "scout_posts_above_threshold_total",
            "Posts scoring at or above MIN_RELEVANCE_SCORE."
        );
        describe_counter!("scout_posts_new_total", "Above-threshold posts not seen before.");
        describe_counter!(
            "scout_notifications_sent_total",
            "Posts delivered to at least one channel."
        );
        describe_counter!("scout_adapter_errors_total", "Adapter collect failures.");
        describe_counter!(
            "scout_notify_channel_failures_total",
            "Per-channel delivery failures."
        );
        describe_gauge!(
            "scout_pipeline_last_run_ts",
            "Unix ts when the pipeline last ran for a source."
        );
    });
}

/// Counters for one adapter run. `collected` is always the raw fetch count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub source: Source,
    pub collected: usize,
    pub above_threshold: usize,
    pub new: usize,
    pub notified: usize,
}

impl RunSummary {
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            collected: 0,
            above_threshold: 0,
            new: 0,
            notified: 0,
        }
    }
}

/// Shared, cheaply clonable orchestrator. The dedup store inside lives as long
/// as the process and is the only state shared between adapter runs.
#[derive(Clone)]
pub struct Pipeline {
    scorer: Arc<ScoringEngine>,
    dedup: Arc<DedupStore>,
    notifier: Arc<NotifierMux>,
    min_score: f64,
}

impl Pipeline {
    pub fn new(scorer: ScoringEngine, dedup: DedupStore, notifier: NotifierMux, min_score: f64) -> Self {
        Self {
            scorer: Arc::new(scorer),
            dedup: Arc::new(dedup),
            notifier: Arc::new(notifier),
            min_score,
        }
    }

    pub fn dedup(&self) -> &DedupStore {
        &self.dedup
    }

    pub fn min_score(&self) -> f64 {
        self.min_score
    }

    pub async fn run_for_adapter(&self, adapter: &dyn SourceAdapter) -> RunSummary {
        ensure_metrics_described();
        let source = adapter.source();
        let mut summary = RunSummary::empty(source);

        let posts = match adapter.collect().await {
            Ok(posts) => posts,
            Err(e) => {
                tracing::error!(target: "pipeline", adapter = adapter.name(), error = ?e, "collect failed");
                counter!("scout_adapter_errors_total", "source" => source.as_str()).increment(1);
                return summary;
            }
        };
        summary.collected = posts.len();

        for post in &posts {
            let scored = self.scorer.score(post);
            if scored.score < self.min_score {
                continue;
            }
            summary.above_threshold += 1;

            if !self.dedup.is_new(post).await {
                continue;
            }
            summary.new += 1;

            let delivered = self.notifier.send(&scored).await;
            self.dedup.mark_seen(&scored, delivered).await;
            if delivered {
                summary.notified += 1;
            }
        }

        let label = source.as_str();
        counter!("scout_posts_collected_total", "source" => label).increment(summary.collected as u64);
        counter!("scout_posts_above_threshold_total", "source" => label)
            .increment(summary.above_threshold as u64);
        counter!("scout_posts_new_total", "source" => label).increment(summary.new as u64);
        counter!("scout_notifications_sent_total", "source" => label).increment(summary.notified as u64);
        gauge!("scout_pipeline_last_run_ts", "source" => label).set(chrono::Utc::now().timestamp() as f64);

        tracing::info!(
            target: "pipeline",
            adapter = adapter.name(),
            collected = summary.collected,
            above_threshold = summary.above_threshold,
            new = summary.new,
            notified = summary.notified,
            "run complete"
        );
        summary
    }

    /// Run every adapter as its own task. A run that panics reports zeros and
    /// does not affect the others. Output order follows `adapters`.
    pub async fn run_all_adapters(&self, adapters: &[Arc<dyn SourceAdapter>]) -> Vec<RunSummary> {
        let handles: Vec<_> = adapters
            .iter()
            .map(|adapter| {
                let pipeline = self.clone();
                let adapter = Arc::clone(adapter);
                let source = adapter.source();
                let handle = tokio::spawn(async move { pipeline.run_for_adapter(adapter.as_ref()).await });
                (source, handle)
            })
            .collect();

        let mut out = Vec::with_capacity(handles.len());
        for (source, handle) in handles {
            match handle.await {
                Ok(summary) => out.push(summary),
                Err(e) => {
                    tracing::error!(target: "pipeline", source = source.as_str(), error = %e, "adapter run aborted");
                    out.push(RunSummary::empty(source));
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dedup::{SeenRecord, SeenStore};
    use crate::ingest::types::Post;
    use crate::notify::{Alert, Notifier};
    use anyhow::{bail, Result};
    use chrono::Utc;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn post(id: &str, title: &str) -> Post {
        Post {
            source: Source::StackOverflow,
            external_id: id.into(),
            url: format!("https://stackoverflow.com/q/{id}"),
            title: title.into(),
            body: String::new(),
            tags: vec![],
            created_at: Utc::now(),
        }
    }

    struct StaticAdapter(Vec<Post>);

    #[async_trait::async_trait]
    impl SourceAdapter for StaticAdapter {
        async fn collect(&self) -> Result<Vec<Post>> {
            Ok(self.0.clone())
        }
        fn source(&self) -> Source {
            Source::StackOverflow
        }
        fn lookback_seconds(&self) -> u64 {
            86_400
        }
    }

    struct RaisingAdapter;

    #[async_trait::async_trait]
    impl SourceAdapter for RaisingAdapter {
        async fn collect(&self) -> Result<Vec<Post>> {
            bail!("upstream down")
        }
        fn source(&self) -> Source {
            Source::Reddit
        }
        fn lookback_seconds(&self) -> u64 {
            86_400
        }
    }

    struct PanickingAdapter;

    #[async_trait::async_trait]
    impl SourceAdapter for PanickingAdapter {
        async fn collect(&self) -> Result<Vec<Post>> {
            panic!("adapter bug")
        }
        fn source(&self) -> Source {
            Source::GitHub
        }
        fn lookback_seconds(&self) -> u64 {
            86_400
        }
    }

    /// Backend that records every key it is asked about.
    #[derive(Default)]
    struct RecordingStore {
        checked: Mutex<Vec<String>>,
        written: Mutex<Vec<(String, bool)>>,
    }

    #[async_trait::async_trait]
    impl SeenStore for RecordingStore {
        fn name(&self) -> &'static str {
            "recording"
        }
        async fn exists(&self, _source: Source, external_id: &str) -> Result<bool> {
            self.checked.lock().push(external_id.to_string());
            Ok(false)
        }
        async fn upsert(&self, record: &SeenRecord) -> Result<()> {
            self.written.lock().push((record.external_id.clone(), record.notified));
            Ok(())
        }
    }

    struct CountingNotifier {
        ok: bool,
        sent: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Notifier for CountingNotifier {
        fn name(&self) -> &'static str {
            "counting"
        }
        async fn send(&self, _alert: &Alert) -> Result<()> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.ok {
                Ok(())
            } else {
                bail!("channel down")
            }
        }
    }

    fn pipeline(store: Arc<RecordingStore>, ok: bool, sent: Arc<AtomicUsize>) -> Pipeline {
        let mux = NotifierMux::new(vec![Box::new(CountingNotifier { ok, sent })], "https://api.example.test");
        Pipeline::new(
            ScoringEngine::embedded().unwrap(),
            DedupStore::new(store),
            mux,
            0.5,
        )
    }

    #[tokio::test]
    async fn raising_collector_yields_zero_summary() {
        let sent = Arc::new(AtomicUsize::new(0));
        let p = pipeline(Arc::default(), true, sent.clone());
        let s = p.run_for_adapter(&RaisingAdapter).await;
        assert_eq!(s, RunSummary::empty(Source::Reddit));
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn below_threshold_never_reaches_dedup_or_notify() {
        let store = Arc::new(RecordingStore::default());
        let sent = Arc::new(AtomicUsize::new(0));
        let p = pipeline(store.clone(), true, sent.clone());

        let s = p
            .run_for_adapter(&StaticAdapter(vec![post("1", "Python list comprehension tips")]))
            .await;

        assert_eq!(s.collected, 1);
        assert_eq!(s.above_threshold, 0);
        assert!(store.checked.lock().is_empty());
        assert!(store.written.lock().is_empty());
        assert_eq!(sent.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn new_seen_and_low_posts_are_counted_separately() {
        let store = Arc::new(RecordingStore::default());
        let sent = Arc::new(AtomicUsize::new(0));
        let p = pipeline(store.clone(), true, sent.clone());

        let seen = post("seen", "Companies House iXBRL parsing in python");
        p.dedup().mark_seen(&p.scorer.score(&seen), true).await;
        store.written.lock().clear();

        let adapter = StaticAdapter(vec![
            post("new", "Companies House API 429 rate limit exceeded"),
            seen,
            post("low", "Python list comprehension tips"),
        ]);
        let s = p.run_for_adapter(&adapter).await;

        assert_eq!(
            (s.collected, s.above_threshold, s.new, s.notified),
            (3, 2, 1, 1)
        );
        assert_eq!(sent.load(Ordering::SeqCst), 1);
        assert_eq!(*store.written.lock(), vec![("new".to_string(), true)]);
    }

    #[tokio::test]
    async fn failed_delivery_is_still_marked_seen() {
        let store = Arc::new(RecordingStore::default());
        let sent = Arc::new(AtomicUsize::new(0));
        let p = pipeline(store.clone(), false, sent.clone());
        let adapter = StaticAdapter(vec![post("x", "Companies House API 429 rate limit exceeded")]);

        let first = p.run_for_adapter(&adapter).await;
        assert_eq!((first.new, first.notified), (1, 0));
        assert_eq!(*store.written.lock(), vec![("x".to_string(), false)]);

        let second = p.run_for_adapter(&adapter).await;
        assert_eq!((second.above_threshold, second.new), (1, 0));
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn run_all_isolates_failing_adapters() {
        let sent = Arc::new(AtomicUsize::new(0));
        let p = pipeline(Arc::default(), true, sent.clone());
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![
            Arc::new(PanickingAdapter),
            Arc::new(RaisingAdapter),
            Arc::new(StaticAdapter(vec![post("ok", "Companies House API 429 rate limit exceeded")])),
        ];

        let out = p.run_all_adapters(&adapters).await;

        assert_eq!(out.len(), 3);
        assert_eq!(out[0], RunSummary::empty(Source::GitHub));
        assert_eq!(out[1], RunSummary::empty(Source::Reddit));
        assert_eq!(out[2].notified, 1);
    }
}
