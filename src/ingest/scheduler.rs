// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::ingest::types::SourceAdapter;
use crate::pipeline::Pipeline;

/// Adapter plus its poll period.
pub type AdapterJob = (Arc<dyn SourceAdapter>, Duration);

/// Spawn one timer task per adapter. The first run happens one period after
/// start. Ticks that fall due while a run is still going are dropped, so the
/// next run waits for the next tick on the original grid.
pub fn spawn_adapter_schedules(pipeline: Pipeline, jobs: Vec<AdapterJob>) -> Vec<JoinHandle<()>> {
    jobs.into_iter()
        .map(|(adapter, period)| {
            let pipeline = pipeline.clone();
            tokio::spawn(run_schedule(pipeline, adapter, period))
        })
        .collect()
}

/// Timer loop for a single adapter. The run is awaited inline, so the same
/// adapter never has two runs in flight.
pub async fn run_schedule(pipeline: Pipeline, adapter: Arc<dyn SourceAdapter>, period: Duration) {
    let period = period.max(Duration::from_secs(1));
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        target: "ingest",
        adapter = adapter.name(),
        period_secs = period.as_secs(),
        "schedule started"
    );

    let mut last_finished: Option<Instant> = None;
    loop {
        let due = ticker.tick().await;
        // `Skip` still hands back one tick missed during the previous run.
        if last_finished.is_some_and(|finished| due < finished) {
            tracing::debug!(target: "ingest", adapter = adapter.name(), "previous run overran; tick skipped");
            continue;
        }
        let summary = pipeline.run_for_adapter(adapter.as_ref()).await;
        last_finished = Some(Instant::now());
        tracing::debug!(target: "ingest", adapter = adapter.name(), ?summary, "scheduled run finished");
    }
}
