// tests/metrics.rs
//
// One test per process: the Prometheus recorder is global.

use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use ch_scout_agent::api::{self, AppState};
use ch_scout_agent::config::Settings;
use ch_scout_agent::metrics::Metrics;
use ch_scout_agent::ingest::providers::stackoverflow::StackOverflowAdapter;
use ch_scout_agent::{DedupStore, NotifierMux, Pipeline, ScoringEngine, SourceAdapter};

#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_series() {
    let settings = Settings::default();
    let metrics = Metrics::init(&settings).expect("install recorder");
    assert!(Metrics::init(&settings).is_err(), "second install must fail, not panic");

    let now = chrono::DateTime::from_timestamp(1_759_320_000, 0).unwrap();
    let adapter: Arc<dyn SourceAdapter> = Arc::new(
        StackOverflowAdapter::from_fixture(include_str!("fixtures/stackoverflow.json"), 86_400).at(now),
    );
    let pipeline = Pipeline::new(
        ScoringEngine::embedded().unwrap(),
        DedupStore::in_memory(),
        NotifierMux::new(vec![], "x"),
        0.5,
    );
    pipeline.run_all_adapters(&[adapter]).await;

    let app = api::router(AppState {
        environment: "test".into(),
    })
    .merge(metrics.router());

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "scout_min_relevance_score",
        "scout_posts_collected_total{source=\"stackoverflow\"} 2",
        "scout_posts_above_threshold_total{source=\"stackoverflow\"} 1",
        "scout_posts_new_total{source=\"stackoverflow\"} 1",
        "scout_pipeline_last_run_ts",
    ] {
        assert!(text.contains(needle), "missing `{needle}` in:\n{text}");
    }
}
