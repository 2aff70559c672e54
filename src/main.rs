//! CH scout service entrypoint.
//! Serves `/health` (and `/metrics`) and runs the per-source poll timers
//! in the background for the lifetime of the process.

use shuttle_axum::ShuttleAxum;

use ch_scout_agent::api::{self, AppState};
use ch_scout_agent::bootstrap::ScoutRuntime;
use ch_scout_agent::config::Settings;
use ch_scout_agent::logging::init_tracing;
use ch_scout_agent::metrics::Metrics;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    let settings = Settings::from_env();
    init_tracing(&settings);
    settings.log_warnings();

    let metrics = match Metrics::init(&settings) {
        Ok(m) => Some(m),
        Err(e) => {
            tracing::warn!(target: "startup", error = ?e, "metrics disabled");
            None
        }
    };

    let state = AppState {
        environment: settings.app_env.clone(),
    };

    let runtime = ScoutRuntime::from_settings(settings)?;
    // Timer tasks are detached; they live as long as the runtime.
    let _schedules = runtime.start_schedules();

    let mut router = api::create_router(state);
    if let Some(m) = &metrics {
        router = router.merge(m.router());
    }

    Ok(router.into())
}
