//! Run every adapter once against the live sources, print one JSON summary
//! per adapter on stdout and exit. Notifications and dedup behave exactly as
//! in the service.

use ch_scout_agent::bootstrap::ScoutRuntime;
use ch_scout_agent::config::Settings;
use ch_scout_agent::logging::init_tracing;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let settings = Settings::from_env();
    init_tracing(&settings);
    settings.log_warnings();

    let runtime = ScoutRuntime::from_settings(settings)?;
    tracing::info!(target: "run_now", adapters = runtime.adapters.len(), "run-now started");

    for summary in runtime.run_now().await {
        println!("{}", serde_json::to_string(&summary)?);
    }
    Ok(())
}
