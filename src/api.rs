use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

pub const SERVICE_NAME: &str = "ch-scout-agent";

#[derive(Clone)]
pub struct AppState {
    pub environment: String,
}

#[derive(Debug, Serialize)]
struct HealthResp {
    status: &'static str,
    service: &'static str,
    environment: String,
}

/// Public router. `/metrics` is merged in by the caller when a recorder exists.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(state)
}

// Shorthand used by bins and tests.
pub use create_router as router;

async fn health(State(state): State<AppState>) -> Json<HealthResp> {
    Json(HealthResp {
        status: "ok",
        service: SERVICE_NAME,
        environment: state.environment,
    })
}
