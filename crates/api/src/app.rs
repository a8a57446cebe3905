//! HTTP surface: liveness and readiness.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use gatekeeper_engine::{AccessEngine, EngineStats};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AccessEngine>,
}

pub fn build_app(engine: Arc<AccessEngine>) -> Router {
    Router::new()
        .route("/", get(|| async { "OK" }))
        .route("/check", get(check))
        .with_state(AppState { engine })
}

/// Readiness + gauges: store reachability, ban count, cache size.
async fn check(State(state): State<AppState>) -> Json<EngineStats> {
    Json(state.engine.stats())
}
