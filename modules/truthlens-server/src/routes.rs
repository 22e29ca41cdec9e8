use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;

use truthlens_pipeline::orchestrator::{CombinedOutcome, Orchestrator};

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/run/scrape", post(run_scrape))
        .route("/api/run/analyze", post(run_analyze))
        .layer(TraceLayer::new_for_http())
        .with_state(orchestrator)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// Manual fetch trigger. Runs the fetch stage and, when new articles landed,
/// chains the analysis stage — same path the scheduler takes. Synchronous:
/// the combined statistics are the response body.
async fn run_scrape(State(orchestrator): State<Arc<Orchestrator>>) -> Json<CombinedOutcome> {
    Json(orchestrator.run_fetch_then_analyze().await)
}

#[derive(Debug, Default, Deserialize)]
struct AnalyzeRequest {
    batch_size: Option<usize>,
}

/// Manual analysis trigger, independent of fetching. Accepts an optional
/// `batch_size` query parameter; stages never raise, so the response is
/// always structured.
async fn run_analyze(
    State(orchestrator): State<Arc<Orchestrator>>,
    Query(request): Query<AnalyzeRequest>,
) -> Json<serde_json::Value> {
    let stats = orchestrator.run_analyze(request.batch_size).await;
    Json(json!({
        "status": "success",
        "details": stats,
    }))
}
