//! Health check endpoint

use axum::{Json, extract::State};
use serde_json::json;

use crate::api::{state::ApiState, types::ApiResponse};

/// GET /api/v1/health
pub async fn health_check(State(state): State<ApiState>) -> Json<ApiResponse> {
    let store = state.query.store();

    Json(ApiResponse::success(
        "ok",
        json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "nodes": store.nodes().len(),
            "actors": store.actor_count(),
        }),
    ))
}
