//! Publishing onto the in-process bus

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde_json::json;
use tracing::trace;

use crate::api::{error::ApiResult, state::ApiState, types::ApiResponse};

/// POST /api/v1/bus/:topic
///
/// The raw body becomes the message payload.
pub async fn publish(
    State(state): State<ApiState>,
    Path(topic): Path<String>,
    body: Bytes,
) -> ApiResult<Json<ApiResponse>> {
    trace!("publishing {} bytes on {topic}", body.len());
    let subscribers = state.bus.publish(topic, body.to_vec());

    Ok(Json(ApiResponse::success(
        "Published.",
        json!({ "subscribers": subscribers }),
    )))
}
