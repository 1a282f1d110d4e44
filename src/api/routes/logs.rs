//! Per-process logs and errors

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use serde_json::json;

use crate::api::{error::ApiResult, state::ApiState, types::ApiResponse};

#[derive(Debug, Deserialize)]
pub struct ProcessParams {
    ip: String,
    pid: Option<String>,
}

/// GET /api/v1/node_logs?ip=&pid=
pub async fn get_logs(
    State(state): State<ApiState>,
    params: Result<Query<ProcessParams>, QueryRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Query(params) = params?;
    let logs = state.query.get_logs(&params.ip, params.pid.as_deref());

    Ok(Json(ApiResponse::success(
        "Fetched logs.",
        json!({ "logs": logs }),
    )))
}

/// GET /api/v1/node_errors?ip=&pid=
pub async fn get_errors(
    State(state): State<ApiState>,
    params: Result<Query<ProcessParams>, QueryRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Query(params) = params?;
    let errors = state.query.get_errors(&params.ip, params.pid.as_deref());

    Ok(Json(ApiResponse::success(
        "Fetched errors.",
        json!({ "errors": errors }),
    )))
}
