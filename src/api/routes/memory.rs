//! Memory table and memory introspection toggle

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
};
use serde::Deserialize;
use serde_json::json;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::ApiResponse,
};
use crate::memory::{GroupByType, SortingType};

#[derive(Debug, Deserialize)]
pub struct MemoryTableParams {
    group_by: Option<GroupByType>,
    sort_by: Option<SortingType>,
}

/// GET /api/v1/memory/memory_table?group_by=node|stack_trace&sort_by=pid|object_size|reference_type
pub async fn get_memory_table(
    State(state): State<ApiState>,
    params: Result<Query<MemoryTableParams>, QueryRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Query(params) = params?;
    let table = state.query.get_memory_table(params.group_by, params.sort_by);

    Ok(Json(ApiResponse::success(
        "Fetched memory table",
        json!({ "memoryTable": table }),
    )))
}

#[derive(Debug, Deserialize)]
pub struct SetFetchParams {
    #[serde(rename = "shouldFetch")]
    should_fetch: String,
}

/// GET /api/v1/memory/set_fetch?shouldFetch=true|false
pub async fn set_fetch(
    State(state): State<ApiState>,
    params: Result<Query<SetFetchParams>, QueryRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Query(params) = params?;

    let enabled = match params.should_fetch.as_str() {
        "true" => true,
        "false" => false,
        other => {
            return Err(ApiError::InvalidRequest(format!(
                "shouldFetch must be true or false, got {other}"
            )));
        }
    };
    state.query.set_memory_info_collection(enabled);

    let msg = if enabled {
        "Started fetching memory info."
    } else {
        "Stopped fetching memory info."
    };
    Ok(Json(ApiResponse::success(msg, json!({ "shouldFetch": enabled }))))
}
