//! Node views and registry membership

use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::api::{
    error::{ApiError, ApiResult},
    state::ApiState,
    types::ApiResponse,
};
use crate::{NodeId, NodeRecord};

/// Matched case-insensitively; dashboards send `hostNameList`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum NodeView {
    #[default]
    Summary,
    Details,
    HostNameList,
}

impl TryFrom<String> for NodeView {
    type Error = String;

    fn try_from(view: String) -> Result<Self, Self::Error> {
        match view.to_ascii_lowercase().as_str() {
            "summary" => Ok(Self::Summary),
            "details" => Ok(Self::Details),
            "hostnamelist" => Ok(Self::HostNameList),
            _ => Err(format!("unknown view {view:?}")),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NodesParams {
    #[serde(default)]
    view: NodeView,
}

/// GET /api/v1/nodes?view=summary|details|hostnamelist
pub async fn list_nodes(
    State(state): State<ApiState>,
    params: Result<Query<NodesParams>, QueryRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Query(params) = params?;

    let response = match params.view {
        NodeView::Summary => ApiResponse::success(
            "Node summary fetched.",
            json!({ "summary": state.query.get_all_node_summary() }),
        ),
        NodeView::Details => ApiResponse::success(
            "All node details fetched",
            json!({ "clients": state.query.get_all_node_details() }),
        ),
        NodeView::HostNameList => ApiResponse::success(
            "Node hostname list fetched.",
            json!({ "hostNameList": state.query.get_alive_hostnames() }),
        ),
    };
    Ok(Json(response))
}

/// GET /api/v1/nodes/:id
pub async fn get_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse>> {
    let detail = state
        .query
        .get_node(&NodeId::new(id.as_str()))
        .ok_or_else(|| ApiError::NotFound(format!("node {id} not found")))?;

    Ok(Json(ApiResponse::success(
        "Node details fetched.",
        json!({ "detail": detail }),
    )))
}

/// PUT /api/v1/nodes/:id
///
/// Inserts or replaces the registry entry; the body is a node record.
pub async fn put_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    record: Result<Json<NodeRecord>, JsonRejection>,
) -> ApiResult<Json<ApiResponse>> {
    let Json(record) = record?;
    if record.node_id.as_str() != id {
        return Err(ApiError::InvalidRequest(format!(
            "body node id {} does not match path {id}",
            record.node_id
        )));
    }

    let replaced = state.registry().insert(record).await.is_some();
    info!("registry: {} node {id}", if replaced { "updated" } else { "added" });

    Ok(Json(ApiResponse::success(
        "Node registered.",
        json!({ "replaced": replaced }),
    )))
}

/// DELETE /api/v1/nodes/:id
pub async fn delete_node(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse>> {
    state
        .registry()
        .remove(&NodeId::new(id.as_str()))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("node {id} not found")))?;
    info!("registry: removed node {id}");

    Ok(Json(ApiResponse::success("Node removed.", json!({}))))
}
