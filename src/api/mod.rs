//! REST API over the collector's query accessors
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/nodes?view=summary|details|hostnamelist` - Node views
//! - `GET /api/v1/nodes/:id` - One node with stats, actors and counters
//! - `PUT /api/v1/nodes/:id` / `DELETE /api/v1/nodes/:id` - Registry membership
//! - `GET /api/v1/memory/memory_table` - Object memory table
//! - `GET /api/v1/memory/set_fetch?shouldFetch=` - Memory introspection toggle
//! - `GET /api/v1/node_logs?ip=&pid=` - Process logs
//! - `GET /api/v1/node_errors?ip=&pid=` - Process errors
//! - `POST /api/v1/bus/:topic` - Publish onto the in-process bus
//!
//! Every response uses the [`ApiResponse`] envelope.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;
pub use types::ApiResponse;

use std::net::{Ipv4Addr, SocketAddr};

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,

    /// Optional bearer token required on every request
    pub auth_token: Option<String>,

    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8266)),
            auth_token: None,
            enable_cors: true,
        }
    }
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/nodes", get(routes::nodes::list_nodes))
        .route(
            "/api/v1/nodes/:id",
            get(routes::nodes::get_node)
                .put(routes::nodes::put_node)
                .delete(routes::nodes::delete_node),
        )
        .route(
            "/api/v1/memory/memory_table",
            get(routes::memory::get_memory_table),
        )
        .route("/api/v1/memory/set_fetch", get(routes::memory::set_fetch))
        .route("/api/v1/node_logs", get(routes::logs::get_logs))
        .route("/api/v1/node_errors", get(routes::logs::get_errors))
        .route("/api/v1/bus/:topic", post(routes::bus::publish))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve the API in a background task.
///
/// Returns the bound address, which differs from the configured one when
/// port 0 was requested.
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let mut app = router(state);

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if let Some(token) = config.auth_token {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("API server error: {e}");
        }
    });

    Ok(addr)
}
