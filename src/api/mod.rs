//! REST API for the topology hub
//!
//! ## Endpoints
//!
//! - `GET /api/v1/health` - Health check
//! - `GET /api/v1/topology` - Latest reconciled and laid out topology
//! - `GET /api/v1/live` - Current live snapshot with per-probe freshness
//! - `POST /api/v1/refresh` - Run every probe now

#[cfg(feature = "api")]
pub mod error;
#[cfg(feature = "api")]
pub mod routes;
#[cfg(feature = "api")]
pub mod state;
#[cfg(feature = "api")]
pub mod types;

#[cfg(feature = "api")]
pub use error::{ApiError, ApiResult};
#[cfg(feature = "api")]
pub use state::ApiState;
#[cfg(feature = "api")]
pub use types::{HealthResponse, ProbeRefresh, RefreshResponse};

#[cfg(feature = "api")]
use axum::{
    Router,
    routing::{get, post},
};
use std::net::SocketAddr;
#[cfg(feature = "api")]
use tracing::info;

use crate::config::ApiSettings;

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Bind address (e.g., "0.0.0.0:8080")
    pub bind_addr: SocketAddr,

    /// Enable CORS for browser renderers
    pub enable_cors: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ApiSettings::default())
    }
}

impl From<&ApiSettings> for ApiConfig {
    fn from(settings: &ApiSettings) -> Self {
        Self {
            bind_addr: crate::util::resolve_bind_addr(settings.bind),
            enable_cors: settings.enable_cors,
        }
    }
}

/// Build the API router
#[cfg(feature = "api")]
pub fn router(state: ApiState, enable_cors: bool) -> Router {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/api/v1/health", get(routes::health::health_check))
        .route("/api/v1/topology", get(routes::topology::get_topology))
        .route("/api/v1/live", get(routes::live::get_live_snapshot))
        .route("/api/v1/refresh", post(routes::refresh::refresh_all))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Spawn the API server
///
/// Starts an Axum HTTP server in a background task and returns the address
/// it is listening on.
#[cfg(feature = "api")]
pub async fn spawn_api_server(config: ApiConfig, state: ApiState) -> anyhow::Result<SocketAddr> {
    info!("starting API server on {}", config.bind_addr);

    let app = router(state, config.enable_cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    let addr = listener.local_addr()?;

    info!("API server listening on {}", addr);

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("API server error: {}", e);
        }
    });

    Ok(addr)
}
