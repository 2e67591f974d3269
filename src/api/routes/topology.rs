//! Topology endpoint

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use crate::api::{ApiResult, ApiState};

/// GET /api/v1/topology
///
/// Returns the latest topology graph. Built on demand when no snapshot event
/// has triggered a pass yet.
pub async fn get_topology(State(state): State<ApiState>) -> ApiResult<Response> {
    let topology = state.topology.topology().await?;
    Ok(Json(topology.as_ref()).into_response())
}
