//! Live snapshot endpoint

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};

use crate::api::ApiState;

/// GET /api/v1/live
///
/// Returns the current live snapshot, including freshness of every probe slot
pub async fn get_live_snapshot(State(state): State<ApiState>) -> Response {
    let snapshot = state.aggregator.snapshot().await;
    Json(snapshot.as_ref()).into_response()
}
