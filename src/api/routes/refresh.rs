//! Manual refresh endpoint

use axum::{Json, extract::State};
use futures::future::join_all;
use tracing::debug;

use crate::api::{ApiState, ProbeRefresh, RefreshResponse};

/// POST /api/v1/refresh
///
/// Runs every probe immediately and reports which ones produced fresh data.
/// Failed probes keep their previous data, flagged stale.
pub async fn refresh_all(State(state): State<ApiState>) -> Json<RefreshResponse> {
    let results = join_all(state.probes.iter().map(|handle| async move {
        let result = handle.poll_now().await;
        ProbeRefresh {
            probe: handle.kind,
            name: handle.name.clone(),
            success: result.is_ok(),
            error: result.err().map(|e| format!("{e:#}")),
        }
    }))
    .await;

    debug!(
        "refresh: {} of {} probes succeeded",
        results.iter().filter(|probe| probe.success).count(),
        results.len()
    );

    Json(RefreshResponse { probes: results })
}
