//! API response types
//!
//! Topology and live snapshot responses serialize the engine types directly;
//! only the envelope types live here.

use serde::{Deserialize, Serialize};

use crate::live::ProbeKind;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,

    /// RFC 3339
    pub timestamp: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// Outcome of one probe in a refresh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProbeRefresh {
    pub probe: ProbeKind,
    pub name: String,
    pub success: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RefreshResponse {
    pub probes: Vec<ProbeRefresh>,
}
