//! Error types for probe collection

use std::fmt;
use std::time::Duration;

/// Result type alias for probe operations
pub type ProbeResult<T> = Result<T, ProbeError>;

/// Why a probe is unavailable for the current cycle
///
/// None of these are fatal: the aggregator keeps serving the previous result
/// for the probe and marks it stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The invocation exceeded its time budget and was abandoned
    Timeout(Duration),

    /// Connection or transport failure
    Network(String),

    /// The endpoint answered with a non-success status code
    Status(u16),

    /// The response could not be decoded
    Malformed(String),

    /// The container runtime rejected or failed a request
    Runtime(String),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Timeout(after) => {
                write!(f, "probe timed out after {}ms", after.as_millis())
            }
            ProbeError::Network(msg) => write!(f, "probe request failed: {}", msg),
            ProbeError::Status(code) => write!(f, "probe endpoint returned HTTP {}", code),
            ProbeError::Malformed(msg) => write!(f, "malformed probe response: {}", msg),
            ProbeError::Runtime(msg) => write!(f, "container runtime error: {}", msg),
        }
    }
}

impl std::error::Error for ProbeError {}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ProbeError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            ProbeError::Status(status.as_u16())
        } else {
            ProbeError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Malformed(err.to_string())
    }
}

impl From<bollard::errors::Error> for ProbeError {
    fn from(err: bollard::errors::Error) -> Self {
        ProbeError::Runtime(err.to_string())
    }
}
