//! HTTP wire types shared by the server and its tests.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/capture-image`.
///
/// Clients also send a `fileName`; it is not used for naming and is ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImageSubmission {
    #[serde(default)]
    pub image: Option<String>,
}

/// Body of `POST /api/record-audio`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioSubmission {
    #[serde(default)]
    pub audio: Option<String>,
}

/// Every submission endpoint answers with a single status line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
        }
    }
}

/// Health-check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}
