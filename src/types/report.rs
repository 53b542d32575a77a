//! Request inputs and response bodies for the detection API

use crate::types::session::SessionId;
use serde::{Deserialize, Serialize};

/// One uploaded multipart file, held in memory until staged
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Client-supplied filename
    pub filename: String,
    /// Raw file content
    pub data: Vec<u8>,
}

impl UploadedImage {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
        }
    }
}

/// Successful detection summary returned by `POST /detect-changes`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionReport {
    pub success: bool,
    pub session_id: SessionId,
    pub result_url: String,
    /// Percentage of changed pixels in [0, 100], `None` when it could not be measured
    pub percentage_change: Option<f64>,
}

impl DetectionReport {
    pub fn new(session_id: SessionId, percentage_change: Option<f64>) -> Self {
        Self {
            success: true,
            session_id,
            result_url: session_id.result_url(),
            percentage_change,
        }
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub message: String,
}

/// Body of `POST /cleanup`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupResponse {
    pub success: bool,
    pub message: String,
}

/// Error body shared by every endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_serialization() {
        let id = SessionId::new();
        let report = DetectionReport::new(id, Some(12.5));

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["session_id"], id.to_string());
        assert_eq!(json["result_url"], format!("/get-result/{}", id));
        assert_eq!(json["percentage_change"], 12.5);
    }

    #[test]
    fn test_missing_ratio_serializes_as_null() {
        let report = DetectionReport::new(SessionId::new(), None);
        let json = serde_json::to_value(&report).unwrap();
        assert!(json["percentage_change"].is_null());
    }
}
