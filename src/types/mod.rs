//! Type definitions for the change detection service

pub mod report;
pub mod session;

pub use report::{CleanupResponse, DetectionReport, ErrorBody, HealthStatus, UploadedImage};
pub use session::{InvalidSessionId, SessionId};
