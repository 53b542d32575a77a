//! Change Detection Service Library
//!
//! HTTP backend that compares two images with a pretrained change detection
//! network and returns a binary change mask plus the percentage of changed pixels.

pub mod codec;
pub mod config;
pub mod error;
pub mod housekeeping;
pub mod metrics;
pub mod models;
pub mod server;
pub mod service;
pub mod storage;
pub mod types;
pub mod validation;

pub use codec::{ImageCodec, ImageTensor};
pub use config::AppConfig;
pub use error::{DecodeError, DetectionError, InferenceError, ValidationError};
pub use models::inference::{ChangeModel, InferenceEngine};
pub use service::ChangeDetectionService;
pub use types::{DetectionReport, SessionId, UploadedImage};
