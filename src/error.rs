//! Error types for the change detection request path.
//!
//! Each step of the detection pipeline fails with its own variant so the HTTP
//! layer can decide what reaches the client and what stays in the logs.

use std::path::PathBuf;
use thiserror::Error;

/// Rejected upload. The message is safe to return to the client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Both image1 and image2 are required")]
    MissingImage,

    #[error("No file selected")]
    EmptyFilename,

    #[error("Invalid file type '{filename}'. Allowed: {allowed}")]
    DisallowedExtension { filename: String, allowed: String },

    #[error("Uploaded file '{filename}' is empty")]
    EmptyFile { filename: String },
}

/// Failure to turn a file into pixels.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("failed to read image {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("failed to encode mask: {0}")]
    Encode(#[source] image::ImageError),
}

/// Failure inside the model forward pass or around its tensors.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("input tensors differ in shape: {left:?} vs {right:?}")]
    ShapeMismatch { left: Vec<usize>, right: Vec<usize> },

    #[error("model output has unexpected shape {0:?}")]
    UnexpectedOutputShape(Vec<usize>),

    #[error("model output '{0}' not found")]
    MissingOutput(String),

    #[error("model runtime error: {0}")]
    Runtime(String),
}

impl InferenceError {
    pub fn runtime<E: std::fmt::Display>(e: E) -> Self {
        InferenceError::Runtime(e.to_string())
    }
}

/// Terminal failure of one detection request, tagged by pipeline step.
#[derive(Debug, Error)]
pub enum DetectionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("failed to stage input {path}: {source}")]
    Staging {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error("failed to persist result {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("result not found")]
    NotFound,
}

impl DetectionError {
    /// Short label for the step that failed, used in logs and metrics.
    pub fn stage(&self) -> &'static str {
        match self {
            DetectionError::Validation(_) => "validate",
            DetectionError::Staging { .. } => "stage",
            DetectionError::Decode(_) => "decode",
            DetectionError::Inference(_) => "infer",
            DetectionError::Storage { .. } => "persist",
            DetectionError::NotFound => "lookup",
        }
    }
}
