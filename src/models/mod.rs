//! Change detection model components

pub mod inference;
pub mod loader;
pub mod postprocess;

pub use inference::{ChangeModel, InferenceEngine};
pub use loader::{LoadedModel, ModelLoader};
