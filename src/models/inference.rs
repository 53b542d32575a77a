//! Inference engine for bi-temporal change detection

use crate::codec::ImageTensor;
use crate::config::AppConfig;
use crate::error::InferenceError;
use crate::models::loader::ModelLoader;
use crate::models::postprocess;
use anyhow::{Context, Result};
use ndarray::{concatenate, Array3, Array4, ArrayD, Axis};
use tracing::{debug, info};

/// A network mapping a `[1, 6, H, W]` image pair to per-pixel change logits.
pub trait ChangeModel: Send + Sync {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Run a forward pass and return raw scores at the model's output resolution
    fn forward(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError>;
}

/// Owns the loaded model for the lifetime of the process.
pub struct InferenceEngine {
    model: Box<dyn ChangeModel>,
}

impl InferenceEngine {
    /// Load the ONNX model from configuration and check it accepts the configured resolution.
    ///
    /// Any failure here means the service cannot serve detections.
    pub fn new(config: &AppConfig) -> Result<Self> {
        let loader = ModelLoader::from_config(&config.model);
        let model = loader.load_model(&config.model.model_path)?;
        let engine = Self::with_model(model);

        engine
            .verify(config.model.image_width, config.model.image_height)
            .context("Model rejected a probe input at the configured resolution")?;

        info!(
            model = %engine.model_name(),
            width = config.model.image_width,
            height = config.model.image_height,
            "Inference engine initialized"
        );

        Ok(engine)
    }

    /// Create an engine around an already constructed model
    pub fn with_model<M: ChangeModel + 'static>(model: M) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    /// Get the loaded model name
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Stack two `[3, H, W]` tensors into a `[1, 6, H, W]` batch.
    pub fn prepare_input(
        before: &ImageTensor,
        after: &ImageTensor,
    ) -> Result<Array4<f32>, InferenceError> {
        if before.shape() != after.shape() {
            return Err(InferenceError::ShapeMismatch {
                left: before.shape().to_vec(),
                right: after.shape().to_vec(),
            });
        }

        let stacked = concatenate(Axis(0), &[before.view(), after.view()])
            .map_err(InferenceError::runtime)?;
        Ok(stacked.insert_axis(Axis(0)))
    }

    /// Predict raw change scores for an image pair
    pub fn predict(
        &self,
        before: &ImageTensor,
        after: &ImageTensor,
    ) -> Result<ArrayD<f32>, InferenceError> {
        let input = Self::prepare_input(before, after)?;
        let scores = self.model.forward(input)?;

        debug!(
            model = %self.model.name(),
            output_shape = ?scores.shape(),
            "Prediction complete"
        );

        Ok(scores)
    }

    /// Run a blank pair through the model and check the output reduces to a mask.
    pub fn verify(&self, width: u32, height: u32) -> Result<(), InferenceError> {
        let probe = Array3::<f32>::zeros((3, height as usize, width as usize));
        let scores = self.predict(&probe, &probe)?;
        postprocess::binarize(&scores).map(|_| ())
    }
}
