//! ONNX model loader

use crate::config::{Device, ModelConfig};
use crate::error::InferenceError;
use crate::models::inference::ChangeModel;
use anyhow::{Context, Result};
use ndarray::{Array4, ArrayD, IxDyn};
use ort::execution_providers::CUDAExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Loaded ONNX change detection network
pub struct LoadedModel {
    /// Model name (file stem)
    pub name: String,
    /// ONNX Runtime session; a run needs exclusive access
    session: Mutex<Session>,
    /// Input name for the 6-channel image pair
    pub input_name: String,
    /// Output name for the change logits
    pub output_name: String,
}

impl ChangeModel for LoadedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let shape: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let data: Vec<f32> = input.iter().copied().collect();
        let input_tensor = Tensor::from_array((shape, data)).map_err(InferenceError::runtime)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| InferenceError::Runtime(format!("Lock error: {}", e)))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input_tensor])
            .map_err(InferenceError::runtime)?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| InferenceError::MissingOutput(self.output_name.clone()))?;

        let (shape, data) = output
            .try_extract_tensor::<f32>()
            .map_err(InferenceError::runtime)?;
        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();

        debug!(model = %self.name, shape = ?dims, "Forward pass complete");

        ArrayD::from_shape_vec(IxDyn(&dims), data.to_vec())
            .map_err(|_| InferenceError::UnexpectedOutputShape(dims))
    }
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
    /// Execution device selection
    device: Device,
}

impl ModelLoader {
    /// Create a new model loader with default settings (1 thread, automatic device)
    pub fn new() -> Self {
        Self::with_settings(1, Device::Auto)
    }

    /// Create a new model loader with the given thread count and device
    pub fn with_settings(onnx_threads: usize, device: Device) -> Self {
        Self {
            onnx_threads: onnx_threads.max(1),
            device,
        }
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self::with_settings(config.onnx_threads, config.device)
    }

    /// Load the change detection network from an ONNX file
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<LoadedModel> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Model file not found: {}", path.display());
        }

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "change_detection".to_string());

        info!(
            model = %name,
            path = %path.display(),
            threads = self.onnx_threads,
            device = ?self.device,
            "Loading ONNX model"
        );

        let mut builder = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?;

        builder = match self.device {
            Device::Cpu => builder,
            Device::Auto => {
                builder.with_execution_providers([CUDAExecutionProvider::default().build()])?
            }
            Device::Cuda => builder.with_execution_providers([CUDAExecutionProvider::default()
                .build()
                .error_on_failure()])?,
        };

        let session = builder
            .commit_from_file(path)
            .context(format!("Failed to load model from {:?}", path))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .context("Model declares no inputs")?;

        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("logit") || o.name.contains("output"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .context("Model declares no outputs")?;

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
        })
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
