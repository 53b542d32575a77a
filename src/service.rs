//! Request orchestration: validate, stage, infer, measure, clean up.

use crate::codec::ImageCodec;
use crate::config::{AppConfig, StorageConfig};
use crate::error::DetectionError;
use crate::housekeeping::{self, PurgeReport};
use crate::metrics::ServiceMetrics;
use crate::models::inference::InferenceEngine;
use crate::models::postprocess;
use crate::storage::{SessionStore, StagedInputs};
use crate::types::{DetectionReport, SessionId, UploadedImage};
use crate::validation::UploadPolicy;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Result of a cleanup sweep over both storage directories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupSummary {
    pub inputs: PurgeReport,
    pub results: PurgeReport,
}

/// Process-wide detection service, built once at startup and shared by handlers.
pub struct ChangeDetectionService {
    engine: InferenceEngine,
    codec: ImageCodec,
    store: SessionStore,
    policy: UploadPolicy,
    input_retention: Duration,
    result_retention: Duration,
    metrics: Arc<ServiceMetrics>,
}

impl ChangeDetectionService {
    /// Wire the service from configuration and create the storage directories.
    pub fn new(
        config: &AppConfig,
        engine: InferenceEngine,
        metrics: Arc<ServiceMetrics>,
    ) -> io::Result<Self> {
        let store = SessionStore::from_config(&config.storage);
        store.ensure_dirs()?;

        Ok(Self::from_parts(
            engine,
            ImageCodec::from_config(&config.model),
            store,
            UploadPolicy::from_config(&config.upload),
            &config.storage,
            metrics,
        ))
    }

    pub fn from_parts(
        engine: InferenceEngine,
        codec: ImageCodec,
        store: SessionStore,
        policy: UploadPolicy,
        storage: &StorageConfig,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            engine,
            codec,
            store,
            policy,
            input_retention: storage.input_retention(),
            result_retention: storage.result_retention(),
            metrics,
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    /// Run one detection request end to end.
    pub fn detect(
        &self,
        image1: Option<UploadedImage>,
        image2: Option<UploadedImage>,
    ) -> Result<DetectionReport, DetectionError> {
        let start = Instant::now();
        let result = self.run_detection(image1, image2);

        match &result {
            Ok(report) => {
                let elapsed = start.elapsed();
                self.metrics
                    .record_detection(elapsed, report.percentage_change);
                info!(
                    session_id = %report.session_id,
                    percentage_change = ?report.percentage_change,
                    processing_time_ms = elapsed.as_millis() as u64,
                    "Change detection complete"
                );
            }
            Err(e) => self.metrics.record_failure(e.stage()),
        }

        result
    }

    fn run_detection(
        &self,
        image1: Option<UploadedImage>,
        image2: Option<UploadedImage>,
    ) -> Result<DetectionReport, DetectionError> {
        let (image1, image2) = self.policy.validate_pair(image1, image2)?;

        let session_id = SessionId::new();
        let staged = self.store.stage_inputs(session_id, &image1, &image2)?;

        let result_path = self.infer(session_id, &staged)?;
        let percentage_change = postprocess::measure(&result_path);

        if let Err(e) = staged.release() {
            warn!(session_id = %session_id, error = %e, "Failed to remove staged inputs");
        }

        Ok(DetectionReport::new(session_id, percentage_change))
    }

    fn infer(&self, session_id: SessionId, staged: &StagedInputs) -> Result<PathBuf, DetectionError> {
        let [before_path, after_path] = staged.paths();
        let before = self.codec.decode(before_path)?;
        let after = self.codec.decode(after_path)?;

        let forward_start = Instant::now();
        let scores = self.engine.predict(&before, &after)?;
        self.metrics.record_inference(forward_start.elapsed());

        let mask = postprocess::binarize(&scores)?;
        let png = ImageCodec::encode(&mask)?;
        self.store.persist_result(session_id, &png)
    }

    /// Fetch the PNG mask of a completed session.
    pub fn load_result(&self, session_id: &str) -> Result<Vec<u8>, DetectionError> {
        self.store.read_result(session_id)
    }

    /// Purge staged inputs and results past their retention windows.
    pub fn cleanup(&self) -> io::Result<CleanupSummary> {
        let inputs = housekeeping::purge(self.store.upload_dir(), self.input_retention)?;
        let results = housekeeping::purge(self.store.results_dir(), self.result_retention)?;
        Ok(CleanupSummary { inputs, results })
    }
}
