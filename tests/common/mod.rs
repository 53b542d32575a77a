#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use change_detection_service::codec::ImageCodec;
use change_detection_service::config::StorageConfig;
use change_detection_service::metrics::ServiceMetrics;
use change_detection_service::server;
use change_detection_service::storage::SessionStore;
use change_detection_service::validation::UploadPolicy;
use change_detection_service::{ChangeDetectionService, ChangeModel, InferenceEngine, InferenceError};
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::{Array, Array4, ArrayD, IxDyn};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

pub const SIZE: u32 = 32;
pub const BOUNDARY: &str = "change-detection-test-boundary";

/// Marks a pixel changed when any channel differs by more than 0.25.
pub struct DiffModel;

impl ChangeModel for DiffModel {
    fn name(&self) -> &str {
        "diff"
    }

    fn forward(&self, input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        let (_, _, h, w) = input.dim();
        Ok(Array::from_shape_fn(IxDyn(&[1, 1, h, w]), |idx| {
            let (y, x) = (idx[2], idx[3]);
            let changed =
                (0..3).any(|c| (input[[0, c, y, x]] - input[[0, c + 3, y, x]]).abs() > 0.25);
            if changed {
                6.0
            } else {
                -6.0
            }
        }))
    }
}

/// Always fails its forward pass.
pub struct FailingModel;

impl ChangeModel for FailingModel {
    fn name(&self) -> &str {
        "failing"
    }

    fn forward(&self, _input: Array4<f32>) -> Result<ArrayD<f32>, InferenceError> {
        Err(InferenceError::Runtime("device lost".to_string()))
    }
}

pub struct TestContext {
    pub dir: TempDir,
    pub service: Arc<ChangeDetectionService>,
    pub router: Router,
}

impl TestContext {
    pub fn new<M: ChangeModel + 'static>(model: M) -> Self {
        Self::with_limit(model, 16 * 1024 * 1024)
    }

    pub fn with_limit<M: ChangeModel + 'static>(model: M, max_upload_bytes: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageConfig {
            upload_dir: dir.path().join("temp"),
            results_dir: dir.path().join("results"),
            ..StorageConfig::default()
        };
        let store = SessionStore::from_config(&storage);
        store.ensure_dirs().unwrap();

        let service = Arc::new(ChangeDetectionService::from_parts(
            InferenceEngine::with_model(model),
            ImageCodec::new(SIZE, SIZE),
            store,
            UploadPolicy::default(),
            &storage,
            Arc::new(ServiceMetrics::new()),
        ));
        let router = server::router(service.clone(), max_upload_bytes);

        Self {
            dir,
            service,
            router,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.dir.path().join("temp")
    }

    pub fn results_dir(&self) -> PathBuf {
        self.dir.path().join("results")
    }
}

pub fn file_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

/// Uniform gray image.
pub fn plain_image() -> RgbImage {
    RgbImage::from_pixel(SIZE, SIZE, Rgb([90, 90, 90]))
}

/// Gray image whose top-left quadrant is white.
pub fn quadrant_changed_image() -> RgbImage {
    let mut image = plain_image();
    for y in 0..SIZE / 2 {
        for x in 0..SIZE / 2 {
            image.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    image
}

/// Gray image whose left half is white.
pub fn half_changed_image() -> RgbImage {
    let mut image = plain_image();
    for y in 0..SIZE {
        for x in 0..SIZE / 2 {
            image.put_pixel(x, y, Rgb([255, 255, 255]));
        }
    }
    image
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
    bytes
}

/// Build a `POST /detect-changes` request from (field, filename, content) parts.
pub fn multipart_request(parts: &[(&str, &str, &[u8])]) -> Request<Body> {
    let parts: Vec<(&str, Option<&str>, &[u8])> = parts
        .iter()
        .map(|&(field, filename, data)| (field, Some(filename), data))
        .collect();
    form_request(&parts)
}

/// Build a multipart request where parts without a filename are plain form values.
pub fn form_request(parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (field, filename, data) in parts {
        let disposition = match filename {
            Some(filename) => format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream"
            ),
            None => format!("Content-Disposition: form-data; name=\"{field}\""),
        };
        body.extend_from_slice(format!("--{BOUNDARY}\r\n{disposition}\r\n\r\n").as_bytes());
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri("/detect-changes")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}
