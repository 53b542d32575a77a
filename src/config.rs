//! Configuration management for the change detection service

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compute device for ONNX Runtime
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// CUDA when the execution provider registers, CPU otherwise
    #[default]
    Auto,
    /// CUDA only; startup fails if it cannot be registered
    Cuda,
    /// CPU only
    Cpu,
}

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub model: ModelConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
    pub metrics: MetricsConfig,
}

/// HTTP listener configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.host, self.port))
    }
}

/// Filesystem layout and retention windows
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Staging directory for uploaded inputs
    pub upload_dir: PathBuf,
    /// Directory for persisted result masks
    pub results_dir: PathBuf,
    /// Age after which staged inputs are purged (seconds)
    pub input_retention_secs: u64,
    /// Age after which result masks are purged (seconds)
    pub result_retention_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads/temp"),
            results_dir: PathBuf::from("uploads/results"),
            input_retention_secs: 3600,
            result_retention_secs: 24 * 3600,
        }
    }
}

impl StorageConfig {
    pub fn input_retention(&self) -> Duration {
        Duration::from_secs(self.input_retention_secs)
    }

    pub fn result_retention(&self) -> Duration {
        Duration::from_secs(self.result_retention_secs)
    }
}

/// Model artifact and preprocessing settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// ONNX export of the trained change detection network
    pub model_path: PathBuf,
    /// Input width expected by the network
    pub image_width: u32,
    /// Input height expected by the network
    pub image_height: u32,
    pub device: Device,
    /// Number of intra-op threads for ONNX inference
    pub onnx_threads: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/saved_models/best_cd_model.onnx"),
            image_width: 512,
            image_height: 512,
            device: Device::Auto,
            onnx_threads: 1,
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,
    /// Accepted file extensions, lowercase, without the dot
    pub allowed_extensions: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 16 * 1024 * 1024,
            allowed_extensions: ["png", "jpg", "jpeg", "bmp", "tiff"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Log format (json, pretty)
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

/// Metrics reporting
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Seconds between summaries; 0 disables the periodic reporter
    pub report_interval_secs: u64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_interval_secs: 300,
        }
    }
}

impl AppConfig {
    /// Load configuration from `config/config.toml` (optional) and `CDS__*` env vars
    pub fn load() -> Result<Self> {
        Self::load_from_path("config/config.toml")
    }

    /// Load configuration from a specific path, with environment overrides
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(
                Environment::with_prefix("CDS")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("upload.allowed_extensions")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.model.image_width, 512);
        assert_eq!(config.model.image_height, 512);
        assert_eq!(config.model.device, Device::Auto);
        assert_eq!(config.upload.max_upload_bytes, 16 * 1024 * 1024);
        assert_eq!(config.upload.allowed_extensions.len(), 5);
        assert_eq!(config.storage.input_retention(), Duration::from_secs(3600));
        assert_eq!(config.storage.result_retention(), Duration::from_secs(86400));
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from_path(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.storage.upload_dir, PathBuf::from("uploads/temp"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[server]\nport = 8080\n\n[model]\nimage_width = 256\nimage_height = 256\ndevice = \"cpu\""
        )
        .unwrap();

        let config = AppConfig::load_from_path(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.model.image_width, 256);
        assert_eq!(config.model.device, Device::Cpu);
        assert_eq!(config.upload.allowed_extensions.len(), 5);
    }
}
