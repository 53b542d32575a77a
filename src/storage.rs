//! Filesystem layout for staged inputs and result masks.
//!
//! Inputs live at `{upload_dir}/{session_id}_img{1,2}.jpg` and results at
//! `{results_dir}/{session_id}_result.png`. There is no other persistence.

use crate::config::StorageConfig;
use crate::error::DetectionError;
use crate::types::{SessionId, UploadedImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Session-keyed file store
#[derive(Debug, Clone)]
pub struct SessionStore {
    upload_dir: PathBuf,
    results_dir: PathBuf,
}

impl SessionStore {
    pub fn new(upload_dir: impl Into<PathBuf>, results_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            results_dir: results_dir.into(),
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.upload_dir, &config.results_dir)
    }

    /// Create both directories if they do not exist
    pub fn ensure_dirs(&self) -> io::Result<()> {
        fs::create_dir_all(&self.upload_dir)?;
        fs::create_dir_all(&self.results_dir)
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn results_dir(&self) -> &Path {
        &self.results_dir
    }

    /// Staging path for input `index` (1 or 2) of a session
    pub fn input_path(&self, session_id: SessionId, index: u8) -> PathBuf {
        self.upload_dir.join(format!("{}_img{}.jpg", session_id, index))
    }

    pub fn result_path(&self, session_id: SessionId) -> PathBuf {
        self.results_dir.join(format!("{}_result.png", session_id))
    }

    /// Write both uploads to the staging directory.
    ///
    /// The returned guard deletes the files when dropped, so inputs never
    /// outlive the request whichever way it ends.
    pub fn stage_inputs(
        &self,
        session_id: SessionId,
        image1: &UploadedImage,
        image2: &UploadedImage,
    ) -> Result<StagedInputs, DetectionError> {
        let staged = StagedInputs {
            paths: [self.input_path(session_id, 1), self.input_path(session_id, 2)],
            released: false,
        };

        for (path, image) in staged.paths.iter().zip([image1, image2]) {
            fs::write(path, &image.data).map_err(|source| DetectionError::Staging {
                path: path.clone(),
                source,
            })?;
        }

        debug!(session_id = %session_id, "Staged input images");
        Ok(staged)
    }

    /// Persist an encoded mask via temp file and rename, so readers never see a partial PNG.
    pub fn persist_result(
        &self,
        session_id: SessionId,
        png: &[u8],
    ) -> Result<PathBuf, DetectionError> {
        let target = self.result_path(session_id);
        let temp = target.with_extension("png.tmp");

        fs::write(&temp, png).map_err(|source| DetectionError::Storage {
            path: temp.clone(),
            source,
        })?;
        fs::rename(&temp, &target).map_err(|source| DetectionError::Storage {
            path: target.clone(),
            source,
        })?;

        Ok(target)
    }

    /// Read a persisted mask. Unknown or malformed identifiers are `NotFound`.
    pub fn read_result(&self, session_id: &str) -> Result<Vec<u8>, DetectionError> {
        let session_id: SessionId = session_id.parse().map_err(|_| DetectionError::NotFound)?;
        let path = self.result_path(session_id);

        fs::read(&path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => DetectionError::NotFound,
            _ => DetectionError::Storage { path, source },
        })
    }
}

/// Staged input files of one request; removed on `release` or drop.
#[derive(Debug)]
pub struct StagedInputs {
    paths: [PathBuf; 2],
    released: bool,
}

impl StagedInputs {
    pub fn paths(&self) -> &[PathBuf; 2] {
        &self.paths
    }

    /// Delete both files now, reporting the first failure.
    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        let mut result = Ok(());
        for path in &self.paths {
            if let Err(e) = remove_if_present(path) {
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }
        result
    }
}

impl Drop for StagedInputs {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        for path in &self.paths {
            if let Err(e) = remove_if_present(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove staged input");
            }
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
