//! Retention-based removal of staged inputs and result masks

use std::fs;
use std::io;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing::{debug, info};

/// Outcome of one purge sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PurgeReport {
    /// Regular files examined
    pub scanned: usize,
    /// Files deleted for exceeding the retention window
    pub removed: usize,
}

/// Delete regular files in `directory` whose modification time is older than `max_age`.
///
/// Subdirectories are left alone. A missing directory is treated as empty.
/// Files that disappear mid-sweep are not an error.
pub fn purge<P: AsRef<Path>>(directory: P, max_age: Duration) -> io::Result<PurgeReport> {
    let directory = directory.as_ref();
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(PurgeReport::default()),
        Err(e) => return Err(e),
    };

    let now = SystemTime::now();
    let mut report = PurgeReport::default();

    for entry in entries {
        let entry = entry?;
        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
            Err(e) => return Err(e),
        };
        if !metadata.is_file() {
            continue;
        }
        report.scanned += 1;

        // mtime in the future counts as age zero
        let age = now
            .duration_since(metadata.modified()?)
            .unwrap_or(Duration::ZERO);
        if age <= max_age {
            continue;
        }

        let path = entry.path();
        match fs::remove_file(&path) {
            Ok(()) => {
                report.removed += 1;
                debug!(path = %path.display(), age_secs = age.as_secs(), "Purged expired file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }

    info!(
        directory = %directory.display(),
        max_age_secs = max_age.as_secs(),
        scanned = report.scanned,
        removed = report.removed,
        "Purge complete"
    );

    Ok(report)
}
