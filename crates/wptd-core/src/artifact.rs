//! Gzip-compressed JSON artifacts at deterministic paths.
//!
//! Paths depend only on revision, platform and test path, so re-running the
//! same revision/platform overwrites in place.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{RunError, RunResult};

/// Where one run's files live under `build_path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    build_path: PathBuf,
    short_revision: String,
    platform_id: String,
}

impl ArtifactLayout {
    pub fn new(
        build_path: impl Into<PathBuf>,
        short_revision: impl Into<String>,
        platform_id: impl Into<String>,
    ) -> Self {
        Self {
            build_path: build_path.into(),
            short_revision: short_revision.into(),
            platform_id: platform_id.into(),
        }
    }

    pub fn build_path(&self) -> &Path {
        &self.build_path
    }

    pub fn short_revision(&self) -> &str {
        &self.short_revision
    }

    /// Where the runner writes its wptreport.
    pub fn report_log_path(&self) -> PathBuf {
        self.build_path.join(format!(
            "wptd-{}-{}-report.log",
            self.short_revision, self.platform_id
        ))
    }

    /// Summary path relative to `build_path`; also its key in the bucket.
    pub fn summary_key(&self) -> String {
        format!("{}/{}-summary.json.gz", self.short_revision, self.platform_id)
    }

    pub fn summary_path(&self) -> PathBuf {
        self.build_path.join(self.summary_key())
    }

    /// Directory synced to storage.
    pub fn revision_dir(&self) -> PathBuf {
        self.build_path.join(&self.short_revision)
    }

    /// Per-test result path. `test` keeps its leading `/`, so the result tree
    /// mirrors WPT's layout under `<short>/<platform_id>`.
    pub fn result_path(&self, test: &str) -> PathBuf {
        let base = self
            .build_path
            .join(&self.short_revision)
            .join(&self.platform_id);
        PathBuf::from(format!("{}{}", base.display(), test))
    }

    /// Public URL of the uploaded summary.
    pub fn summary_url(&self, bucket: &str) -> String {
        format!(
            "https://storage.googleapis.com/{}/{}",
            bucket,
            self.summary_key()
        )
    }
}

fn artifact_err(path: &Path, e: impl std::fmt::Display) -> RunError {
    RunError::Artifact {
        path: path.display().to_string(),
        message: e.to_string(),
    }
}

/// Serialize `payload` as JSON through gzip to `path`, creating parents.
pub fn write_gzip_json<T: Serialize + ?Sized>(path: &Path, payload: &T) -> RunResult<()> {
    if let Some(parent) = path.parent() {
        // create_dir_all already treats a concurrently created directory as success.
        std::fs::create_dir_all(parent).map_err(|e| artifact_err(parent, e))?;
    }

    let file = File::create(path).map_err(|e| artifact_err(path, e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    serde_json::to_writer(&mut encoder, payload).map_err(|e| artifact_err(path, e))?;
    let mut inner = encoder.finish().map_err(|e| artifact_err(path, e))?;
    inner.flush().map_err(|e| artifact_err(path, e))?;
    Ok(())
}

/// Delete `path` if it exists. A missing file is not an error.
pub fn remove_stale(path: &Path) -> RunResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(artifact_err(path, e)),
    }
}

/// Read back a file written by [`write_gzip_json`].
pub fn read_gzip_json<T: DeserializeOwned>(path: &Path) -> RunResult<T> {
    let file = File::open(path).map_err(|e| artifact_err(path, e))?;
    let decoder = GzDecoder::new(BufReader::new(file));
    serde_json::from_reader(decoder).map_err(|e| artifact_err(path, e))
}
