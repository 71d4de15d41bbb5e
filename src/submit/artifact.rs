//! Temporary archive owned by one pipeline run

use chrono::Local;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};
use uuid::Uuid;

/// Scratch artifact, removed on drop unless retained
///
/// The file is created by the packaging step, which runs on the blocking pool
/// and may outlive an interrupted run. [`Self::abandon_flag`] lets that step
/// clean up after itself when the guard is dropped first.
#[derive(Debug)]
pub struct ArtifactGuard {
    path: PathBuf,
    abandoned: Arc<AtomicBool>,
    network_started: AtomicBool,
    retained: bool,
}

impl ArtifactGuard {
    /// Reserve a fresh `submission_<8 hex>_<timestamp>.zip` path in `dir`
    pub fn new_in(dir: &Path) -> Self {
        let token = Uuid::new_v4().simple().to_string();
        let name = format!(
            "submission_{}_{}.zip",
            &token[..8],
            Local::now().format("%Y%m%d_%H%M%S")
        );
        Self {
            path: dir.join(name),
            abandoned: Arc::new(AtomicBool::new(false)),
            network_started: AtomicBool::new(false),
            retained: false,
        }
    }

    /// Artifact location
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Artifact file name, as sent to the upload slot request
    pub fn filename(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Set once the guard has been dropped without being retained
    pub fn abandon_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.abandoned)
    }

    /// Record that remote work involving the artifact has begun
    pub fn mark_network_started(&self) {
        self.network_started.store(true, Ordering::SeqCst);
    }

    /// Whether remote work involving the artifact has begun
    pub fn network_started(&self) -> bool {
        self.network_started.load(Ordering::SeqCst)
    }

    /// Keep the file on disk and return its path
    pub fn retain(mut self) -> PathBuf {
        self.retained = true;
        self.path.clone()
    }
}

impl Drop for ArtifactGuard {
    fn drop(&mut self) {
        if self.retained {
            debug!(path = %self.path.display(), "keeping artifact");
            return;
        }

        self.abandoned.store(true, Ordering::SeqCst);
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed artifact"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "could not remove artifact"),
        }
    }
}
