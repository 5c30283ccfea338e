//! Cleanup Coordinator
//!
//! [`CleanupGuard`] owns the cluster handle for the whole run. It is created
//! before the first phase and released exactly once after the last one:
//!
//! - normal completion, phase failure, interruption: [`CleanupGuard::release`]
//! - panic or early return without release: `Drop` performs a blocking teardown
//!
//! With cleanup disabled (`--no-cleanup`) neither path touches the cluster or
//! the transient files. Cleanup failures are logged and reported but never
//! change the run's exit code.

use std::path::PathBuf;

use serde::Serialize;
use testrun_cluster::ClusterControl;
use tracing::{debug, info, warn};

/// What the cleanup step did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CleanupReport {
    /// Cleanup disabled; everything was left in place.
    Skipped {
        left_running: bool,
        kept_files: Vec<PathBuf>,
    },
    /// Cleanup ran.
    Completed {
        cluster_stopped: bool,
        removed_files: Vec<PathBuf>,
        errors: Vec<String>,
    },
}

impl CleanupReport {
    /// Whether cleanup actually ran.
    pub fn ran(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Cleanup errors (always empty when skipped).
    pub fn errors(&self) -> &[String] {
        match self {
            Self::Completed { errors, .. } => errors,
            Self::Skipped { .. } => &[],
        }
    }
}

/// Scoped ownership of "the cluster may be running" plus transient files.
pub struct CleanupGuard<C: ClusterControl> {
    cluster: C,
    transient_files: Vec<PathBuf>,
    enabled: bool,
    released: bool,
}

impl<C: ClusterControl> CleanupGuard<C> {
    /// Takes ownership of the cluster handle.
    pub fn new(cluster: C, enabled: bool) -> Self {
        Self {
            cluster,
            transient_files: Vec::new(),
            enabled,
            released: false,
        }
    }

    /// Whether cleanup will run on release.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Cluster handle.
    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Cluster handle for lifecycle operations.
    pub fn cluster_mut(&mut self) -> &mut C {
        &mut self.cluster
    }

    /// Registers a file to remove at cleanup.
    pub fn track_file(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.transient_files.contains(&path) {
            debug!(path = %path.display(), "tracking transient file");
            self.transient_files.push(path);
        }
    }

    /// Files registered so far.
    pub fn transient_files(&self) -> &[PathBuf] {
        &self.transient_files
    }

    /// Runs cleanup (or skips it if disabled) and consumes the guard.
    pub async fn release(mut self) -> CleanupReport {
        self.released = true;

        if !self.enabled {
            let left_running = self.cluster.is_running();
            info!(
                left_running,
                kept_files = self.transient_files.len(),
                "cleanup disabled, leaving cluster and files in place"
            );
            return CleanupReport::Skipped {
                left_running,
                kept_files: std::mem::take(&mut self.transient_files),
            };
        }

        let mut errors = Vec::new();
        let was_running = self.cluster.is_running();
        let cluster_stopped = match self.cluster.stop().await {
            Ok(()) => was_running,
            Err(e) => {
                warn!(error = %e, "failed to stop cluster during cleanup");
                errors.push(format!("cluster stop: {e}"));
                false
            }
        };

        let mut removed_files = Vec::new();
        for path in std::mem::take(&mut self.transient_files) {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => removed_files.push(path),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    debug!(path = %path.display(), "transient file already gone");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove transient file");
                    errors.push(format!("remove {}: {e}", path.display()));
                }
            }
        }

        info!(
            cluster_stopped,
            removed_files = removed_files.len(),
            errors = errors.len(),
            "cleanup completed"
        );
        CleanupReport::Completed {
            cluster_stopped,
            removed_files,
            errors,
        }
    }
}

impl<C: ClusterControl> Drop for CleanupGuard<C> {
    fn drop(&mut self) {
        if self.released || !self.enabled {
            return;
        }
        warn!(
            panicking = std::thread::panicking(),
            "cleanup guard dropped without release, cleaning up synchronously"
        );
        if let Err(e) = self.cluster.stop_blocking() {
            warn!(error = %e, "failed to stop cluster from drop path");
        }
        for path in &self.transient_files {
            match std::fs::remove_file(path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "failed to remove transient file");
                }
            }
        }
    }
}
