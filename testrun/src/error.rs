//! Run-level error types and exit code mapping
//!
//! Only conditions that abort the run before any phase executes are errors.
//! Phase failures, cluster start failures and artifact parse problems are
//! captured in the [`RunReport`](crate::report::RunReport) instead.

use testrun_cluster::ClusterError;
use testrun_core::error::TestrunError;

/// Exit code for a run where every requested mandatory phase passed.
pub const EXIT_SUCCESS: u8 = 0;

/// Exit code for any failed run.
pub const EXIT_FAILURE: u8 = 1;

/// Fatal run error.
///
/// Each variant carries enough context for a user-friendly message.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// A required tool or the container daemon is unavailable.
    #[error("prerequisite check failed: {0}")]
    Prerequisite(String),

    /// An environment setup command failed.
    #[error("environment setup failed: {0}")]
    Setup(String),

    /// Configuration loading or validation failure.
    #[error("{0}")]
    Config(#[from] TestrunError),

    /// The cluster handle could not be constructed (bad topology, bad compose command).
    #[error("cluster configuration error: {0}")]
    Cluster(#[from] ClusterError),

    /// Logging could not be initialized.
    #[error("logging error: {0}")]
    Logging(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, reports directory, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl RunError {
    /// Map the error to a process exit code.
    ///
    /// Every fatal condition exits with `1`; usage errors are reported by
    /// clap itself with `2` before a `RunError` can exist.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Prerequisite(_)
            | Self::Setup(_)
            | Self::Config(_)
            | Self::Cluster(_)
            | Self::Logging(_)
            | Self::JsonSerialize(_)
            | Self::Io(_) => EXIT_FAILURE,
        }
    }
}
