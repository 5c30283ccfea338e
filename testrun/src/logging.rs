//! Logging for a test run.
//!
//! testrun shares the terminal with the test runners it launches: phase
//! output is inherited on stdout/stderr and the final report goes to stdout.
//! Diagnostics therefore always go to stderr, in one of two formats taken
//! from `[general]` (or `--log-format`):
//!
//! * `pretty` - for a developer watching the run
//! * `json` - one object per line for CI log collectors; every line emitted
//!   inside the run carries the `run_id` span field
//!
//! `RUST_LOG` overrides `log_level`. Without it, the Docker client stack is
//! held at `warn` so readiness polling does not bury the phase markers.

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use testrun_core::config::GeneralConfig;

/// Directives appended to the configured level when `RUST_LOG` is unset.
const QUIET_DEPENDENCIES: &[&str] = &["bollard=warn", "hyper=warn", "hyper_util=warn"];

/// Diagnostic output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    /// Parses the `log_format` setting.
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Filter directives for the configured level.
fn default_directives(level: &str) -> String {
    std::iter::once(level)
        .chain(QUIET_DEPENDENCIES.iter().copied())
        .collect::<Vec<_>>()
        .join(",")
}

/// Install the global subscriber. Call once, before the first run starts.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format = LogFormat::parse(&config.log_format)?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directives(&config.log_level)))
        .map_err(|e| anyhow::anyhow!("invalid log level '{}': {}", config.log_level, e))?;

    let registry = tracing_subscriber::registry().with(env_filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))
}
