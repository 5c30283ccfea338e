//! Output formatting abstraction for text vs JSON rendering
//!
//! The final run report flows through [`OutputWriter`], which handles format
//! switching on stdout. Progress markers (`✓`, `✗`, `⚠`) go to stderr through
//! [`print_marker`] so that stdout stays machine-readable with `--output json`.

use std::io::Write;

use colored::Colorize;
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::RunError;

/// Abstraction for writing run output in different formats.
///
/// Callers invoke `writer.render(&payload)` where `payload`
/// implements both `Serialize` (for JSON) and `Render` (for text).
pub struct OutputWriter {
    format: OutputFormat,
}

impl OutputWriter {
    /// Create a new output writer with the specified format.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use testrun::output::OutputWriter;
    /// use testrun::cli::OutputFormat;
    ///
    /// let writer = OutputWriter::new(OutputFormat::Text);
    /// ```
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Render a payload to stdout.
    pub fn render<T: Render + Serialize>(&self, payload: &T) -> Result<(), RunError> {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        self.render_to(payload, &mut handle)
    }

    /// Render a payload to an arbitrary writer.
    ///
    /// For `Text` format, delegates to `Render::render_text()`.
    /// For `Json` format, serialises via `serde_json`.
    pub fn render_to<T: Render + Serialize>(
        &self,
        payload: &T,
        w: &mut dyn Write,
    ) -> Result<(), RunError> {
        match self.format {
            OutputFormat::Text => {
                payload.render_text(w)?;
            }
            OutputFormat::Json => {
                serde_json::to_writer_pretty(&mut *w, payload)?;
                writeln!(w)?;
            }
        }
        Ok(())
    }
}

/// Trait for human-readable text rendering.
///
/// Implemented by every output payload alongside `serde::Serialize`.
pub trait Render {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()>;
}

/// Status marker printed in front of progress and failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    /// `✓`
    Success,
    /// `✗`
    Failure,
    /// `⚠`
    Warning,
}

impl Marker {
    /// Plain symbol without color.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Failure => "✗",
            Self::Warning => "⚠",
        }
    }

    /// Symbol colored for terminal output.
    pub fn colored(self) -> String {
        match self {
            Self::Success => self.symbol().green().bold().to_string(),
            Self::Failure => self.symbol().red().bold().to_string(),
            Self::Warning => self.symbol().yellow().bold().to_string(),
        }
    }
}

/// Print a marker line to stderr.
pub fn print_marker(marker: Marker, message: impl std::fmt::Display) {
    eprintln!("{} {}", marker.colored(), message);
}
