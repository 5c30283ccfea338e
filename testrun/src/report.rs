//! Final run report
//!
//! Combines the phase results, skipped phases, the aggregated summary and the
//! cleanup outcome. The exit code is derived here and nowhere else.

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use testrun_core::config::RunConfig;
use testrun_core::types::{ExitClass, PhaseKind, PhaseResult};

use crate::cleanup::CleanupReport;
use crate::error::{EXIT_FAILURE, EXIT_SUCCESS};
use crate::output::{Marker, Render};
use crate::summary::{PhaseSummary, RunSummary};

/// Phases requested for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RequestedPhases {
    pub unit: bool,
    pub e2e: bool,
    pub benchmarks: bool,
}

impl From<&RunConfig> for RequestedPhases {
    fn from(run: &RunConfig) -> Self {
        Self {
            unit: run.run_unit,
            e2e: run.run_e2e,
            benchmarks: run.run_benchmarks,
        }
    }
}

/// A requested phase that was deliberately not attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedPhase {
    pub phase: PhaseKind,
    pub reason: String,
}

/// Everything the phase sequencing produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunRecord {
    /// One entry per executed (or not-run-but-failed) phase, in order
    pub results: Vec<PhaseResult>,
    /// Requested phases that were skipped
    pub skipped: Vec<SkippedPhase>,
    /// Cluster start failure message, if any
    pub cluster_error: Option<String>,
    /// Signal that interrupted the run, if any
    pub interrupted_by: Option<String>,
}

impl RunRecord {
    /// Result of a phase, if it was recorded.
    pub fn result(&self, kind: PhaseKind) -> Option<&PhaseResult> {
        self.results.iter().find(|r| r.phase == kind)
    }

    /// Whether a phase was skipped.
    pub fn was_skipped(&self, kind: PhaseKind) -> bool {
        self.skipped.iter().any(|s| s.phase == kind)
    }
}

/// Report of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub passed: bool,
    pub requested: RequestedPhases,
    #[serde(flatten)]
    pub record: RunRecord,
    pub summary: RunSummary,
    pub cleanup: CleanupReport,
}

impl RunReport {
    /// Assembles the report and decides the overall outcome.
    pub fn new(
        run_id: impl Into<String>,
        requested: RequestedPhases,
        record: RunRecord,
        summary: RunSummary,
        cleanup: CleanupReport,
    ) -> Self {
        let passed = overall_success(requested, &record);
        Self {
            run_id: run_id.into(),
            passed,
            requested,
            record,
            summary,
            cleanup,
        }
    }

    /// `true` iff (unit requested => unit passed) and (e2e requested => e2e passed)
    /// and the run was not interrupted. The benchmark never matters.
    pub fn succeeded(&self) -> bool {
        self.passed
    }

    /// Process exit code for this report.
    pub fn exit_code(&self) -> u8 {
        if self.passed { EXIT_SUCCESS } else { EXIT_FAILURE }
    }

    /// Result of a phase, if it was recorded.
    pub fn result(&self, kind: PhaseKind) -> Option<&PhaseResult> {
        self.record.result(kind)
    }

    /// Writes the plain-text report (no colors) to a file.
    pub fn write_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::io::BufWriter::new(std::fs::File::create(path)?);
        self.write_text(&mut file, false)?;
        file.flush()
    }

    fn write_text(&self, w: &mut dyn Write, color: bool) -> std::io::Result<()> {
        let paint = |marker: Marker| {
            if color {
                marker.colored()
            } else {
                marker.symbol().to_owned()
            }
        };

        writeln!(w, "Test run {}", self.run_id)?;
        writeln!(w)?;

        for phase in &self.summary.phases {
            let marker = match phase.outcome {
                ExitClass::Success => Marker::Success,
                _ if !phase.phase.is_mandatory() => Marker::Warning,
                _ => Marker::Failure,
            };
            writeln!(
                w,
                "  {} {:<10} {:<10} {:>8}{}",
                paint(marker),
                phase.phase.to_string(),
                phase.outcome.to_string(),
                format_duration_ms(phase.duration_ms),
                describe_phase(phase),
            )?;
        }
        for skipped in &self.record.skipped {
            writeln!(
                w,
                "  - {:<10} {:<10} {:>8}  ({})",
                skipped.phase.to_string(),
                "skipped",
                "",
                skipped.reason
            )?;
        }

        if let Some(cluster_error) = &self.record.cluster_error {
            writeln!(w)?;
            writeln!(w, "  cluster: {cluster_error}")?;
        }

        if let Some(percent) = self.summary.coverage_percent {
            writeln!(w)?;
            writeln!(w, "  coverage: {percent}%")?;
        }

        if let Some(bench) = &self.summary.benchmark {
            writeln!(w)?;
            match &bench.results {
                Some(path) => writeln!(w, "  benchmark results: {}", path.display())?,
                None => writeln!(w, "  benchmark results: not produced")?,
            }
            if let Some(path) = &bench.report {
                writeln!(w, "  benchmark report: {}", path.display())?;
            }
        }

        writeln!(w)?;
        match &self.cleanup {
            CleanupReport::Skipped {
                left_running,
                kept_files,
            } => {
                writeln!(
                    w,
                    "  cleanup: skipped (cluster {}, {} transient file(s) kept)",
                    if *left_running { "left running" } else { "not running" },
                    kept_files.len()
                )?;
            }
            CleanupReport::Completed {
                cluster_stopped,
                removed_files,
                errors,
            } => {
                writeln!(
                    w,
                    "  cleanup: {}, {} transient file(s) removed",
                    if *cluster_stopped {
                        "cluster stopped"
                    } else {
                        "no cluster to stop"
                    },
                    removed_files.len()
                )?;
                for error in errors {
                    writeln!(w, "    {} {error}", paint(Marker::Warning))?;
                }
            }
        }

        if let Some(signal) = &self.record.interrupted_by {
            writeln!(w, "  interrupted by {signal}")?;
        }

        writeln!(w)?;
        let verdict = if self.passed { "PASSED" } else { "FAILED" };
        if color {
            let verdict = if self.passed {
                verdict.green().bold()
            } else {
                verdict.red().bold()
            };
            writeln!(w, "RESULT: {verdict}")?;
        } else {
            writeln!(w, "RESULT: {verdict}")?;
        }
        Ok(())
    }
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        self.write_text(w, true)
    }
}

fn overall_success(requested: RequestedPhases, record: &RunRecord) -> bool {
    if record.interrupted_by.is_some() {
        return false;
    }
    let phase_ok = |kind: PhaseKind| record.result(kind).is_some_and(PhaseResult::succeeded);
    (!requested.unit || phase_ok(PhaseKind::Unit)) && (!requested.e2e || phase_ok(PhaseKind::EndToEnd))
}

fn describe_phase(phase: &PhaseSummary) -> String {
    let mut parts = Vec::new();
    if let Some(counts) = &phase.counts {
        parts.push(format!(
            "{} tests, {} failed, {} errors, {} skipped",
            counts.tests, counts.failures, counts.errors, counts.skipped
        ));
    }
    if let Some(note) = &phase.note {
        parts.push(note.clone());
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("  ({})", parts.join("; "))
    }
}

fn format_duration_ms(ms: u64) -> String {
    format!("{}.{}s", ms / 1000, (ms % 1000) / 100)
}
