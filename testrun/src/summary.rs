//! Summary Aggregator
//!
//! Reads the structured artifacts the external test runners leave under the
//! reports directory and folds them, together with the phase results, into a
//! [`RunSummary`].
//!
//! - JUnit XML: `tests`, `failures`, `errors`, `skipped` summed over every `<testsuite>`
//! - Cobertura XML: root `line-rate`, truncated (never rounded) to an integer percent
//! - Benchmark: presence of the result and report files
//!
//! A missing or unreadable artifact only drops the corresponding field.
//! Summarizing never fails the run. Artifacts left over from an earlier run are
//! removed before each phase starts (see [`ArtifactPaths::produced_by`]), so
//! whatever is found here was written by this run.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;
use testrun_core::config::TestrunConfig;
use testrun_core::types::{ExitClass, PhaseKind, PhaseResult};
use tracing::{debug, warn};

/// Test counts parsed from a JUnit report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TestCounts {
    pub tests: u64,
    pub failures: u64,
    pub errors: u64,
    pub skipped: u64,
}

impl TestCounts {
    /// Tests that neither failed, errored nor were skipped.
    pub fn passed(&self) -> u64 {
        self.tests
            .saturating_sub(self.failures)
            .saturating_sub(self.errors)
            .saturating_sub(self.skipped)
    }
}

impl std::ops::AddAssign for TestCounts {
    fn add_assign(&mut self, rhs: Self) {
        self.tests += rhs.tests;
        self.failures += rhs.failures;
        self.errors += rhs.errors;
        self.skipped += rhs.skipped;
    }
}

/// One phase line of the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhaseSummary {
    pub phase: PhaseKind,
    pub outcome: ExitClass,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub counts: Option<TestCounts>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Benchmark artifacts found after the benchmark phase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BenchmarkArtifacts {
    /// Machine-readable results, if written
    pub results: Option<PathBuf>,
    /// Human-readable report, if written
    pub report: Option<PathBuf>,
}

/// Aggregate of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    /// Executed (or recorded as not run) phases in execution order
    pub phases: Vec<PhaseSummary>,
    /// Unit-test line coverage, truncated to an integer percent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage_percent: Option<u32>,
    /// Present only when the benchmark phase ran
    #[serde(skip_serializing_if = "Option::is_none")]
    pub benchmark: Option<BenchmarkArtifacts>,
}

impl RunSummary {
    /// Summary line of a phase, if it was recorded.
    pub fn phase(&self, kind: PhaseKind) -> Option<&PhaseSummary> {
        self.phases.iter().find(|p| p.phase == kind)
    }
}

/// Where the external runners write their artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// JUnit XML per phase
    pub results: HashMap<PhaseKind, PathBuf>,
    /// Cobertura coverage XML
    pub coverage: Option<PathBuf>,
    /// Benchmark HTML report
    pub benchmark_report: Option<PathBuf>,
}

impl ArtifactPaths {
    /// Resolves artifact paths against the reports directory.
    pub fn from_config(config: &TestrunConfig) -> Self {
        let mut results = HashMap::new();
        for (kind, phase) in [
            (PhaseKind::Unit, &config.phases.unit),
            (PhaseKind::EndToEnd, &config.phases.e2e),
            (PhaseKind::Benchmark, &config.phases.benchmark),
        ] {
            if let Some(file) = &phase.results_file {
                results.insert(kind, config.report_path(file));
            }
        }
        Self {
            results,
            coverage: Some(config.report_path(&config.general.coverage_file)),
            benchmark_report: Some(config.report_path(&config.benchmark.report_file)),
        }
    }

    /// Result artifact of a phase.
    pub fn results_for(&self, kind: PhaseKind) -> Option<&Path> {
        self.results.get(&kind).map(PathBuf::as_path)
    }

    /// Every artifact the phase is expected to (re)write.
    pub fn produced_by(&self, kind: PhaseKind) -> Vec<&Path> {
        let extra = match kind {
            PhaseKind::Unit => self.coverage.as_deref(),
            PhaseKind::EndToEnd => None,
            PhaseKind::Benchmark => self.benchmark_report.as_deref(),
        };
        self.results_for(kind).into_iter().chain(extra).collect()
    }
}

/// Compiled artifact patterns.
pub struct ArtifactParser {
    testsuite: Regex,
    attribute: Regex,
    line_rate: Regex,
}

impl ArtifactParser {
    /// Compiles the patterns.
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            testsuite: Regex::new(r"<testsuite\b([^>]*)>")?,
            attribute: Regex::new(r#"([A-Za-z_][\w.-]*)\s*=\s*"([^"]*)""#)?,
            line_rate: Regex::new(r#"<coverage\b[^>]*?\bline-rate\s*=\s*"([0-9.]+)""#)?,
        })
    }

    /// Sums the counts of every `<testsuite>` element.
    ///
    /// Returns `None` if the document has no `<testsuite>` element.
    pub fn junit_counts(&self, xml: &str) -> Option<TestCounts> {
        let mut total: Option<TestCounts> = None;
        for suite in self.testsuite.captures_iter(xml) {
            let attrs = suite.get(1).map_or("", |m| m.as_str());
            let mut counts = TestCounts::default();
            for attr in self.attribute.captures_iter(attrs) {
                let value = attr[2].trim().parse::<u64>().unwrap_or(0);
                match &attr[1] {
                    "tests" => counts.tests = value,
                    "failures" => counts.failures = value,
                    "errors" => counts.errors = value,
                    "skipped" | "skips" => counts.skipped = value,
                    _ => {}
                }
            }
            *total.get_or_insert_with(TestCounts::default) += counts;
        }
        total
    }

    /// Root `line-rate` of a Cobertura report as a truncated percent.
    pub fn coverage_percent(&self, xml: &str) -> Option<u32> {
        let caps = self.line_rate.captures(xml)?;
        truncate_rate_to_percent(&caps[1])
    }
}

/// `"0.2987"` -> `29`, `"1"` -> `100`.
///
/// Works on the decimal text so that values such as `0.29` are not lost to
/// binary floating point (`0.29 * 100.0 == 28.999...`).
pub fn truncate_rate_to_percent(rate: &str) -> Option<u32> {
    let (int_part, frac_part) = rate.split_once('.').unwrap_or((rate, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit()) || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let whole: u32 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };
    let hundredths: u32 = frac_part
        .chars()
        .chain(std::iter::repeat('0'))
        .take(2)
        .collect::<String>()
        .parse()
        .ok()?;

    whole.checked_mul(100)?.checked_add(hundredths)
}

/// Builds the run summary from phase results and on-disk artifacts.
pub fn summarize(results: &[PhaseResult], paths: &ArtifactPaths) -> RunSummary {
    let parser = match ArtifactParser::new() {
        Ok(parser) => Some(parser),
        Err(e) => {
            warn!(error = %e, "artifact patterns failed to compile, counts omitted");
            None
        }
    };

    let phases = results
        .iter()
        .map(|result| {
            let counts = parser.as_ref().and_then(|p| {
                // a phase that never ran cannot have produced an artifact of this run
                if result.exit_code.is_none() && !result.timed_out {
                    return None;
                }
                // benchmark results are not JUnit, only their presence is reported
                if result.phase == PhaseKind::Benchmark {
                    return None;
                }
                let path = paths.results_for(result.phase)?;
                read_artifact(path).and_then(|xml| {
                    let counts = p.junit_counts(&xml);
                    if counts.is_none() {
                        warn!(path = %path.display(), "no <testsuite> element in result artifact");
                    }
                    counts
                })
            });
            PhaseSummary {
                phase: result.phase,
                outcome: result.class(),
                exit_code: result.exit_code,
                timed_out: result.timed_out,
                duration_ms: u64::try_from(result.duration().as_millis()).unwrap_or(u64::MAX),
                counts,
                note: result.note.clone(),
            }
        })
        .collect();

    let ran = |kind: PhaseKind| {
        results
            .iter()
            .any(|r| r.phase == kind && (r.exit_code.is_some() || r.timed_out))
    };

    let coverage_percent = if ran(PhaseKind::Unit) {
        parser.as_ref().and_then(|p| {
            let path = paths.coverage.as_deref()?;
            let xml = read_artifact(path)?;
            let percent = p.coverage_percent(&xml);
            if percent.is_none() {
                warn!(path = %path.display(), "no line-rate in coverage report");
            }
            percent
        })
    } else {
        None
    };

    let benchmark = ran(PhaseKind::Benchmark).then(|| BenchmarkArtifacts {
        results: existing(paths.results_for(PhaseKind::Benchmark)),
        report: existing(paths.benchmark_report.as_deref()),
    });

    RunSummary {
        phases,
        coverage_percent,
        benchmark,
    }
}

fn read_artifact(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "artifact not found, field omitted");
            None
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to read artifact, field omitted");
            None
        }
    }
}

fn existing(path: Option<&Path>) -> Option<PathBuf> {
    path.filter(|p| p.is_file()).map(Path::to_path_buf)
}
