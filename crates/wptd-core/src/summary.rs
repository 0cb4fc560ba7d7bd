//! wptreport parsing and reduction to per-file pass counts.
//!
//! The summary keeps one `[passed, total]` pair per test file: the file's own
//! status counts once, each subtest counts once more. A file-level `OK` means
//! the harness ran cleanly and counts as a pass; at subtest level only an
//! exact `PASS` does.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RunError, RunResult};

/// Status reported by wptrunner for a test or subtest.
///
/// Unrecognized statuses are kept verbatim so per-test artifacts round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TestStatus {
    Pass,
    Ok,
    Fail,
    Error,
    Timeout,
    NotRun,
    Crash,
    PreconditionFailed,
    Skip,
    Other(String),
}

impl TestStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pass => "PASS",
            Self::Ok => "OK",
            Self::Fail => "FAIL",
            Self::Error => "ERROR",
            Self::Timeout => "TIMEOUT",
            Self::NotRun => "NOTRUN",
            Self::Crash => "CRASH",
            Self::PreconditionFailed => "PRECONDITION_FAILED",
            Self::Skip => "SKIP",
            Self::Other(s) => s,
        }
    }

    /// Passing at test-file level.
    pub fn is_file_pass(&self) -> bool {
        matches!(self, Self::Pass | Self::Ok)
    }

    /// Passing at subtest level.
    pub fn is_subtest_pass(&self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl From<String> for TestStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PASS" => Self::Pass,
            "OK" => Self::Ok,
            "FAIL" => Self::Fail,
            "ERROR" => Self::Error,
            "TIMEOUT" => Self::Timeout,
            "NOTRUN" => Self::NotRun,
            "CRASH" => Self::Crash,
            "PRECONDITION_FAILED" => Self::PreconditionFailed,
            "SKIP" => Self::Skip,
            _ => Self::Other(s),
        }
    }
}

impl From<TestStatus> for String {
    fn from(status: TestStatus) -> Self {
        match status {
            TestStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtestResult {
    pub status: TestStatus,
    /// `name`, `message`, `expected`, ... passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One test file's result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestResult {
    /// Path of the test within WPT, with a leading `/`.
    pub test: String,
    pub status: TestStatus,
    #[serde(default)]
    pub subtests: Vec<SubtestResult>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The runner's `--log-wptreport` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawReport {
    pub results: Vec<TestResult>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawReport {
    /// Read a report file, rejecting reports with no results.
    pub fn load(path: &Path) -> RunResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| RunError::Report {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let report: Self = serde_json::from_str(&text).map_err(|e| RunError::Report {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        if report.results.is_empty() {
            return Err(RunError::EmptyReport {
                path: path.display().to_string(),
            });
        }
        Ok(report)
    }
}

/// `[passed, total]` for one test file.
pub type PassCount = [u32; 2];

/// Test path → `[passed, total]`, ordered by path.
pub type Summary = BTreeMap<String, PassCount>;

/// Reduce a report to per-file pass counts.
pub fn summarize(report: &RawReport) -> RunResult<Summary> {
    let mut summary = Summary::new();

    for result in &report.results {
        if summary.contains_key(&result.test) {
            return Err(RunError::DuplicateTest {
                test: result.test.clone(),
            });
        }

        let mut counts: PassCount = if result.status.is_file_pass() {
            [1, 1]
        } else {
            [0, 1]
        };
        for subtest in &result.subtests {
            if subtest.status.is_subtest_pass() {
                counts[0] += 1;
            }
            counts[1] += 1;
        }

        summary.insert(result.test.clone(), counts);
    }

    Ok(summary)
}
