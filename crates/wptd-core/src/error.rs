//! Error types for the run pipeline.

/// Every way a run can abort.
///
/// Each variant corresponds to one pipeline stage and carries enough context
/// for an operator to see which stage failed and why. Nothing here is
/// retried; the pipeline propagates the first error it hits.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// Missing or invalid configuration, unknown platform id, malformed secret.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// A version string had no `major.minor` token.
    #[error("no major.minor version found in {input:?}")]
    Format { input: String },

    /// The declared platform does not match the host.
    #[error("{what} does not match platform: host has {observed:?}, platform declares {declared:?}")]
    Mismatch {
        what: &'static str,
        observed: String,
        declared: String,
    },

    /// A browser binary could not be executed to query its version.
    #[error("failed to execute {command}: {message}")]
    Launch { command: String, message: String },

    /// A source-control or manifest command failed.
    #[error("command `{command}` failed: {message}")]
    Vcs { command: String, message: String },

    /// `git apply` rejected the rendered patch.
    #[error("failed to apply patch {path}: {message}")]
    Patch { path: String, message: String },

    /// The test runner could not be started at all.
    #[error("failed to start test runner `{command}`: {message}")]
    Runner { command: String, message: String },

    /// The report file is missing or not a valid report.
    #[error("unreadable report {path}: {message}")]
    Report { path: String, message: String },

    /// The same test path appeared twice in one report.
    #[error("test {test} appears more than once in the report")]
    DuplicateTest { test: String },

    /// The report parsed but held no results.
    #[error("0 test results in {path}, something went wrong")]
    EmptyReport { path: String },

    /// An artifact could not be written or read.
    #[error("artifact {path}: {message}")]
    Artifact { path: String, message: String },

    /// The upload tool is missing or the sync failed.
    #[error("upload failed: {message}")]
    Upload { message: String },
}

impl RunError {
    /// Pipeline stage the error belongs to, for operator-facing messages.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Format { .. } | Self::Mismatch { .. } | Self::Launch { .. } => "environment",
            Self::Vcs { .. } | Self::Patch { .. } => "checkout",
            Self::Runner { .. } => "run",
            Self::Report { .. } | Self::DuplicateTest { .. } | Self::EmptyReport { .. } => {
                "summarize"
            }
            Self::Artifact { .. } => "write",
            Self::Upload { .. } => "upload",
        }
    }

    /// Exit code for CLI.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,

            // Environment drift
            Self::Format { .. } => 3,
            Self::Mismatch { .. } => 3,
            Self::Launch { .. } => 3,

            // Checkout
            Self::Vcs { .. } => 4,
            Self::Patch { .. } => 4,

            // Run and results
            Self::Runner { .. } => 5,
            Self::Report { .. } => 5,
            Self::DuplicateTest { .. } => 5,
            Self::EmptyReport { .. } => 5,

            Self::Artifact { .. } => 6,
            Self::Upload { .. } => 7,
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result type for pipeline operations.
pub type RunResult<T> = Result<T, RunError>;
