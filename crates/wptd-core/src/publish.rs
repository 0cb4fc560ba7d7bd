//! Result publishing: storage upload and dashboard registration.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::artifact::ArtifactLayout;
use crate::error::{RunError, RunResult};
use crate::platform::PlatformDescriptor;
use crate::process::{CommandRunner, CommandSpec};

/// User agent for registration requests.
const USER_AGENT_VALUE: &str = concat!("wptd-runner/", env!("CARGO_PKG_VERSION"));

/// Required length of the registration secret.
pub const SECRET_LEN: usize = 64;

/// Reject a missing or malformed secret. Called before any expensive work.
pub fn validate_secret(secret: Option<&str>) -> RunResult<()> {
    match secret {
        Some(s) if s.chars().count() == SECRET_LEN => Ok(()),
        Some(s) => Err(RunError::config(format!(
            "valid secret required to create TestRun: expected {} characters, got {}",
            SECRET_LEN,
            s.chars().count()
        ))),
        None => Err(RunError::config(
            "valid secret required to create TestRun: no secret configured",
        )),
    }
}

/// Fail unless `gsutil` is on PATH.
pub fn verify_upload_tool(runner: &dyn CommandRunner) -> RunResult<()> {
    let spec = CommandSpec::new("which", ["gsutil"]).capturing_stdout();
    let output = runner.run(&spec).map_err(|e| RunError::Upload {
        message: format!("cannot look up gsutil: {}", e),
    })?;
    if !output.success() || output.stdout.trim().is_empty() {
        return Err(RunError::Upload {
            message: "gsutil required for upload".to_string(),
        });
    }
    debug!(gsutil = %output.stdout.trim(), "found upload tool");
    Ok(())
}

/// Sync the local revision directory to `gs://<bucket>/<short_revision>`.
///
/// Artifacts are already gzip-encoded, so the object metadata says so and
/// browsers decode them transparently.
pub fn upload_results(
    runner: &dyn CommandRunner,
    layout: &ArtifactLayout,
    bucket: &str,
) -> RunResult<String> {
    let short = layout.short_revision();
    let destination = format!("gs://{}/{}", bucket, short);
    let spec = CommandSpec::new(
        "gsutil",
        [
            "-m",
            "-h",
            "Content-Encoding:gzip",
            "rsync",
            "-r",
            short,
            destination.as_str(),
        ],
    )
    .in_dir(layout.build_path());

    info!(destination = %destination, "uploading results");
    let output = runner.run(&spec).map_err(|e| RunError::Upload {
        message: format!("{}: {}", spec.display(), e),
    })?;
    if !output.success() {
        return Err(RunError::Upload {
            message: format!("{}: {}", spec.display(), output.describe_exit()),
        });
    }

    let url = layout.summary_url(bucket);
    info!(url = %url, "successfully uploaded");
    Ok(url)
}

/// Body of `POST /api/run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunRecord {
    pub browser_name: String,
    pub browser_version: String,
    pub os_name: String,
    pub os_version: String,
    pub revision: String,
    pub results_url: String,
}

impl TestRunRecord {
    pub fn new(platform: &PlatformDescriptor, short_revision: &str, results_url: &str) -> Self {
        Self {
            browser_name: platform.browser_name.clone(),
            browser_version: platform.browser_version.clone(),
            os_name: platform.os_name.clone(),
            os_version: platform.os_version.clone(),
            revision: short_revision.to_string(),
            results_url: results_url.to_string(),
        }
    }
}

/// What the dashboard said. Registration never fails the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    Created { body: String },
    Rejected { status: u16, body: String },
    Unreachable { message: String },
}

impl RegistrationOutcome {
    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created { .. })
    }
}

/// Client for the dashboard's test run API.
#[derive(Debug, Clone)]
pub struct RegistrationClient {
    client: reqwest::Client,
    base_url: String,
    secret: String,
}

impl RegistrationClient {
    /// Requests wait for the dashboard indefinitely unless `timeout` is set.
    pub fn new(
        host: &str,
        secret: impl Into<String>,
        timeout: Option<Duration>,
    ) -> RunResult<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let mut builder = reqwest::Client::builder().default_headers(default_headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| RunError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: host.trim_end_matches('/').to_string(),
            secret: secret.into(),
        })
    }

    /// `POST {host}/api/run?secret=…`. 201 is success; anything else is
    /// logged and returned, not raised.
    pub async fn register(&self, record: &TestRunRecord) -> RegistrationOutcome {
        let url = format!("{}/api/run", self.base_url);
        info!(url = %url, revision = %record.revision, "creating new TestRun in the dashboard");

        let response = self
            .client
            .post(&url)
            .query(&[("secret", self.secret.as_str())])
            .json(record)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                // reqwest errors embed the URL, which carries the secret.
                let message = e.without_url().to_string();
                warn!(error = %message, "could not reach dashboard");
                return RegistrationOutcome::Unreachable { message };
            }
        };

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::CREATED {
            info!("run created");
            RegistrationOutcome::Created { body }
        } else {
            warn!(status = status.as_u16(), body = %body, "there was an issue creating the TestRun");
            RegistrationOutcome::Rejected {
                status: status.as_u16(),
                body,
            }
        }
    }
}
