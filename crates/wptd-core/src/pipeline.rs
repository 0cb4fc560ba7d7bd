//! One end-to-end run: verify, check out, run, summarize, write, publish.
//!
//! Stages run strictly in order and the first error aborts the run. The only
//! tolerated failures are a non-zero test runner exit (the report decides)
//! and dashboard registration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::info;

use crate::artifact::{remove_stale, write_gzip_json, ArtifactLayout};
use crate::config::RunConfig;
use crate::environment::{
    verify_browser_binary_version, verify_or_set_os_version, verify_os_name, HostInfo,
};
use crate::error::RunResult;
use crate::executor::{build_run_command, RunExecutor};
use crate::platform::{ExecutionMode, LocalBrowser, PlatformDescriptor};
use crate::process::CommandRunner;
use crate::publish::{
    upload_results, validate_secret, verify_upload_tool, RegistrationClient,
    RegistrationOutcome, TestRunRecord,
};
use crate::revision::{short_revision, ShaFinder};
use crate::summary::{summarize, RawReport};

/// Per-invocation choices, typically from the command line.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub platform_id: String,
    /// Restrict the run to one WPT path.
    pub path_filter: Option<String>,
    pub upload: bool,
    /// Register the run with the dashboard (only after an upload).
    pub create_testrun: bool,
    /// Test this revision instead of today's or HEAD.
    pub revision: Option<String>,
}

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub platform: PlatformDescriptor,
    pub revision: String,
    pub short_revision: String,
    pub runner_exit_code: Option<i32>,
    pub summary_path: PathBuf,
    pub results_written: usize,
    pub results_url: Option<String>,
    pub registration: Option<RegistrationOutcome>,
}

/// Collaborators the pipeline drives.
pub struct Pipeline<'a> {
    pub config: &'a RunConfig,
    pub runner: &'a dyn CommandRunner,
    pub host: &'a dyn HostInfo,
    pub finder: &'a dyn ShaFinder,
}

impl Pipeline<'_> {
    pub async fn run(
        &self,
        mut platform: PlatformDescriptor,
        options: &RunOptions,
    ) -> RunResult<RunOutcome> {
        let config = self.config;
        info!(platform_id = %options.platform_id, ?platform, "starting run");
        match &options.path_filter {
            Some(path) => info!(path = %path, "running tests in path"),
            None => info!("running all tests"),
        }

        // Cheap preconditions first, before touching the checkout.
        if options.create_testrun {
            validate_secret(config.secret.as_deref())?;
        }
        if options.upload {
            verify_upload_tool(self.runner)?;
        }

        let mode = ExecutionMode::resolve(&platform, config)?;
        if let ExecutionMode::Local(browser) = &mode {
            if let LocalBrowser::Chrome { binary } = browser {
                verify_browser_binary_version(self.runner, &platform, binary)?;
            }
            verify_os_name(self.host, &platform)?;
            verify_or_set_os_version(self.host, &mut platform)?;
        }
        info!(
            browser_version = %platform.browser_version,
            os_name = %platform.os_name,
            os_version = %platform.os_version,
            "platform information"
        );

        let executor = RunExecutor::new(self.runner, config);
        let revision =
            executor.prepare_checkout(&platform, options.revision.as_deref(), self.finder)?;
        let short = short_revision(&revision).to_string();
        let layout = ArtifactLayout::new(&config.build_path, &short, &options.platform_id);

        let report_path = layout.report_log_path();
        // Only a report written by this run may be summarized.
        remove_stale(&report_path)?;
        let argv = build_run_command(
            &platform,
            &mode,
            options.path_filter.as_deref(),
            &report_path,
        );
        let runner_exit_code = executor.invoke(&argv)?;

        // The runner installs firefox itself and it may self-update mid-run.
        if let ExecutionMode::Local(LocalBrowser::Firefox) = &mode {
            info!("verifying installed firefox matches platform");
            verify_browser_binary_version(
                self.runner,
                &platform,
                &config.installed_firefox_path(),
            )?;
        }

        let report = RawReport::load(&report_path)?;
        let summary = summarize(&report)?;

        let summary_path = layout.summary_path();
        write_gzip_json(&summary_path, &summary)?;
        info!(path = %summary_path.display(), tests = summary.len(), "wrote summary");

        for result in &report.results {
            write_gzip_json(&layout.result_path(&result.test), result)?;
        }
        info!(
            dir = %layout.revision_dir().display(),
            count = report.results.len(),
            "wrote individual result files"
        );

        let mut outcome = RunOutcome {
            platform,
            revision,
            short_revision: short.clone(),
            runner_exit_code,
            summary_path,
            results_written: report.results.len(),
            results_url: None,
            registration: None,
        };

        if !options.upload {
            info!("stopping here (pass --upload to upload results)");
            return Ok(outcome);
        }
        let results_url = upload_results(self.runner, &layout, &config.gs_results_bucket)?;
        outcome.results_url = Some(results_url.clone());

        if !options.create_testrun {
            info!("stopping here (pass --create-testrun to create and promote this TestRun)");
            return Ok(outcome);
        }
        // Validated above.
        let secret = config.secret.clone().unwrap_or_default();
        let client = RegistrationClient::new(
            &config.wptd_prod_host,
            secret,
            config.registration_timeout_secs.map(Duration::from_secs),
        )?;
        let record = TestRunRecord::new(&outcome.platform, &short, &results_url);
        outcome.registration = Some(client.register(&record).await);

        Ok(outcome)
    }
}
