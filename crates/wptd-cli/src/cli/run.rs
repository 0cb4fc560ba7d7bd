use std::io::{self, Write};

use anyhow::Context;
use wptd_core::{
    GitShaFinder, LocalHost, Pipeline, PlatformRegistry, RegistrationOutcome, RunConfig,
    RunError, RunOptions, RunOutcome, SystemRunner,
};

use super::args::Cli;
use crate::exit_codes::SUCCESS;

pub async fn run(cli: Cli) -> anyhow::Result<i32> {
    match execute(&cli).await {
        Ok(outcome) => {
            report(&mut io::stdout().lock(), &outcome)
                .context("failed to write run report to stdout")?;
            Ok(SUCCESS)
        }
        Err(e) => {
            eprintln!("fatal [{}]: {}", e.stage(), e);
            Ok(e.exit_code())
        }
    }
}

async fn execute(cli: &Cli) -> Result<RunOutcome, RunError> {
    let config = RunConfig::load(&cli.config)?;
    let platforms_path = cli
        .platforms
        .clone()
        .unwrap_or_else(|| config.platforms_path());
    let platform = PlatformRegistry::load(&platforms_path)?.get(&cli.platform_id)?;

    let options = RunOptions {
        platform_id: cli.platform_id.clone(),
        path_filter: cli.path.clone().filter(|p| !p.is_empty()),
        upload: cli.upload,
        create_testrun: cli.create_testrun,
        revision: cli.wpt_sha.clone(),
    };

    let runner = SystemRunner;
    let finder = GitShaFinder::new(&runner);
    let pipeline = Pipeline {
        config: &config,
        runner: &runner,
        host: &LocalHost,
        finder: &finder,
    };
    pipeline.run(platform, &options).await
}

fn report(out: &mut impl Write, outcome: &RunOutcome) -> io::Result<()> {
    writeln!(
        out,
        "PLATFORM: {} {} on {} {}",
        outcome.platform.browser_name,
        outcome.platform.browser_version,
        outcome.platform.os_name,
        outcome.platform.os_version
    )?;
    writeln!(out, "WPT revision: {}", outcome.revision)?;
    if let Some(code) = outcome.runner_exit_code {
        writeln!(out, "Return code from wptrunner: {}", code)?;
    }
    writeln!(out, "Wrote summary: {}", outcome.summary_path.display())?;
    writeln!(
        out,
        "Wrote {} individual result files",
        outcome.results_written
    )?;
    if let Some(url) = &outcome.results_url {
        writeln!(out, "HTTP summary URL: {}", url)?;
    }
    match &outcome.registration {
        Some(RegistrationOutcome::Created { body }) => {
            writeln!(out, "Run created!")?;
            writeln!(out, "Response text: {}", body)?;
        }
        Some(RegistrationOutcome::Rejected { status, body }) => {
            writeln!(out, "There was an issue creating the TestRun.")?;
            writeln!(out, "Response status code: {}", status)?;
            writeln!(out, "Response text: {}", body)?;
        }
        Some(RegistrationOutcome::Unreachable { message }) => {
            writeln!(out, "There was an issue creating the TestRun: {}", message)?;
        }
        None => {}
    }
    out.flush()
}
