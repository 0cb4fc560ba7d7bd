use std::path::PathBuf;

use clap::Parser;

/// Runs WPT for one platform and writes gzip JSON results under `build_path`.
///
/// Nothing is uploaded unless `--upload` is given. For a production run:
///
///     wptd-run firefox-56.0-linux --upload --create-testrun
#[derive(Parser, Debug, Clone)]
#[command(name = "wptd-run", version)]
pub struct Cli {
    /// A platform ID, specified as keys in browsers.json.
    pub platform_id: String,

    /// WPT path to run. If not specified, runs all WPT.
    #[arg(long)]
    pub path: Option<String>,

    /// Upload results to Google Storage.
    #[arg(long)]
    pub upload: bool,

    /// Create a new TestRun in the dashboard. Results are promoted
    /// automatically if "initially_loaded" is true for the platform.
    #[arg(long)]
    pub create_testrun: bool,

    /// Log level to output (overridden by RUST_LOG).
    #[arg(long, default_value = "info")]
    pub log: String,

    /// WPT commit SHA to test instead of today's.
    #[arg(long = "wpt-sha", alias = "wpt_sha")]
    pub wpt_sha: Option<String>,

    /// Run configuration file.
    #[arg(long, default_value = wptd_core::DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Platform registry; defaults to webapp/browsers.json in wptd_path.
    #[arg(long)]
    pub platforms: Option<PathBuf>,
}

impl Cli {
    /// `--log` as an `EnvFilter` directive.
    pub fn log_directive(&self) -> String {
        self.log.to_lowercase()
    }
}
