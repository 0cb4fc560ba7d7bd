//! Run pipeline for collecting web-platform-tests results for the dashboard.
//!
//! One invocation tests one declared platform (browser name/version on an OS
//! name/version):
//!
//! - verify the host matches the platform
//! - sync, patch and check out the WPT tree at the revision under test
//! - run `./wpt run` with the platform's arguments
//! - reduce the wptreport to per-file `[passed, total]` counts
//! - write the summary and per-test results as gzip JSON
//! - optionally upload them and register the run with the dashboard
//!
//! # Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use wptd_core::{
//!     GitShaFinder, LocalHost, Pipeline, PlatformRegistry, RunConfig, RunOptions, SystemRunner,
//! };
//!
//! # async fn example() -> Result<(), wptd_core::RunError> {
//! let config = RunConfig::load(Path::new("run/running.yaml"))?;
//! let platform = PlatformRegistry::load(&config.platforms_path())?.get("chrome-62.0-linux")?;
//! let runner = SystemRunner;
//! let finder = GitShaFinder::new(&runner);
//! let pipeline = Pipeline {
//!     config: &config,
//!     runner: &runner,
//!     host: &LocalHost,
//!     finder: &finder,
//! };
//! let options = RunOptions {
//!     platform_id: "chrome-62.0-linux".into(),
//!     ..RunOptions::default()
//! };
//! let outcome = pipeline.run(platform, &options).await?;
//! println!("summary at {}", outcome.summary_path.display());
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod config;
pub mod environment;
pub mod error;
pub mod executor;
pub mod patch;
pub mod pipeline;
pub mod platform;
pub mod process;
pub mod publish;
pub mod revision;
pub mod summary;
pub mod version;

pub use artifact::{read_gzip_json, write_gzip_json, ArtifactLayout};
pub use config::{RunConfig, SauceSettings, DEFAULT_CONFIG_PATH};
pub use environment::{HostInfo, LocalHost};
pub use error::{RunError, RunResult};
pub use pipeline::{Pipeline, RunOptions, RunOutcome};
pub use platform::{ExecutionMode, LocalBrowser, PlatformDescriptor, PlatformRegistry};
pub use process::{CommandOutput, CommandRunner, CommandSpec, SystemRunner};
pub use publish::{RegistrationOutcome, TestRunRecord};
pub use revision::{GitShaFinder, ShaFinder};
pub use summary::{summarize, RawReport, Summary, TestResult, TestStatus};
pub use version::major_minor;
