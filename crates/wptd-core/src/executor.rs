//! WPT checkout preparation and test runner invocation.
//!
//! The executor owns the WPT checkout for the duration of a run. Every
//! source-control step must succeed; a partially updated tree is never
//! trusted.

use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{RunConfig, SauceSettings};
use crate::error::{RunError, RunResult};
use crate::patch::apply_patch;
use crate::platform::{sauce_browser_name, ExecutionMode, LocalBrowser, PlatformDescriptor};
use crate::process::{CommandRunner, CommandSpec};
use crate::revision::{resolve_revision, ShaFinder};

/// Tree sync steps run before patching, in order.
const SYNC_STEPS: &[&[&str]] = &[
    // Drop the previous run's patch.
    &["git", "reset", "--hard", "HEAD"],
    &["git", "checkout", "master"],
    &["git", "pull"],
    &["./wpt", "manifest", "--work"],
];

/// Firefox needs a fake media stream for getUserMedia tests under xvfb.
const FIREFOX_FAKE_MEDIA_PREF: &str = "media.navigator.streams.fake=true";

pub struct RunExecutor<'a> {
    runner: &'a dyn CommandRunner,
    config: &'a RunConfig,
}

impl<'a> RunExecutor<'a> {
    pub fn new(runner: &'a dyn CommandRunner, config: &'a RunConfig) -> Self {
        Self { runner, config }
    }

    /// Reset, update, patch and check out the revision under test.
    ///
    /// Returns the full revision that was checked out.
    pub fn prepare_checkout(
        &self,
        platform: &PlatformDescriptor,
        explicit_revision: Option<&str>,
        finder: &dyn ShaFinder,
    ) -> RunResult<String> {
        info!(wpt_path = %self.config.wpt_path.display(), "setting up WPT checkout");
        for step in SYNC_STEPS {
            let spec = CommandSpec::new(step[0], step[1..].iter().copied());
            self.run_vcs(spec)?;
        }

        apply_patch(self.runner, self.config, platform)?;

        let revision = resolve_revision(explicit_revision, finder, &self.config.wpt_path)?;
        info!(revision = %revision, "current WPT revision");
        self.run_vcs(CommandSpec::new("git", ["checkout", revision.as_str()]))?;
        Ok(revision)
    }

    fn run_vcs(&self, spec: CommandSpec) -> RunResult<()> {
        let spec = spec.in_dir(&self.config.wpt_path);
        debug!(command = %spec.display(), "running");
        let output = self.runner.run(&spec).map_err(|e| RunError::Vcs {
            command: spec.display(),
            message: e.to_string(),
        })?;
        if !output.success() {
            return Err(RunError::Vcs {
                command: spec.display(),
                message: output.describe_exit(),
            });
        }
        Ok(())
    }

    /// Run the test runner. A non-zero exit is logged and returned; whether the
    /// run is usable is decided by the report it left behind.
    pub fn invoke(&self, argv: &[String]) -> RunResult<Option<i32>> {
        let spec = CommandSpec::from_argv(argv).in_dir(&self.config.wpt_path);
        info!(command = %redact_argv(argv).join(" "), "running WPT");

        let output = self.runner.run(&spec).map_err(|e| RunError::Runner {
            command: spec.program.clone(),
            message: e.to_string(),
        })?;
        if output.success() {
            info!("finished WPT run");
        } else {
            warn!(
                "finished WPT run with {}; continuing with the report",
                output.describe_exit()
            );
        }
        Ok(output.code)
    }
}

/// Full argv for `./wpt run` in the given mode.
pub fn build_run_command(
    platform: &PlatformDescriptor,
    mode: &ExecutionMode,
    path_filter: Option<&str>,
    report_path: &Path,
) -> Vec<String> {
    let mut command: Vec<String> = match mode {
        ExecutionMode::Hosted(sauce) => hosted_command(platform, sauce, path_filter),
        ExecutionMode::Local(browser) => local_command(browser, path_filter),
    };

    command.push("--log-mach=-".to_string());
    command.push("--log-wptreport".to_string());
    command.push(report_path.display().to_string());
    command.push("--install-fonts".to_string());
    command
}

fn hosted_command(
    platform: &PlatformDescriptor,
    sauce: &SauceSettings,
    path_filter: Option<&str>,
) -> Vec<String> {
    let mut command = vec![
        "./wpt".to_string(),
        "run".to_string(),
        format!(
            "sauce:{}:{}",
            sauce_browser_name(&platform.browser_name),
            platform.browser_version
        ),
    ];
    if let Some(path) = path_filter {
        command.push(path.to_string());
    }
    command.extend([
        format!("--sauce-platform={}", platform.os_name),
        format!("--sauce-key={}", sauce.key),
        format!("--sauce-user={}", sauce.user),
        format!("--sauce-connect-binary={}", sauce.connect_path.display()),
        format!("--sauce-tunnel-id={}", sauce.tunnel_id),
        "--no-restart-on-unexpected".to_string(),
        "--processes=2".to_string(),
        "--run-by-dir=3".to_string(),
    ]);
    command
}

fn local_command(browser: &LocalBrowser, path_filter: Option<&str>) -> Vec<String> {
    let mut command = vec![
        "xvfb-run".to_string(),
        "--auto-servernum".to_string(),
        "./wpt".to_string(),
        "run".to_string(),
        browser.name().to_string(),
    ];
    if let Some(path) = path_filter {
        command.push(path.to_string());
    }
    match browser {
        LocalBrowser::Chrome { binary } => {
            command.push("--binary".to_string());
            command.push(binary.display().to_string());
        }
        LocalBrowser::Firefox => {
            command.extend([
                "--install-browser".to_string(),
                "--yes".to_string(),
                "--certutil-binary=certutil".to_string(),
                "--setpref".to_string(),
                FIREFOX_FAKE_MEDIA_PREF.to_string(),
            ]);
        }
        LocalBrowser::Other(_) => {}
    }
    command
}

/// Copy of `argv` safe for logs.
pub fn redact_argv(argv: &[String]) -> Vec<String> {
    argv.iter()
        .map(|arg| match arg.strip_prefix("--sauce-key=") {
            Some(_) => "--sauce-key=[REDACTED]".to_string(),
            None => arg.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::fake::ScriptedRunner;
    use crate::revision::fake::FixedShaFinder;
    use std::path::PathBuf;

    fn platform(browser: &str, sauce: bool) -> PlatformDescriptor {
        PlatformDescriptor {
            browser_name: browser.into(),
            browser_version: "15.15063".into(),
            os_name: "windows".into(),
            os_version: "10".into(),
            sauce,
            initially_loaded: false,
        }
    }

    fn sauce() -> SauceSettings {
        SauceSettings {
            user: "wptd".into(),
            key: "s3cr3t".into(),
            connect_path: PathBuf::from("/opt/sc"),
            tunnel_id: "tunnel-7".into(),
        }
    }

    const REPORT: &str = "/build/wptd-0123456789-p-report.log";

    #[test]
    fn test_hosted_command_renames_edge_and_inserts_path() {
        let argv = build_run_command(
            &platform("edge", true),
            &ExecutionMode::Hosted(sauce()),
            Some("/dom"),
            Path::new(REPORT),
        );
        assert_eq!(
            argv,
            vec![
                "./wpt",
                "run",
                "sauce:MicrosoftEdge:15.15063",
                "/dom",
                "--sauce-platform=windows",
                "--sauce-key=s3cr3t",
                "--sauce-user=wptd",
                "--sauce-connect-binary=/opt/sc",
                "--sauce-tunnel-id=tunnel-7",
                "--no-restart-on-unexpected",
                "--processes=2",
                "--run-by-dir=3",
                "--log-mach=-",
                "--log-wptreport",
                REPORT,
                "--install-fonts",
            ]
        );
    }

    #[test]
    fn test_local_chrome_command() {
        let argv = build_run_command(
            &platform("chrome", false),
            &ExecutionMode::Local(LocalBrowser::Chrome {
                binary: PathBuf::from("/usr/bin/google-chrome"),
            }),
            Some("/css"),
            Path::new(REPORT),
        );
        assert_eq!(&argv[..6], &["xvfb-run", "--auto-servernum", "./wpt", "run", "chrome", "/css"]);
        assert_eq!(&argv[6..8], &["--binary", "/usr/bin/google-chrome"]);
        assert_eq!(argv.last().map(String::as_str), Some("--install-fonts"));
    }

    #[test]
    fn test_local_firefox_command() {
        let argv = build_run_command(
            &platform("firefox", false),
            &ExecutionMode::Local(LocalBrowser::Firefox),
            None,
            Path::new(REPORT),
        );
        assert_eq!(argv[4], "firefox");
        assert_eq!(argv[5], "--install-browser");
        assert!(argv.contains(&"--certutil-binary=certutil".to_string()));
        let pref = argv.iter().position(|a| a == "--setpref").unwrap();
        assert_eq!(argv[pref + 1], FIREFOX_FAKE_MEDIA_PREF);
        assert!(!argv.iter().any(|a| a == "--binary"));
    }

    #[test]
    fn test_hosted_command_without_path() {
        let argv = build_run_command(
            &platform("safari", true),
            &ExecutionMode::Hosted(sauce()),
            None,
            Path::new(REPORT),
        );
        assert_eq!(
            &argv[..4],
            &[
                "./wpt",
                "run",
                "sauce:safari:15.15063",
                "--sauce-platform=windows"
            ]
        );
    }

    #[test]
    fn test_local_other_browser_has_no_browser_flags() {
        let argv = build_run_command(
            &platform("webkitgtk", false),
            &ExecutionMode::Local(LocalBrowser::Other("webkitgtk".into())),
            None,
            Path::new(REPORT),
        );
        assert_eq!(
            argv,
            vec![
                "xvfb-run",
                "--auto-servernum",
                "./wpt",
                "run",
                "webkitgtk",
                "--log-mach=-",
                "--log-wptreport",
                REPORT,
                "--install-fonts",
            ]
        );
    }

    #[test]
    fn test_redaction_hides_sauce_key() {
        let argv = build_run_command(
            &platform("safari", true),
            &ExecutionMode::Hosted(sauce()),
            None,
            Path::new(REPORT),
        );
        let redacted = redact_argv(&argv).join(" ");
        assert!(!redacted.contains("s3cr3t"));
        assert!(redacted.contains("--sauce-key=[REDACTED]"));
    }

    fn config(dir: &Path) -> RunConfig {
        let wptd = dir.join("wptd");
        std::fs::create_dir_all(wptd.join("util")).unwrap();
        std::fs::write(wptd.join("util").join("wpt.patch"), "__platform_hack__\n").unwrap();
        RunConfig::new(dir.join("build"), dir.join("wpt"), wptd)
    }

    #[test]
    fn test_prepare_checkout_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let runner = ScriptedRunner::new();
        let finder = FixedShaFinder {
            today: None,
            head: "abcdef0123456789",
        };

        let sha = RunExecutor::new(&runner, &cfg)
            .prepare_checkout(&platform("chrome", false), None, &finder)
            .unwrap();

        assert_eq!(sha, "abcdef0123456789");
        assert_eq!(
            runner.command_lines(),
            vec![
                "git reset --hard HEAD",
                "git checkout master",
                "git pull",
                "./wpt manifest --work",
                "git apply -",
                "git checkout abcdef0123456789",
            ]
        );
        assert!(runner
            .calls()
            .iter()
            .all(|c| c.cwd.as_deref() == Some(cfg.wpt_path.as_path())));
    }

    #[test]
    fn test_failed_pull_aborts_before_patch() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let runner = ScriptedRunner::new().respond("git pull", 1, "");
        let finder = FixedShaFinder {
            today: None,
            head: "abc",
        };

        let err = RunExecutor::new(&runner, &cfg)
            .prepare_checkout(&platform("chrome", false), None, &finder)
            .unwrap_err();
        assert!(matches!(err, RunError::Vcs { ref command, .. } if command == "git pull"));
        assert_eq!(runner.calls().len(), 3);
    }

    #[test]
    fn test_failed_checkout_is_vcs_error() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = config(dir.path());
        let runner = ScriptedRunner::new().respond("git checkout deadbeef", 1, "");
        let finder = FixedShaFinder {
            today: None,
            head: "abc",
        };

        let err = RunExecutor::new(&runner, &cfg)
            .prepare_checkout(&platform("chrome", false), Some("deadbeef"), &finder)
            .unwrap_err();
        assert!(matches!(err, RunError::Vcs { .. }));
    }

    #[test]
    fn test_invoke_tolerates_nonzero_exit() {
        let cfg = RunConfig::new("/b", "/w", "/d");
        let runner = ScriptedRunner::new().respond("xvfb-run", 1, "");
        let argv: Vec<String> = ["xvfb-run", "--auto-servernum", "./wpt", "run", "chrome"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let code = RunExecutor::new(&runner, &cfg).invoke(&argv).unwrap();
        assert_eq!(code, Some(1));
        assert_eq!(runner.calls()[0].program, "xvfb-run");
    }

    #[test]
    fn test_invoke_spawn_failure_is_runner_error() {
        let cfg = RunConfig::new("/b", "/w", "/d");
        let runner = ScriptedRunner::new().missing("xvfb-run");
        let argv = vec!["xvfb-run".to_string()];
        assert!(matches!(
            RunExecutor::new(&runner, &cfg).invoke(&argv),
            Err(RunError::Runner { .. })
        ));
    }
}
