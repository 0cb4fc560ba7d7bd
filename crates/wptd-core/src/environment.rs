//! Host environment verification.
//!
//! A platform id is a claim about the machine ("chrome 62.0 on linux 4.15").
//! These checks make sure the claim holds before results are attributed to
//! it. Any mismatch aborts the run: drift is for the operator to fix.

use std::path::Path;

use sysinfo::System;
use tracing::{error, info};

use crate::error::{RunError, RunResult};
use crate::platform::PlatformDescriptor;
use crate::process::{CommandRunner, CommandSpec};
use crate::version::major_minor;

/// What the pipeline needs to know about the executing host.
pub trait HostInfo {
    /// Lowercase OS family, e.g. `linux`, `darwin`, `windows`.
    fn os_family(&self) -> String;
    /// Raw OS release string, e.g. a kernel version.
    fn os_release(&self) -> Option<String>;
}

/// The machine this process runs on.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalHost;

impl HostInfo for LocalHost {
    fn os_family(&self) -> String {
        match std::env::consts::OS {
            "macos" => "darwin".to_string(),
            other => other.to_lowercase(),
        }
    }

    fn os_release(&self) -> Option<String> {
        System::kernel_version()
    }
}

/// Fails unless the host OS family equals `platform.os_name`.
pub fn verify_os_name(host: &dyn HostInfo, platform: &PlatformDescriptor) -> RunResult<()> {
    let os_name = host.os_family();
    if os_name != platform.os_name {
        return Err(RunError::Mismatch {
            what: "OS name",
            observed: os_name,
            declared: platform.os_name.clone(),
        });
    }
    Ok(())
}

/// Compares the host OS `major.minor` with the platform, pinning a wildcard.
pub fn verify_or_set_os_version(
    host: &dyn HostInfo,
    platform: &mut PlatformDescriptor,
) -> RunResult<()> {
    let release = host.os_release().unwrap_or_default();
    let os_version = major_minor(&release)?;

    if platform.has_wildcard_os_version() {
        info!(os_version = %os_version, "pinning wildcard OS version to host");
        platform.os_version = os_version;
        return Ok(());
    }

    if os_version != platform.os_version {
        return Err(RunError::Mismatch {
            what: "OS version",
            observed: os_version,
            declared: platform.os_version.clone(),
        });
    }
    Ok(())
}

/// Runs `<binary> --version` and compares its `major.minor` with the platform.
pub fn verify_browser_binary_version(
    runner: &dyn CommandRunner,
    platform: &PlatformDescriptor,
    binary: &Path,
) -> RunResult<()> {
    let spec = CommandSpec::new(binary.to_string_lossy(), ["--version"]).capturing_stdout();
    let command = spec.display();

    let output = runner.run(&spec).map_err(|e| {
        error!(command = %command, error = %e, "error executing browser binary");
        RunError::Launch {
            command: command.clone(),
            message: e.to_string(),
        }
    })?;
    if !output.success() {
        error!(command = %command, "browser binary exited with {}", output.describe_exit());
        return Err(RunError::Launch {
            command,
            message: output.describe_exit(),
        });
    }

    let version = major_minor(output.stdout.trim())?;
    if version != platform.browser_version {
        return Err(RunError::Mismatch {
            what: "browser binary version",
            observed: format!("{} ({})", version, binary.display()),
            declared: platform.browser_version.clone(),
        });
    }
    info!(binary = %binary.display(), version = %version, "browser binary matches platform");
    Ok(())
}
