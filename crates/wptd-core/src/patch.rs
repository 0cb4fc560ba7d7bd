//! WPT checkout patching.
//!
//! The dashboard keeps `util/wpt.patch` to keep long runs stable. It carries a
//! placeholder for the Sauce platform name: `--sauce-platform` rejects
//! spaces on the command line, but Sauce wants e.g. `windows 10`, so the
//! spaced value is baked into the patched source instead.

use tracing::{debug, info};

use crate::config::RunConfig;
use crate::error::{RunError, RunResult};
use crate::platform::PlatformDescriptor;
use crate::process::{CommandRunner, CommandSpec};

/// Token in the patch template replaced by `"{os_name} {os_version}"`.
pub const PLATFORM_PLACEHOLDER: &str = "__platform_hack__";

/// Substitute the platform placeholder. Pure text transform.
pub fn render_patch(template: &str, platform: &PlatformDescriptor) -> String {
    let platform_name = format!("{} {}", platform.os_name, platform.os_version);
    template.replace(PLATFORM_PLACEHOLDER, &platform_name)
}

/// Render the configured patch template and `git apply` it to the checkout.
///
/// The checkout must be clean: applying onto an already-patched tree fails.
pub fn apply_patch(
    runner: &dyn CommandRunner,
    config: &RunConfig,
    platform: &PlatformDescriptor,
) -> RunResult<()> {
    let patch_path = config.patch_path();
    let template = std::fs::read_to_string(&patch_path).map_err(|e| RunError::Patch {
        path: patch_path.display().to_string(),
        message: e.to_string(),
    })?;
    let patch = render_patch(&template, platform);

    let spec = CommandSpec::new("git", ["apply", "-"])
        .in_dir(&config.wpt_path)
        .with_stdin(patch);
    debug!(command = %spec.display(), patch = %patch_path.display(), "applying patch");

    let output = runner.run(&spec).map_err(|e| RunError::Patch {
        path: patch_path.display().to_string(),
        message: e.to_string(),
    })?;
    if !output.success() {
        return Err(RunError::Patch {
            path: patch_path.display().to_string(),
            message: format!("git apply: {}", output.describe_exit()),
        });
    }

    info!(patch = %patch_path.display(), "applied patch to WPT checkout");
    Ok(())
}
