//! Platform descriptors and the registry they are looked up in.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::{RunConfig, SauceSettings};
use crate::error::{RunError, RunResult};

/// Declared OS version meaning "whatever the host runs"; pinned on first run.
pub const WILDCARD_VERSION: &str = "*";

/// A named browser/OS combination under test, as listed in `browsers.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformDescriptor {
    pub browser_name: String,
    pub browser_version: String,
    pub os_name: String,
    pub os_version: String,

    /// Run on Sauce Labs instead of the local host.
    #[serde(default)]
    pub sauce: bool,

    /// Whether the dashboard promotes runs of this platform automatically.
    #[serde(default)]
    pub initially_loaded: bool,
}

impl PlatformDescriptor {
    pub fn has_wildcard_os_version(&self) -> bool {
        self.os_version == WILDCARD_VERSION
    }
}

/// `platform_id → descriptor` mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformRegistry {
    platforms: BTreeMap<String, PlatformDescriptor>,
}

impl PlatformRegistry {
    pub fn load(path: &Path) -> RunResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RunError::config(format!("cannot read platform registry {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            RunError::config(format!("invalid platform registry {}: {}", path.display(), e))
        })
    }

    /// Look up a platform; unknown ids are a configuration error.
    pub fn get(&self, platform_id: &str) -> RunResult<PlatformDescriptor> {
        self.platforms.get(platform_id).cloned().ok_or_else(|| {
            RunError::config(format!("platform_id {} not found in browsers.json", platform_id))
        })
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.platforms.keys().map(String::as_str)
    }
}

/// Browser families that get special treatment on the local host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocalBrowser {
    /// Version-checked before the run; binary passed to the runner.
    Chrome { binary: PathBuf },
    /// Installed by the runner; version-checked after the run.
    Firefox,
    Other(String),
}

impl LocalBrowser {
    pub fn name(&self) -> &str {
        match self {
            Self::Chrome { .. } => "chrome",
            Self::Firefox => "firefox",
            Self::Other(name) => name,
        }
    }
}

/// Where the browser runs, carrying only what each mode needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    Local(LocalBrowser),
    Hosted(SauceSettings),
}

impl ExecutionMode {
    /// Derive the mode from the platform and the config's credentials.
    pub fn resolve(platform: &PlatformDescriptor, config: &RunConfig) -> RunResult<Self> {
        if platform.sauce {
            let sauce = config.sauce.clone().ok_or_else(|| {
                RunError::config("platform requires Sauce Labs but config has no `sauce` section")
            })?;
            return Ok(Self::Hosted(sauce));
        }

        let browser = match platform.browser_name.as_str() {
            "chrome" => {
                let binary = config.chrome_binary.clone().ok_or_else(|| {
                    RunError::config("chrome platform requires `chrome_binary` in config")
                })?;
                LocalBrowser::Chrome { binary }
            }
            "firefox" => LocalBrowser::Firefox,
            other => LocalBrowser::Other(other.to_string()),
        };
        Ok(Self::Local(browser))
    }

    pub fn is_hosted(&self) -> bool {
        matches!(self, Self::Hosted(_))
    }
}

/// Sauce Labs names some browsers differently from WPT.
pub fn sauce_browser_name(browser_name: &str) -> &str {
    match browser_name {
        "edge" => "MicrosoftEdge",
        other => other,
    }
}
