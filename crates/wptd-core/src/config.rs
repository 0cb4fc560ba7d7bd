//! Run configuration.
//!
//! Loaded once from `run/running.yaml` before the pipeline starts and
//! read-only afterwards. Path-valued keys may reference environment
//! variables (`$HOME/wpt`, `${BUILD}/out`) so one file works across
//! operators' machines.
//!
//! | Key | Description |
//! |-----|-------------|
//! | `build_path` | Output directory for report log and artifacts |
//! | `wpt_path` | WPT checkout the runner executes in |
//! | `wptd_path` | Dashboard repo (patch template, platform registry) |
//! | `chrome_binary` | Chrome binary for local chrome runs |
//! | `sauce` | Sauce Labs credentials for hosted runs |
//! | `gs_results_bucket` | Storage bucket for uploads |
//! | `wptd_prod_host` | Dashboard host for test run registration |
//! | `secret` | Registration secret (`WPTD_SECRET` overrides) |
//! | `registration_timeout_secs` | Optional registration request timeout |

use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::{RunError, RunResult};

/// Default location of the config file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "run/running.yaml";

/// Environment variable that overrides `secret`.
pub const SECRET_ENV: &str = "WPTD_SECRET";

lazy_static! {
    static ref ENV_REF: Regex =
        Regex::new(r"\$(?:\{([A-Za-z_][A-Za-z0-9_]*)\}|([A-Za-z_][A-Za-z0-9_]*))").unwrap();
}

/// Sauce Labs connection settings for hosted runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SauceSettings {
    pub user: String,
    pub key: String,
    /// Path to the `sc` tunnel binary.
    pub connect_path: PathBuf,
    pub tunnel_id: String,
}

/// Resolved configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub build_path: PathBuf,
    pub wpt_path: PathBuf,
    pub wptd_path: PathBuf,

    #[serde(default)]
    pub chrome_binary: Option<PathBuf>,

    #[serde(default)]
    pub sauce: Option<SauceSettings>,

    #[serde(default = "default_bucket")]
    pub gs_results_bucket: String,

    #[serde(default = "default_host")]
    pub wptd_prod_host: String,

    #[serde(default)]
    pub secret: Option<String>,

    /// Bound on the registration request; unset waits indefinitely.
    #[serde(default)]
    pub registration_timeout_secs: Option<u64>,
}

fn default_bucket() -> String {
    "wptd".to_string()
}

fn default_host() -> String {
    "https://wpt.fyi".to_string()
}

impl RunConfig {
    /// Minimal config rooted at the given directories.
    pub fn new(
        build_path: impl Into<PathBuf>,
        wpt_path: impl Into<PathBuf>,
        wptd_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            build_path: build_path.into(),
            wpt_path: wpt_path.into(),
            wptd_path: wptd_path.into(),
            chrome_binary: None,
            sauce: None,
            gs_results_bucket: default_bucket(),
            wptd_prod_host: default_host(),
            secret: None,
            registration_timeout_secs: None,
        }
    }

    /// Load from a YAML file, expanding environment references in path keys.
    pub fn load(path: &Path) -> RunResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            RunError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&text)
            .map_err(|e| RunError::config(format!("{}: {}", path.display(), e)))
    }

    /// Parse from YAML text. Applies env expansion and the secret override.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        let mut cfg: Self = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        cfg.expand_paths();
        if let Ok(secret) = std::env::var(SECRET_ENV) {
            cfg.secret = Some(secret);
        }
        Ok(cfg)
    }

    fn expand_paths(&mut self) {
        self.build_path = expand_path(&self.build_path);
        self.wpt_path = expand_path(&self.wpt_path);
        self.wptd_path = expand_path(&self.wptd_path);
        if let Some(bin) = &self.chrome_binary {
            self.chrome_binary = Some(expand_path(bin));
        }
        if let Some(sauce) = &mut self.sauce {
            sauce.connect_path = expand_path(&sauce.connect_path);
        }
    }

    /// Patch template applied to the WPT checkout before each run.
    pub fn patch_path(&self) -> PathBuf {
        self.wptd_path.join("util").join("wpt.patch")
    }

    /// Platform registry shipped with the dashboard repo.
    pub fn platforms_path(&self) -> PathBuf {
        self.wptd_path.join("webapp").join("browsers.json")
    }

    /// Firefox binary installed by `./wpt run --install-browser`.
    pub fn installed_firefox_path(&self) -> PathBuf {
        self.wpt_path.join("_venv").join("firefox").join("firefox")
    }

    pub fn with_chrome_binary(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_binary = Some(path.into());
        self
    }

    pub fn with_sauce(mut self, sauce: SauceSettings) -> Self {
        self.sauce = Some(sauce);
        self
    }

    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.gs_results_bucket = bucket.into();
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.wptd_prod_host = host.into();
        self
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Replace `$VAR` / `${VAR}` with the variable's value. Unset variables are
/// left as written.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REF
        .replace_all(input, |caps: &Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(expand_env_vars(&path.to_string_lossy()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const SAMPLE: &str = r#"
build_path: $WPTD_TEST_ROOT/build
wpt_path: ${WPTD_TEST_ROOT}/wpt
wptd_path: /srv/wptd
chrome_binary: $WPTD_TEST_ROOT/chrome
gs_results_bucket: wptd-staging
sauce:
  user: ci
  key: k3y
  connect_path: $WPTD_TEST_ROOT/sc
  tunnel_id: tunnel-1
"#;

    #[test]
    #[serial]
    fn test_load_expands_path_keys() {
        std::env::set_var("WPTD_TEST_ROOT", "/home/op");
        std::env::remove_var(SECRET_ENV);
        let cfg = RunConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(cfg.build_path, PathBuf::from("/home/op/build"));
        assert_eq!(cfg.wpt_path, PathBuf::from("/home/op/wpt"));
        assert_eq!(cfg.chrome_binary, Some(PathBuf::from("/home/op/chrome")));
        assert_eq!(
            cfg.sauce.as_ref().unwrap().connect_path,
            PathBuf::from("/home/op/sc")
        );
        assert_eq!(cfg.gs_results_bucket, "wptd-staging");
        assert_eq!(cfg.wptd_prod_host, "https://wpt.fyi");
        assert!(cfg.secret.is_none());
        assert!(cfg.registration_timeout_secs.is_none());
        std::env::remove_var("WPTD_TEST_ROOT");
    }

    #[test]
    #[serial]
    fn test_secret_env_overrides_file() {
        std::env::set_var(SECRET_ENV, "from-env");
        let cfg = RunConfig::from_yaml("build_path: b\nwpt_path: w\nwptd_path: d\nsecret: from-file\n")
            .unwrap();
        assert_eq!(cfg.secret.as_deref(), Some("from-env"));
        std::env::remove_var(SECRET_ENV);
    }

    #[test]
    #[serial]
    fn test_unknown_variable_left_verbatim() {
        std::env::remove_var("WPTD_DEFINITELY_UNSET");
        assert_eq!(
            expand_env_vars("$WPTD_DEFINITELY_UNSET/x"),
            "$WPTD_DEFINITELY_UNSET/x"
        );
    }

    #[test]
    #[serial]
    fn test_registration_timeout_is_opt_in() {
        std::env::remove_var(SECRET_ENV);
        let cfg = RunConfig::from_yaml(
            "build_path: b\nwpt_path: w\nwptd_path: d\nregistration_timeout_secs: 30\n",
        )
        .unwrap();
        assert_eq!(cfg.registration_timeout_secs, Some(30));
        assert!(RunConfig::new("/b", "/w", "/d").registration_timeout_secs.is_none());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = RunConfig::load(Path::new("/nonexistent/running.yaml")).unwrap_err();
        assert!(matches!(err, RunError::Config { .. }));
        assert!(err.to_string().contains("/nonexistent/running.yaml"));
    }

    #[test]
    fn test_missing_required_key_is_error() {
        assert!(RunConfig::from_yaml("build_path: b\n").is_err());
    }

    #[test]
    fn test_derived_paths() {
        let cfg = RunConfig::new("/b", "/w", "/d");
        assert_eq!(cfg.patch_path(), PathBuf::from("/d/util/wpt.patch"));
        assert_eq!(cfg.platforms_path(), PathBuf::from("/d/webapp/browsers.json"));
        assert_eq!(
            cfg.installed_firefox_path(),
            PathBuf::from("/w/_venv/firefox/firefox")
        );
    }
}
