//! Harness configuration and run parameters

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::annotation::DEFAULT_OWNER;
use crate::error::{HarnessError, HarnessResult};

/// Prefix for environment variables that become run parameters
pub const PARAM_ENV_PREFIX: &str = "HEROES_E2E_PARAM_";

/// Static harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Directory receiving the HTML report and its screenshot folder
    pub output_dir: PathBuf,

    /// Title shown at the top of the report
    pub report_title: String,

    /// Capture screenshots of failing tests at all
    pub take_screenshots: bool,

    /// Let the coordinator capture failure screenshots instead of teardown
    pub listener_takes_screenshots: bool,

    /// Browser the suite drives (chromium, firefox, webkit)
    pub browser: String,

    /// Environment the application under test is deployed to
    pub environment: String,

    /// Owner used for issue links that do not name one
    pub default_issue_owner: String,

    /// Worker threads used by the suite runner
    pub threads: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("test-results"),
            report_title: "Heroes E2E Report".to_string(),
            take_screenshots: true,
            listener_takes_screenshots: true,
            browser: "chromium".to_string(),
            environment: "qa".to_string(),
            default_issue_owner: DEFAULT_OWNER.to_string(),
            threads: 1,
        }
    }
}

impl HarnessConfig {
    /// Load configuration from a TOML file, falling back to defaults when absent
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            debug!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Apply `HEROES_E2E_*` environment overrides
    pub fn with_env_overrides(mut self) -> HarnessResult<Self> {
        if let Ok(browser) = std::env::var("HEROES_E2E_BROWSER") {
            self.browser = browser;
        }
        if let Ok(env) = std::env::var("HEROES_E2E_ENV") {
            self.environment = env;
        }
        if let Ok(dir) = std::env::var("HEROES_E2E_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }
        if let Ok(threads) = std::env::var("HEROES_E2E_THREADS") {
            self.threads = threads.parse().map_err(|_| {
                HarnessError::InvalidConfig(format!("HEROES_E2E_THREADS is not a number: {}", threads))
            })?;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> HarnessResult<()> {
        if self.threads == 0 {
            return Err(HarnessError::InvalidConfig("threads must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Named parameters handed to a run (the suite-level `getParameter` lookup)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunParameters {
    values: HashMap<String, String>,
}

impl RunParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<String>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }

    /// Collect every `HEROES_E2E_PARAM_<name>` variable as parameter `<name>`
    pub fn from_env() -> Self {
        Self::from_pairs(std::env::vars().filter_map(|(key, value)| {
            key.strip_prefix(PARAM_ENV_PREFIX)
                .filter(|name| !name.is_empty())
                .map(|name| (name.to_string(), value))
        }))
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Parse a boolean run parameter.
///
/// Accepts `true`/`false` in any case. Anything else, including a missing
/// parameter, disables the feature and logs a warning.
pub fn parse_flag(params: &RunParameters, name: &str) -> bool {
    match params.get(name) {
        Some(raw) if raw.eq_ignore_ascii_case("true") => true,
        Some(raw) if raw.eq_ignore_ascii_case("false") => false,
        Some(raw) => {
            warn!("Run parameter '{}' has unparseable value '{}', defaulting to false", name, raw);
            false
        }
        None => {
            warn!("Run parameter '{}' is not set, defaulting to false", name);
            false
        }
    }
}
