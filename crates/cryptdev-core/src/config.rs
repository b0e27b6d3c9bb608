//! Configuration model for the external tooling cryptdev drives.

use crate::error::{CryptdevError, CryptdevResult};
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/cryptdev.toml";
pub const CONFIG_PATH_ENV: &str = "CRYPTDEV_CONFIG";

/// Optional overrides for the utilities cryptdev shells out to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolsCfg {
    #[serde(default)]
    pub cryptsetup_path: Option<String>,

    #[serde(default)]
    pub lsblk_path: Option<String>,

    #[serde(default)]
    pub wipefs_path: Option<String>,
}

/// Process execution knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecCfg {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ExecCfg {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Top-level configuration snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CryptdevConfig {
    #[serde(default)]
    pub tools: ToolsCfg,

    #[serde(default)]
    pub exec: ExecCfg,

    /// Where the configuration was read from; `None` for built-in defaults.
    #[serde(skip)]
    pub path: Option<PathBuf>,
}

impl CryptdevConfig {
    /// Read and parse a TOML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> CryptdevResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let mut cfg = toml::from_str::<Self>(&contents)?;
        cfg.path = Some(path.to_path_buf());

        let issues = cfg.validate();
        if !issues.is_empty() {
            return Err(CryptdevError::InvalidConfig(format!(
                "{}: {}",
                path.display(),
                issues.join("; ")
            )));
        }
        Ok(cfg)
    }

    /// Load the effective configuration.
    ///
    /// An explicit path must exist. Otherwise `CRYPTDEV_CONFIG` is consulted,
    /// then [`DEFAULT_CONFIG_PATH`]; when neither exists the built-in defaults
    /// are used.
    pub fn resolve(explicit: Option<&Path>) -> CryptdevResult<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Some(path) = env::var_os(CONFIG_PATH_ENV).filter(|value| !value.is_empty()) {
            return Self::load(PathBuf::from(path));
        }

        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        if default_path.exists() {
            return Self::load(default_path);
        }

        debug!("no configuration at {DEFAULT_CONFIG_PATH}; using built-in defaults");
        Ok(Self::default())
    }

    /// Best-effort validation pass returning human-readable issues.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.exec.timeout_secs == 0 {
            issues.push("exec.timeout_secs must be greater than 0".to_string());
        }

        let overrides = [
            ("tools.cryptsetup_path", &self.tools.cryptsetup_path),
            ("tools.lsblk_path", &self.tools.lsblk_path),
            ("tools.wipefs_path", &self.tools.wipefs_path),
        ];
        for (key, value) in overrides {
            if matches!(value, Some(path) if path.trim().is_empty()) {
                issues.push(format!("{key} must not be blank when set"));
            }
        }

        issues
    }

    /// Translate the stored timeout into a `Duration`.
    pub fn exec_timeout(&self) -> Duration {
        Duration::from_secs(self.exec.timeout_secs)
    }
}
