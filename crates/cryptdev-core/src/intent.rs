//! Declared intent for one reconciliation run.

use crate::error::{CryptdevError, CryptdevResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Desired existence of the container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum State {
    #[default]
    Present,
    Absent,
}

impl FromStr for State {
    type Err = CryptdevError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "present" => Ok(State::Present),
            "absent" => Ok(State::Absent),
            other => Err(CryptdevError::InvalidConfig(format!(
                "Invalid 'state' value: '{other}'. Allowed values are: 'present', 'absent'"
            ))),
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Present => f.write_str("present"),
            State::Absent => f.write_str("absent"),
        }
    }
}

/// Caller-supplied parameters exactly as they arrive from the host.
///
/// Every field is optional so that "not supplied" stays distinguishable from an
/// explicit `false` or empty value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentParams {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub open: Option<bool>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub key: Option<PathBuf>,
    #[serde(default)]
    pub new_key: Option<PathBuf>,
    #[serde(default)]
    pub remove_key: Option<PathBuf>,
}

impl IntentParams {
    /// Overlay every field set in `other` on top of `self`.
    pub fn merge(self, other: IntentParams) -> IntentParams {
        IntentParams {
            device: other.device.or(self.device),
            state: other.state.or(self.state),
            open: other.open.or(self.open),
            name: other.name.or(self.name),
            key: other.key.or(self.key),
            new_key: other.new_key.or(self.new_key),
            remove_key: other.remove_key.or(self.remove_key),
        }
    }
}

/// Validated, immutable description of the desired container state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Intent {
    pub device: Option<String>,
    pub state: State,
    /// `None` leaves the mapping alone, `Some(true)` opens, `Some(false)` closes.
    pub open: Option<bool>,
    pub name: Option<String>,
    pub key: Option<PathBuf>,
    pub new_key: Option<PathBuf>,
    pub remove_key: Option<PathBuf>,
}

impl Intent {
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn key(&self) -> Option<&Path> {
        self.key.as_deref()
    }

    pub fn new_key(&self) -> Option<&Path> {
        self.new_key.as_deref()
    }

    pub fn remove_key(&self) -> Option<&Path> {
        self.remove_key.as_deref()
    }

    pub fn is_present(&self) -> bool {
        self.state == State::Present
    }

    pub fn is_absent(&self) -> bool {
        self.state == State::Absent
    }

    /// An explicit request to open; an unset `open` is not one.
    pub fn requests_open(&self) -> bool {
        self.open == Some(true)
    }

    /// An explicit request to close; an unset `open` is not one.
    pub fn requests_close(&self) -> bool {
        self.open == Some(false)
    }
}

impl TryFrom<IntentParams> for Intent {
    type Error = CryptdevError;

    fn try_from(params: IntentParams) -> CryptdevResult<Self> {
        let state = match params.state.as_deref() {
            None => State::default(),
            Some(value) => value.parse()?,
        };

        Ok(Intent {
            device: params.device,
            state,
            open: params.open,
            name: params.name,
            key: params.key,
            new_key: params.new_key,
            remove_key: params.remove_key,
        })
    }
}
