//! Error taxonomy shared by every cryptdev crate.

use std::io;
use std::time::Duration;
use thiserror::Error;

pub type CryptdevResult<T> = Result<T, CryptdevError>;

#[derive(Debug, Error)]
pub enum CryptdevError {
    /// The declared intent contradicts itself or the observed system state.
    #[error("Contradiction in setup: {0}")]
    Contradiction(String),

    /// An imperative action's external tool exited non-zero.
    #[error("{action} failed for `{target}` (exit code {status}): {stderr}")]
    ToolExecution {
        action: &'static str,
        target: String,
        status: i32,
        stderr: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to launch `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` timed out after {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl CryptdevError {
    /// Build a [`CryptdevError::ToolExecution`] from a failed command.
    pub fn tool(
        action: &'static str,
        target: impl Into<String>,
        status: i32,
        stderr: impl Into<String>,
    ) -> Self {
        Self::ToolExecution {
            action,
            target: target.into(),
            status,
            stderr: stderr.into(),
        }
    }

    pub fn is_contradiction(&self) -> bool {
        matches!(self, Self::Contradiction(_))
    }
}
