//! Core building blocks for cryptdev.
//!
//! Holds the declared intent model, the decision predicates, and the
//! reconciliation loop, plus the configuration, error, and logging plumbing
//! shared by the backend and the CLI.

pub mod conditions;
pub mod config;
pub mod error;
pub mod intent;
pub mod logging;
pub mod reconcile;

pub use conditions::{Action, Conditions, Decision, Observed, Operation};
pub use config::{CryptdevConfig, ExecCfg, ToolsCfg};
pub use error::{CryptdevError, CryptdevResult};
pub use intent::{Intent, IntentParams, State};
pub use reconcile::{Plan, Reconciler, RunOutcome};
