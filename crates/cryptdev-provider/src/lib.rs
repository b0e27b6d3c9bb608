#![forbid(unsafe_code)]

//! Collaborator contracts shared across cryptdev.
//!
//! The reconciliation engine only ever talks to the outside world through the
//! traits in this crate, so it can be driven by the real `cryptsetup` backend or
//! by an in-memory fake in tests.

pub mod container;
pub mod process;

pub use container::ContainerOps;
pub use process::{CommandOutput, ProcessRunner};
