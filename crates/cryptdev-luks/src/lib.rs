#![forbid(unsafe_code)]

//! System provider for LUKS containers.
//!
//! Integrates with the host via:
//! - `cryptsetup` (format/open/close/key management/status)
//! - `lsblk` (mapping and UUID lookup)
//! - `wipefs` (signature erasure)

mod command;
mod parse;
mod system;

pub use command::{SystemRunner, Tool, Toolchain};
pub use parse::{OutputParser, RegexOutputParser};
pub use system::SystemContainerOps;
