//! Provider contract for a single encrypted container.
//!
//! Actions fail loudly on any tool failure. Queries treat "nothing here" as
//! ordinary data (`false` / `None`) and only fail when the inspection tool
//! itself cannot answer.

use std::error::Error;
use std::path::Path;

/// Abstraction over container lifecycle and key-management commands.
pub trait ContainerOps {
    type Error: Error + Send + Sync + 'static;

    /// Format `device` as a new container authorised by `key`.
    fn create_container(&self, device: &str, key: &Path) -> Result<(), Self::Error>;

    /// Unlock the container on `device` and map it under `name`.
    fn open_container(&self, device: &str, key: &Path, name: &str) -> Result<(), Self::Error>;

    /// Remove the mapping called `name`.
    fn close_container(&self, name: &str) -> Result<(), Self::Error>;

    /// Erase the container on `device`.
    ///
    /// Implementations must close any open mapping of the container before
    /// the signatures are wiped.
    fn destroy_container(&self, device: &str) -> Result<(), Self::Error>;

    /// Enroll `new_key`, authenticating with the existing `key`.
    fn add_key(&self, device: &str, key: &Path, new_key: &Path) -> Result<(), Self::Error>;

    /// Drop the keyslot unlocked by `key`.
    fn remove_key(&self, device: &str, key: &Path) -> Result<(), Self::Error>;

    /// Whether `device` carries a valid container header.
    fn is_container(&self, device: &str) -> Result<bool, Self::Error>;

    /// Name of the open mapping backed by `device`, if any.
    fn name_by_device(&self, device: &str) -> Result<Option<String>, Self::Error>;

    /// Backing device of the open mapping `name`, if it is open.
    fn device_by_name(&self, name: &str) -> Result<Option<String>, Self::Error>;

    /// Deterministic mapping name derived from the device UUID (`luks-<UUID>`).
    fn generate_name(&self, device: &str) -> Result<String, Self::Error>;
}
