//! System-backed `ContainerOps` implementation.
//!
//! Actions go through `cryptsetup` (and `wipefs` for destruction); queries use
//! `cryptsetup isLuks`/`status` and `lsblk`.

use crate::command::SystemRunner;
use crate::parse::{OutputParser, RegexOutputParser};
use cryptdev_core::config::CryptdevConfig;
use cryptdev_core::error::{CryptdevError, CryptdevResult};
use cryptdev_provider::{CommandOutput, ContainerOps, ProcessRunner};
use log::debug;
use std::path::Path;

/// Container operations backed by the host utilities.
#[derive(Debug, Clone)]
pub struct SystemContainerOps<R = SystemRunner, P = RegexOutputParser> {
    runner: R,
    parser: P,
}

impl SystemContainerOps {
    /// Resolve the tool binaries from configuration and use the default parser.
    pub fn from_config(config: &CryptdevConfig) -> CryptdevResult<Self> {
        Ok(Self::new(
            SystemRunner::from_config(config)?,
            RegexOutputParser::new(),
        ))
    }
}

impl<R, P> SystemContainerOps<R, P>
where
    R: ProcessRunner<Error = CryptdevError>,
    P: OutputParser,
{
    pub fn new(runner: R, parser: P) -> Self {
        Self { runner, parser }
    }

    /// Run an imperative command; any non-zero exit becomes a tool failure.
    fn run_action(
        &self,
        action: &'static str,
        target: &str,
        args: &[String],
    ) -> CryptdevResult<()> {
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.runner.run(&argv)?;
        if out.success() {
            return Ok(());
        }
        Err(CryptdevError::tool(action, target, out.status, out.stderr))
    }

    fn query(&self, argv: &[&str]) -> CryptdevResult<CommandOutput> {
        self.runner.run(argv)
    }
}

impl<R, P> ContainerOps for SystemContainerOps<R, P>
where
    R: ProcessRunner<Error = CryptdevError>,
    P: OutputParser,
{
    type Error = CryptdevError;

    fn create_container(&self, device: &str, key: &Path) -> CryptdevResult<()> {
        // -q: batch mode, no interactive confirmation
        let args = vec![
            "cryptsetup".to_string(),
            "luksFormat".to_string(),
            "-q".to_string(),
            device.to_string(),
            path_arg(key),
        ];
        self.run_action("creating LUKS container", device, &args)
    }

    fn open_container(&self, device: &str, key: &Path, name: &str) -> CryptdevResult<()> {
        let args = vec![
            "cryptsetup".to_string(),
            "--key-file".to_string(),
            path_arg(key),
            "open".to_string(),
            "--type".to_string(),
            "luks".to_string(),
            device.to_string(),
            name.to_string(),
        ];
        self.run_action("opening LUKS container", device, &args)
    }

    fn close_container(&self, name: &str) -> CryptdevResult<()> {
        let args = vec![
            "cryptsetup".to_string(),
            "close".to_string(),
            name.to_string(),
        ];
        self.run_action("closing LUKS container", name, &args)
    }

    fn destroy_container(&self, device: &str) -> CryptdevResult<()> {
        if let Some(name) = self.name_by_device(device)? {
            debug!("closing {name} before wiping {device}");
            self.close_container(&name)?;
        }

        let args = vec![
            "wipefs".to_string(),
            "--all".to_string(),
            device.to_string(),
        ];
        self.run_action("wiping LUKS signatures", device, &args)
    }

    fn add_key(&self, device: &str, key: &Path, new_key: &Path) -> CryptdevResult<()> {
        let args = vec![
            "cryptsetup".to_string(),
            "luksAddKey".to_string(),
            device.to_string(),
            path_arg(new_key),
            "--key-file".to_string(),
            path_arg(key),
        ];
        self.run_action("adding LUKS key", device, &args)
    }

    fn remove_key(&self, device: &str, key: &Path) -> CryptdevResult<()> {
        let args = vec![
            "cryptsetup".to_string(),
            "luksRemoveKey".to_string(),
            device.to_string(),
            "-q".to_string(),
            "--key-file".to_string(),
            path_arg(key),
        ];
        self.run_action("removing LUKS key", device, &args)
    }

    fn is_container(&self, device: &str) -> CryptdevResult<bool> {
        let out = self.query(&["cryptsetup", "isLuks", device])?;
        Ok(out.success())
    }

    fn name_by_device(&self, device: &str) -> CryptdevResult<Option<String>> {
        let out = self.query(&["lsblk", device, "-nlo", "type,name"])?;
        if !out.success() {
            return Err(CryptdevError::tool(
                "obtaining LUKS name",
                device,
                out.status,
                out.stderr,
            ));
        }
        Ok(self.parser.container_name(&out.stdout))
    }

    fn device_by_name(&self, name: &str) -> CryptdevResult<Option<String>> {
        let out = self.query(&["cryptsetup", "status", name])?;
        if !out.success() {
            debug!("mapping {name} is not active (status exit {})", out.status);
            return Ok(None);
        }
        Ok(self.parser.mapped_device(&out.stdout))
    }

    fn generate_name(&self, device: &str) -> CryptdevResult<String> {
        let out = self.query(&["lsblk", "-n", device, "-o", "UUID"])?;
        if !out.success() {
            return Err(CryptdevError::tool(
                "generating LUKS name",
                device,
                out.status,
                out.stderr,
            ));
        }

        let uuid = out
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .ok_or_else(|| {
                CryptdevError::tool(
                    "generating LUKS name",
                    device,
                    out.status,
                    "no UUID reported",
                )
            })?;
        Ok(format!("luks-{uuid}"))
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
