//! Execution wrapper for invoking `cryptsetup`, `lsblk`, and `wipefs`.
//!
//! Shell integration stays isolated here so the container operations remain
//! testable against fake binaries or a scripted [`ProcessRunner`].

use cryptdev_core::config::{CryptdevConfig, ToolsCfg};
use cryptdev_core::error::{CryptdevError, CryptdevResult};
use cryptdev_provider::{CommandOutput, ProcessRunner};
use log::debug;
use std::env;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const SBIN_DIRS: &[&str] = &["/usr/sbin", "/usr/bin", "/sbin", "/bin", "/usr/local/sbin"];

/// Utilities the container backend is allowed to launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tool {
    Cryptsetup,
    Lsblk,
    Wipefs,
}

impl Tool {
    pub const ALL: [Tool; 3] = [Tool::Cryptsetup, Tool::Lsblk, Tool::Wipefs];

    pub fn program(self) -> &'static str {
        match self {
            Tool::Cryptsetup => "cryptsetup",
            Tool::Lsblk => "lsblk",
            Tool::Wipefs => "wipefs",
        }
    }

    fn from_program(program: &str) -> Option<Self> {
        Tool::ALL.into_iter().find(|tool| tool.program() == program)
    }

    fn configured(self, tools: &ToolsCfg) -> Option<&str> {
        let value = match self {
            Tool::Cryptsetup => tools.cryptsetup_path.as_deref(),
            Tool::Lsblk => tools.lsblk_path.as_deref(),
            Tool::Wipefs => tools.wipefs_path.as_deref(),
        };
        value.map(str::trim).filter(|path| !path.is_empty())
    }
}

/// Resolved binary locations for every [`Tool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    pub cryptsetup: PathBuf,
    pub lsblk: PathBuf,
    pub wipefs: PathBuf,
}

impl Toolchain {
    /// Resolve each tool from its configured override, well-known sbin
    /// directories, then `PATH`.
    pub fn resolve(tools: &ToolsCfg) -> CryptdevResult<Self> {
        Ok(Self {
            cryptsetup: resolve_tool(Tool::Cryptsetup, tools)?,
            lsblk: resolve_tool(Tool::Lsblk, tools)?,
            wipefs: resolve_tool(Tool::Wipefs, tools)?,
        })
    }

    pub fn path(&self, tool: Tool) -> &Path {
        match tool {
            Tool::Cryptsetup => &self.cryptsetup,
            Tool::Lsblk => &self.lsblk,
            Tool::Wipefs => &self.wipefs,
        }
    }
}

/// [`ProcessRunner`] that spawns real processes and bounds each by a timeout.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    toolchain: Toolchain,
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(toolchain: Toolchain, timeout: Duration) -> Self {
        Self { toolchain, timeout }
    }

    pub fn from_config(config: &CryptdevConfig) -> CryptdevResult<Self> {
        Ok(Self::new(
            Toolchain::resolve(&config.tools)?,
            config.exec_timeout(),
        ))
    }

    fn wait_with_timeout(
        &self,
        program: &Path,
        mut child: Child,
        stdout_pipe: Option<ChildStdout>,
        stderr_pipe: Option<ChildStderr>,
    ) -> CryptdevResult<CommandOutput> {
        let start = Instant::now();
        let stdout_handle = spawn_output_reader(stdout_pipe);
        let stderr_handle = spawn_output_reader(stderr_pipe);
        let mut exit_status = None;

        while start.elapsed() <= self.timeout {
            if let Some(status) = child.try_wait()? {
                exit_status = Some(status);
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let Some(exit_status) = exit_status else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CryptdevError::Timeout {
                program: program.display().to_string(),
                timeout: self.timeout,
            });
        };

        let stdout = stdout_handle
            .join()
            .map_err(|_| CryptdevError::Provider("stdout reader thread panicked".into()))??;
        let stderr = stderr_handle
            .join()
            .map_err(|_| CryptdevError::Provider("stderr reader thread panicked".into()))??;

        Ok(CommandOutput {
            status: exit_status.code().unwrap_or(-1),
            stdout,
            stderr,
        })
    }
}

impl ProcessRunner for SystemRunner {
    type Error = CryptdevError;

    fn run(&self, argv: &[&str]) -> CryptdevResult<CommandOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| CryptdevError::Provider("empty argument vector".into()))?;
        let tool = Tool::from_program(program).ok_or_else(|| {
            CryptdevError::InvalidConfig(format!("refusing to run unmanaged program `{program}`"))
        })?;
        let binary = self.toolchain.path(tool);
        debug!("running {} {}", binary.display(), args.join(" "));

        let mut command = Command::new(binary);
        command.args(args);
        command.stdin(Stdio::null());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn().map_err(|source| CryptdevError::Launch {
            program: binary.display().to_string(),
            source,
        })?;

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let output = self.wait_with_timeout(binary, child, stdout_pipe, stderr_pipe)?;
        debug!("{program} exited with status {}", output.status);
        Ok(output)
    }
}

fn resolve_tool(tool: Tool, tools: &ToolsCfg) -> CryptdevResult<PathBuf> {
    if let Some(path) = tool.configured(tools) {
        let candidate = Path::new(path);
        if !candidate.exists() {
            return Err(CryptdevError::InvalidConfig(format!(
                "{} binary not found at {}",
                tool.program(),
                candidate.display()
            )));
        }
        return Ok(candidate.to_path_buf());
    }

    SBIN_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(tool.program()))
        .find(|candidate| candidate.exists())
        .or_else(|| find_in_path(tool.program()))
        .ok_or_else(|| {
            CryptdevError::InvalidConfig(format!(
                "unable to locate {} binary; tried {:?} and PATH",
                tool.program(),
                SBIN_DIRS
            ))
        })
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.exists())
}

fn spawn_output_reader<R>(pipe: Option<R>) -> thread::JoinHandle<CryptdevResult<String>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || -> CryptdevResult<String> {
        if let Some(mut reader) = pipe {
            let mut buf = Vec::new();
            reader.read_to_end(&mut buf)?;
            Ok(String::from_utf8_lossy(&buf).into_owned())
        } else {
            Ok(String::new())
        }
    })
}
