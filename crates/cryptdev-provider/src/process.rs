//! Contract for running external utilities.

use std::error::Error;

/// Captured result of a finished external process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit status; `0` is success, signals map to `-1`.
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(status: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            status,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Runs an argument vector (`argv[0]` names the utility) to completion.
///
/// A non-zero exit status is reported through [`CommandOutput::status`] and is
/// never an `Err`; errors are reserved for failing to launch or await the
/// process at all.
pub trait ProcessRunner {
    type Error: Error + Send + Sync + 'static;

    fn run(&self, argv: &[&str]) -> Result<CommandOutput, Self::Error>;
}

impl<R> ProcessRunner for &R
where
    R: ProcessRunner + ?Sized,
{
    type Error = R::Error;

    fn run(&self, argv: &[&str]) -> Result<CommandOutput, Self::Error> {
        (**self).run(argv)
    }
}
