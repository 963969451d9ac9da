//! Synchronous invocation of external programs.
//!
//! The trainer is an opaque long-running process; the only things we get back
//! are its exit code and whatever files it leaves behind.

use anyhow::Context;
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// A program, its argument list and the directory it runs in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
}

impl ExternalCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append a `key=value` argument, the flag style the trainer CLI expects
    pub fn kv(self, key: &str, value: impl fmt::Display) -> Self {
        self.arg(format!("{}={}", key, value))
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// What came back from a finished process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs external commands to completion
pub trait CommandRunner {
    fn run(&self, command: &ExternalCommand) -> anyhow::Result<CommandOutcome>;
}

/// Spawns real processes, inheriting stdout/stderr so the trainer's progress stays visible
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ExternalCommand) -> anyhow::Result<CommandOutcome> {
        info!("Running: {}", command);
        let mut cmd = Command::new(&command.program);
        cmd.args(command.args.iter().map(OsString::from))
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        if let Some(dir) = &command.working_dir {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .with_context(|| format!("Failed to spawn {:?}", command.program))?;
        debug!("{} exited with {:?}", command.program, status.code());

        Ok(CommandOutcome {
            exit_code: status.code(),
        })
    }
}
