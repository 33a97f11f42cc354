//! External command execution.
//!
//! Commands are argv vectors, never shell strings. A non-zero exit is a
//! value returned to the caller; each call site decides whether it is fatal
//! ([`CommandRunner::run_ok`] is the shorthand for "fatal").

mod stream;
mod system;

pub use system::SystemRunner;

use crate::errors::{ProvisionError, ProvisionResult};
use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

/// How a streamed command's output reaches the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Child inherits the terminal (interactive front end). Colors and
    /// progress bars of tools like `dfu-util` survive; only the invocation
    /// is logged.
    Inherit,
    /// Child output is captured, echoed line by line to stdout and mirrored
    /// into the durable log (headless continuation).
    Stream,
}

/// A program and its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Build from an argv vector. Empty vectors are a configuration error.
    pub fn from_argv(argv: &[String]) -> ProvisionResult<Self> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| ProvisionError::Config("empty command".to_string()))?;
        Ok(Self::new(program.clone()).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.display().to_string())
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    /// Run through `sudo` when `privileged` is set.
    pub fn elevated(self, privileged: bool) -> Self {
        if !privileged {
            return self;
        }
        let mut args = Vec::with_capacity(self.args.len() + 1);
        args.push(self.program);
        args.extend(self.args);
        Self {
            program: "sudo".to_string(),
            args,
            current_dir: self.current_dir,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Result of a quiet probe invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captured {
    pub code: i32,
    pub stdout: String,
}

impl Captured {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion, streaming its output per the runner's
    /// [`OutputMode`]. Returns the exit code; a signal-terminated child
    /// reports `-1`.
    async fn run(&self, spec: &CommandSpec) -> ProvisionResult<i32>;

    /// Run a status probe, capturing stdout without echoing it.
    async fn capture(&self, spec: &CommandSpec) -> ProvisionResult<Captured>;

    /// Run and treat a non-zero exit as fatal.
    async fn run_ok(&self, spec: &CommandSpec) -> ProvisionResult<()> {
        let code = self.run(spec).await?;
        if code == 0 {
            Ok(())
        } else {
            Err(ProvisionError::CommandFailed {
                command: spec.to_string(),
                code,
            })
        }
    }
}
