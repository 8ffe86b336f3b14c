//! Process execution.
//!
//! Every external tool (make, tar, strip, file) goes through [`CommandRunner`],
//! so the build steps can be driven against a fake in tests.

use crate::platform::BuildEnv;
use anyhow::{bail, Context, Result};
use log::{debug, info};
use std::fmt;
use std::path::Path;
use std::process::Command;

/// A command line plus extra environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    envs: Vec<(String, String)>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append a path argument. Paths are passed to make and tar as text, so
    /// a path that is not valid UTF-8 is refused rather than mangled.
    pub fn path_arg(self, path: &Path) -> Result<Self> {
        Ok(self.arg(utf8_path(path)?))
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn build_env(mut self, env: &BuildEnv) -> Self {
        self.envs.extend(env.vars().iter().cloned());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn argv(&self) -> &[String] {
        &self.args
    }

    pub fn envs(&self) -> &[(String, String)] {
        &self.envs
    }

    fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        cmd
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{arg}'")?;
            } else {
                write!(f, " {arg}")?;
            }
        }
        Ok(())
    }
}

/// Exit status and combined stdout/stderr of a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Captured {
    pub success: bool,
    pub output: String,
}

pub trait CommandRunner {
    /// Run to completion; a non-zero exit is an error.
    fn run(&self, cmd: &Cmd) -> Result<()>;

    /// Run to completion and hand back the output regardless of exit status.
    /// Only a failure to spawn is an error.
    fn capture(&self, cmd: &Cmd) -> Result<Captured>;
}

/// Runs commands on the host.
///
/// In debug mode the child inherits stdout/stderr. Otherwise output is
/// captured and only shown when the command fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner {
    debug: bool,
}

impl SystemRunner {
    pub fn new(debug: bool) -> Self {
        Self { debug }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, cmd: &Cmd) -> Result<()> {
        debug!("$ {cmd}");

        if self.debug {
            let status = cmd
                .to_command()
                .status()
                .with_context(|| format!("Failed to run {}", cmd.program()))?;
            if !status.success() {
                bail!("Command failed: {cmd}");
            }
            return Ok(());
        }

        let captured = self.capture(cmd)?;
        if !captured.success {
            info!("{}", captured.output);
            bail!("Command failed: {cmd}");
        }
        Ok(())
    }

    fn capture(&self, cmd: &Cmd) -> Result<Captured> {
        let output = cmd
            .to_command()
            .output()
            .with_context(|| format!("Failed to run {}", cmd.program()))?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));

        Ok(Captured {
            success: output.status.success(),
            output: combined,
        })
    }
}

/// The path as UTF-8 text, or an error naming it.
pub fn utf8_path(path: &Path) -> Result<&str> {
    path.to_str()
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

/// Whether a tool is on PATH.
pub fn tool_exists(name: &str) -> bool {
    which::which(name).is_ok()
}
