//! Boundary for invoking external tools (git, the editor CLI).
//!
//! Everything that shells out goes through [`CommandRunner`] so the sync and
//! restore logic can be exercised against a scripted runner in tests.

use std::path::Path;
use std::process::Command;

use crate::{xlog_debug, xlog_trace, xlog_warn, Error, Result};

/// Captured output of a successful command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn new(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }
}

/// Run a program to completion.
///
/// Implementations return `Err` both when the program cannot be started and
/// when it exits non-zero.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput>;
}

/// Runs commands as real child processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: Option<&Path>) -> Result<CommandOutput> {
        let display = display_command(program, args);
        match cwd {
            Some(dir) => xlog_debug!("run: {} (cwd={})", display, dir.display()),
            None => xlog_debug!("run: {}", display),
        }

        let mut cmd = Command::new(program);
        cmd.args(args);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|source| Error::CommandSpawn {
            program: program.to_string(),
            source,
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        xlog_trace!("{} stdout: {} bytes, stderr: {:?}", display, stdout.len(), stderr);

        if !output.status.success() {
            xlog_warn!("{} failed: {}", display, stderr.trim());
            return Err(Error::CommandFailed {
                command: display,
                code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Render a command line for logs and error messages.
pub fn display_command(program: &str, args: &[&str]) -> String {
    let mut parts = Vec::with_capacity(args.len() + 1);
    parts.push(program.to_string());
    for arg in args {
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            parts.push(format!("\"{}\"", arg));
        } else {
            parts.push(arg.to_string());
        }
    }
    parts.join(" ")
}
