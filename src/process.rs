//! Process invocation
//!
//! Runs one external tool with a fully formed argument vector, bounded by a
//! timeout, and captures exit code, stdout and stderr. A non-zero exit is a
//! normal [`Invocation`], not an error; only a missing program, a timeout or
//! an OS-level fault become [`AppError`]s.
//!
//! Secret arguments are tracked in a side table of positions that is consulted
//! only when the command line is rendered for logs or display. The argument
//! vector handed to the child is never altered.

use crate::error::{AppError, ErrorCategory, ErrorKind, Result};
use crate::password::REDACTED;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use zeroize::Zeroizing;

/// A program plus its ordered arguments, some of which may be secret.
pub struct CommandLine {
    program: String,
    args: Zeroizing<Vec<String>>,
    /// Secret argument index -> number of leading bytes safe to display.
    sensitive: BTreeMap<usize, usize>,
}

impl CommandLine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Zeroizing::new(Vec::new()),
            sensitive: BTreeMap::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Append an argument whose value must never be displayed.
    pub fn secret_arg(self, arg: impl Into<String>) -> Self {
        self.secret_arg_with_prefix("", arg)
    }

    /// Append `prefix` + `secret` as one argument, keeping only the prefix
    /// visible when rendered (e.g. `pass:********`).
    pub fn secret_arg_with_prefix(mut self, prefix: &str, secret: impl Into<String>) -> Self {
        let mut value = String::from(prefix);
        value.push_str(&Zeroizing::new(secret.into()));
        self.sensitive.insert(self.args.len(), prefix.len());
        self.args.push(value);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// The real arguments, secrets included.
    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    /// Indices into [`arguments`](Self::arguments) holding secrets.
    pub fn sensitive_positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.sensitive.keys().copied()
    }

    /// The command line with every secret masked, suitable for logs.
    pub fn redacted(&self) -> String {
        let mut rendered = self.program.clone();
        for (i, arg) in self.args.iter().enumerate() {
            rendered.push(' ');
            match self.sensitive.get(&i) {
                Some(&visible) => {
                    rendered.push_str(&arg[..visible]);
                    rendered.push_str(REDACTED);
                }
                None => rendered.push_str(arg),
            }
        }
        rendered
    }
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CommandLine").field(&self.redacted()).finish()
    }
}

/// A process that ran to completion, whatever its exit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// `None` when the child was ended by a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl Invocation {
    pub fn exited_zero(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Exit code for display; signals render as `signal`.
    pub fn exit_label(&self) -> String {
        match self.exit_code {
            Some(code) => code.to_string(),
            None => "signal".to_string(),
        }
    }
}

/// Run `command` and wait at most `timeout` for it to finish.
///
/// The child gets a null stdin so a tool that unexpectedly prompts fails
/// instead of hanging. On timeout the child is killed.
pub async fn invoke(command: &CommandLine, timeout: Duration) -> Result<Invocation> {
    tracing::info!(command = %command, timeout_secs = timeout.as_secs_f64(), "invoking external tool");

    let child = Command::new(&command.program)
        .args(command.arguments())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| spawn_error(&command.program, e))?;

    // Dropping the wait future on timeout drops the child, which kills it.
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result.map_err(|e| {
            AppError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::UnexpectedFault,
                format!(
                    "An unexpected error occurred while running {}: {}",
                    command.program, e
                ),
                e,
            )
        })?,
        Err(_) => {
            tracing::warn!(program = %command.program, "external tool timed out and was killed");
            return Err(AppError::with_kind(
                ErrorCategory::Internal,
                ErrorKind::ProcessTimeout,
                format!(
                    "{} command timed out after {}.",
                    command.program,
                    describe_duration(timeout)
                ),
            ));
        }
    };

    let invocation = Invocation {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    };
    tracing::debug!(
        program = %command.program,
        exit = %invocation.exit_label(),
        stderr_len = invocation.stderr.len(),
        "external tool finished"
    );
    Ok(invocation)
}

fn spawn_error(program: &str, err: io::Error) -> AppError {
    if err.kind() == io::ErrorKind::NotFound {
        AppError::with_kind_and_source(
            ErrorCategory::Environment,
            ErrorKind::ToolNotFound,
            format!(
                "The '{}' command was not found. Is it installed and in PATH?",
                program
            ),
            err,
        )
    } else {
        AppError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::UnexpectedFault,
            format!("failed to start {}: {}", program, err),
            err,
        )
    }
}

fn describe_duration(d: Duration) -> String {
    if d.subsec_nanos() == 0 {
        let secs = d.as_secs();
        if secs == 1 {
            "1 second".to_string()
        } else {
            format!("{} seconds", secs)
        }
    } else {
        format!("{:.1} seconds", d.as_secs_f64())
    }
}
