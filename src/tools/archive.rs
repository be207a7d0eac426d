//! `zip -e` wrapper

use super::{ExternalTool, Operation};
use crate::password::Password;
use crate::process::CommandLine;
use crate::workspace::Workspace;
use std::time::Duration;

/// stderr marker zip prints when none of its inputs matched.
const NOTHING_TO_DO: &str = "nothing to do";

/// Password-protected single-file ZIP archives through the system `zip`.
///
/// Paths are junked (`-j`) so the archive holds just the file name, and the
/// password is passed with `-P`, which exposes it in the process list.
#[derive(Debug, Clone)]
pub struct ArchiveTool {
    program: String,
    timeout: Duration,
}

impl ArchiveTool {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }
}

impl ExternalTool for ArchiveTool {
    fn label(&self) -> &'static str {
        "Zip"
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn remediation(&self) -> &'static str {
        "Usually available on macOS/Linux. Install via your package manager if missing \
         (`sudo apt install zip`, `sudo yum install zip`, `brew install zip`)."
    }

    fn command_line(
        &self,
        _operation: Operation,
        workspace: &Workspace,
        password: &Password,
    ) -> CommandLine {
        CommandLine::new(&self.program)
            .args(["-j", "-e", "-P"])
            .secret_arg(password.expose())
            .arg(workspace.output_path().to_string_lossy())
            .arg(workspace.input_path().to_string_lossy())
    }

    fn explain_failure(&self, stderr: &str) -> Option<&'static str> {
        if stderr.to_lowercase().contains(NOTHING_TO_DO) {
            Some("Nothing to zip. Check input file path.")
        } else {
            None
        }
    }
}
