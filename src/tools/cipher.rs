//! OpenSSL `enc` wrapper

use super::{ExternalTool, Operation};
use crate::password::Password;
use crate::process::CommandLine;
use crate::workspace::Workspace;
use std::time::Duration;

/// Symmetric file encryption through `openssl enc` with PBKDF2 key derivation.
///
/// The password travels as `-pass pass:<password>`, so it is briefly visible
/// in the host's process list.
#[derive(Debug, Clone)]
pub struct CipherTool {
    program: String,
    cipher: String,
    timeout: Duration,
}

impl CipherTool {
    pub fn new(program: impl Into<String>, cipher: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            cipher: cipher.into(),
            timeout,
        }
    }

    /// Cipher name as passed to `enc`, without the leading dash.
    pub fn cipher(&self) -> &str {
        &self.cipher
    }
}

impl ExternalTool for CipherTool {
    fn label(&self) -> &'static str {
        "OpenSSL"
    }

    fn program(&self) -> &str {
        &self.program
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn remediation(&self) -> &'static str {
        "Usually available on macOS/Linux. Install via your package manager \
         (`sudo apt install openssl`, `sudo yum install openssl`, `brew install openssl`) \
         or from https://www.openssl.org/."
    }

    fn command_line(
        &self,
        operation: Operation,
        workspace: &Workspace,
        password: &Password,
    ) -> CommandLine {
        let mut cmd = CommandLine::new(&self.program)
            .arg("enc")
            .arg(format!("-{}", self.cipher))
            .arg("-pbkdf2");
        cmd = match operation {
            Operation::Decrypt => cmd.arg("-d"),
            // -p prints the derived salt, key and iv.
            _ => cmd.arg("-p"),
        };
        cmd.arg("-in")
            .arg(workspace.input_path().to_string_lossy())
            .arg("-out")
            .arg(workspace.output_path().to_string_lossy())
            .arg("-pass")
            .secret_arg_with_prefix("pass:", password.expose())
    }

    fn explain_failure(&self, stderr: &str) -> Option<&'static str> {
        if stderr.to_lowercase().contains("bad decrypt") {
            Some("Decryption failed: wrong password or the input is not an encrypted file.")
        } else {
            None
        }
    }
}
