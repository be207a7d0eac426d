//! External tool wrappers
//!
//! Each wrapper knows how to spell one utility's non-interactive command line
//! and how to explain its well-known failure messages. Running the command
//! and judging the outcome is shared and lives in [`crate::operation`].

mod archive;
mod cipher;

pub use archive::ArchiveTool;
pub use cipher::CipherTool;

use crate::availability::RequiredCommand;
use crate::config::AppConfig;
use crate::password::Password;
use crate::process::CommandLine;
use crate::workspace::Workspace;
use std::fmt;
use std::time::Duration;

/// Which external utility an operation uses. Also the key of the session
/// result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolKind {
    Cipher,
    Archive,
}

impl ToolKind {
    pub const ALL: [ToolKind; 2] = [ToolKind::Cipher, ToolKind::Archive];

    /// URL path segment of the tool's page.
    pub fn slug(self) -> &'static str {
        match self {
            ToolKind::Cipher => "encrypt",
            ToolKind::Archive => "zip",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }
}

/// What the user asked for: the tool selector with the cipher mode folded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Encrypt,
    Decrypt,
    Archive,
}

impl Operation {
    pub fn tool(self) -> ToolKind {
        match self {
            Operation::Encrypt | Operation::Decrypt => ToolKind::Cipher,
            Operation::Archive => ToolKind::Archive,
        }
    }

    /// Operations that create a new secret ask for the password twice.
    pub fn requires_confirmation(self) -> bool {
        matches!(self, Operation::Encrypt | Operation::Archive)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Operation::Encrypt => "Encrypt",
            Operation::Decrypt => "Decrypt",
            Operation::Archive => "Create Protected ZIP",
        })
    }
}

/// One external command-line utility.
pub trait ExternalTool: Send + Sync {
    /// Human name used in messages, e.g. "OpenSSL".
    fn label(&self) -> &'static str;

    /// Program spawned, a bare name or a path.
    fn program(&self) -> &str;

    fn timeout(&self) -> Duration;

    /// Install hint for when the program cannot be found.
    fn remediation(&self) -> &'static str;

    /// Build the full argument vector reading `workspace`'s input and writing
    /// its output. The password is marked secret.
    fn command_line(
        &self,
        operation: Operation,
        workspace: &Workspace,
        password: &Password,
    ) -> CommandLine;

    /// A clearer message for a recognised failure, if any.
    fn explain_failure(&self, stderr: &str) -> Option<&'static str>;

    fn required_command(&self) -> RequiredCommand {
        RequiredCommand {
            program: self.program().to_string(),
            label: self.label(),
            remediation: self.remediation(),
        }
    }
}

/// The two configured tools.
#[derive(Debug, Clone)]
pub struct Toolbox {
    pub cipher: CipherTool,
    pub archive: ArchiveTool,
}

impl Toolbox {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            cipher: CipherTool::new(
                config.openssl.clone(),
                config.cipher.clone(),
                Duration::from_secs(config.cipher_timeout_secs),
            ),
            archive: ArchiveTool::new(
                config.zip.clone(),
                Duration::from_secs(config.archive_timeout_secs),
            ),
        }
    }

    pub fn get(&self, kind: ToolKind) -> &dyn ExternalTool {
        match kind {
            ToolKind::Cipher => &self.cipher,
            ToolKind::Archive => &self.archive,
        }
    }

    pub fn required_commands(&self) -> Vec<RequiredCommand> {
        ToolKind::ALL
            .into_iter()
            .map(|k| self.get(k).required_command())
            .collect()
    }
}
