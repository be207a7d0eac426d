//! Command availability check
//!
//! Resolves external programs on the search path before any operation is
//! offered, so a missing tool is reported up front with install hints rather
//! than surfacing as a spawn failure deep inside a request.

use serde::Serialize;
use which::which;

/// Returns true when `command` resolves to an executable.
///
/// `command` may be a bare name (looked up on `PATH`) or a path.
pub fn is_available(command: &str) -> bool {
    which(command).is_ok()
}

/// An external program the application cannot work without.
#[derive(Debug, Clone, Serialize)]
pub struct RequiredCommand {
    /// Program name or path as it will be spawned.
    pub program: String,
    /// Human name of the utility, e.g. "OpenSSL".
    pub label: &'static str,
    /// Install hint shown when the program is missing.
    pub remediation: &'static str,
}

/// Outcome of checking every required command.
#[derive(Debug, Clone, Serialize)]
pub struct SystemCheck {
    pub found: Vec<String>,
    pub missing: Vec<RequiredCommand>,
}

impl SystemCheck {
    pub fn run(required: &[RequiredCommand]) -> Self {
        let mut found = Vec::new();
        let mut missing = Vec::new();
        for command in required {
            if is_available(&command.program) {
                found.push(command.program.clone());
            } else {
                missing.push(command.clone());
            }
        }
        if !missing.is_empty() {
            tracing::error!(
                missing = ?missing.iter().map(|c| c.program.as_str()).collect::<Vec<_>>(),
                "required commands not found on PATH"
            );
        }
        Self { found, missing }
    }

    pub fn all_found(&self) -> bool {
        self.missing.is_empty()
    }

    /// True when `program` was checked and is missing.
    pub fn is_missing(&self, program: &str) -> bool {
        self.missing_command(program).is_some()
    }

    pub fn missing_command(&self, program: &str) -> Option<&RequiredCommand> {
        self.missing.iter().find(|c| c.program == program)
    }

    /// Names of the missing programs.
    pub fn missing_names(&self) -> Vec<&str> {
        self.missing.iter().map(|c| c.program.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn required(program: &str) -> RequiredCommand {
        RequiredCommand {
            program: program.to_string(),
            label: "Test",
            remediation: "install it",
        }
    }

    #[test]
    fn test_sh_is_available() {
        assert!(is_available("sh"));
    }

    #[test]
    fn test_unknown_command_is_missing() {
        assert!(!is_available("cryptapp-definitely-not-a-command"));
    }

    #[test]
    fn test_system_check_reports_every_missing_name() {
        let check = SystemCheck::run(&[
            required("sh"),
            required("cryptapp-missing-one"),
            required("cryptapp-missing-two"),
        ]);
        assert!(!check.all_found());
        assert_eq!(check.found, vec!["sh".to_string()]);
        assert_eq!(
            check.missing_names(),
            vec!["cryptapp-missing-one", "cryptapp-missing-two"]
        );
        assert!(check.is_missing("cryptapp-missing-two"));
        assert!(!check.is_missing("sh"));
    }
}
