//! Operations
//!
//! One user submission runs through a fixed sequence of phases:
//!
//! ```text
//! Idle -> Validating -> Staged -> Invoking -> Succeeded | Failed -> Cleaned
//! ```
//!
//! Validation happens before any workspace exists, so a rejected request never
//! touches the disk or spawns a process. Once a workspace has been acquired it
//! is released on every path out of [`OperationRunner::run`].

use crate::error::{AppError, ErrorCategory, ErrorKind, Result};
use crate::password::Password;
use crate::process::{self, Invocation};
use crate::tools::{ExternalTool, Operation, ToolKind, Toolbox};
use crate::workspace::Workspace;
use std::path::{Path, PathBuf};

const FALLBACK_INPUT_NAME: &str = "input";
const FALLBACK_DECRYPTED_NAME: &str = "decrypted_file";
const ZIP_EXTENSION: &str = ".zip";

/// A single submission from the user. Never mutated once built.
#[derive(Debug, Clone)]
pub struct OperationRequest {
    pub operation: Operation,
    /// Name the file was uploaded under.
    pub input_name: String,
    pub input: Vec<u8>,
    pub password: Password,
    /// Second entry of the password; only checked where the operation asks
    /// for confirmation.
    pub confirmation: Password,
    pub output_name: String,
}

/// A request that passed validation, with names normalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub input_name: String,
    pub output_name: String,
    /// Adjustments made on the user's behalf, worth showing them.
    pub notices: Vec<String>,
}

impl OperationRequest {
    /// The output name suggested for an upload called `input_name`.
    pub fn default_output_name(operation: Operation, input_name: &str) -> String {
        let name = sanitize_upload_name(input_name);
        let path = Path::new(&name);
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        match operation {
            Operation::Encrypt => format!("{}.enc", stem),
            Operation::Decrypt => {
                let is_enc = path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("enc"));
                if !is_enc {
                    format!("{}.dec", name)
                } else if stem.is_empty() {
                    FALLBACK_DECRYPTED_NAME.to_string()
                } else {
                    stem
                }
            }
            Operation::Archive => format!("{}_protected.zip", stem),
        }
    }

    /// Check the request without side effects.
    pub fn validate(&self) -> Result<Plan> {
        if self.password.is_empty() {
            return Err(AppError::validation("Password cannot be empty."));
        }
        if self.operation.requires_confirmation() && !self.password.matches(&self.confirmation) {
            return Err(AppError::validation("Passwords do not match."));
        }
        if self.output_name.is_empty() {
            return Err(AppError::validation(match self.operation {
                Operation::Archive => "Output ZIP filename cannot be empty.",
                _ => "Output filename cannot be empty.",
            }));
        }
        if !is_plain_file_name(&self.output_name) {
            return Err(AppError::validation(
                "Output filename must be a plain file name without directories.",
            ));
        }

        let mut notices = Vec::new();
        let mut output_name = self.output_name.clone();
        if self.operation == Operation::Archive
            && !output_name.to_lowercase().ends_with(ZIP_EXTENSION)
        {
            output_name.push_str(ZIP_EXTENSION);
            notices.push(format!(
                "Output filename didn't end with '.zip'. Using '{}'.",
                output_name
            ));
        }

        Ok(Plan {
            input_name: sanitize_upload_name(&self.input_name),
            output_name,
            notices,
        })
    }
}

/// Reduce an uploaded file name to its final path component.
pub fn sanitize_upload_name(name: &str) -> String {
    let last = name
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim();
    if last.is_empty() || last == "." || last == ".." || last.contains('\0') {
        FALLBACK_INPUT_NAME.to_string()
    } else {
        last.to_string()
    }
}

fn is_plain_file_name(name: &str) -> bool {
    !(name == "." || name == ".." || name.contains(|c: char| matches!(c, '/' | '\\' | '\0')))
}

/// Where an operation is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Validating,
    Staged,
    Invoking,
    Succeeded,
    Failed(ErrorKind),
    Cleaned,
}

/// What the external tool produced.
///
/// `output` is present exactly when `success` is true: the tool exited zero
/// and its output file existed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub output: Option<Vec<u8>>,
}

impl OperationResult {
    fn failed(invocation: Invocation) -> Self {
        Self {
            success: false,
            exit_code: invocation.exit_code,
            stdout: invocation.stdout,
            stderr: invocation.stderr,
            output: None,
        }
    }

    fn succeeded(invocation: Invocation, output: Vec<u8>) -> Self {
        Self {
            success: true,
            exit_code: invocation.exit_code,
            stdout: invocation.stdout,
            stderr: invocation.stderr,
            output: Some(output),
        }
    }
}

/// Everything known about one finished operation.
#[derive(Debug)]
pub struct OperationReport {
    pub operation: Operation,
    /// Final output name, once validation settled it.
    pub output_name: Option<String>,
    /// Redacted command line, when a process was about to be spawned.
    pub command: Option<String>,
    /// Present when a process ran to completion.
    pub result: Option<OperationResult>,
    pub error: Option<AppError>,
    pub notices: Vec<String>,
    pub cleanup_warning: Option<AppError>,
    pub trail: Vec<Phase>,
}

impl OperationReport {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            output_name: None,
            command: None,
            result: None,
            error: None,
            notices: Vec::new(),
            cleanup_warning: None,
            trail: vec![Phase::Idle],
        }
    }

    fn enter(&mut self, phase: Phase) {
        tracing::debug!(operation = %self.operation, ?phase, "operation phase");
        self.trail.push(phase);
    }

    fn fail(&mut self, error: AppError) {
        let kind = error.kind.unwrap_or(ErrorKind::UnexpectedFault);
        tracing::info!(operation = %self.operation, ?kind, error = %error, "operation failed");
        self.error = Some(error);
        self.enter(Phase::Failed(kind));
    }

    pub fn succeeded(&self) -> bool {
        self.error.is_none() && self.result.as_ref().is_some_and(|r| r.success)
    }

    /// The produced bytes, on success.
    pub fn output(&self) -> Option<&[u8]> {
        self.result.as_ref().and_then(|r| r.output.as_deref())
    }

    /// True when the trail shows a process was spawned.
    pub fn invoked(&self) -> bool {
        self.trail.contains(&Phase::Invoking)
    }
}

/// Runs requests against the configured tools.
#[derive(Debug, Clone)]
pub struct OperationRunner {
    toolbox: Toolbox,
    workspace_root: Option<PathBuf>,
}

impl OperationRunner {
    pub fn new(toolbox: Toolbox, workspace_root: Option<PathBuf>) -> Self {
        Self {
            toolbox,
            workspace_root,
        }
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    pub fn tool(&self, kind: ToolKind) -> &dyn ExternalTool {
        self.toolbox.get(kind)
    }

    /// Run one request to completion. Failures are recorded in the report;
    /// nothing is retried.
    pub async fn run(&self, request: &OperationRequest) -> OperationReport {
        let mut report = OperationReport::new(request.operation);

        report.enter(Phase::Validating);
        let plan = match request.validate() {
            Ok(plan) => plan,
            Err(e) => {
                report.fail(e);
                return report;
            }
        };
        report.output_name = Some(plan.output_name.clone());
        report.notices = plan.notices.clone();

        let tool = self.tool(request.operation.tool());
        let workspace = match Workspace::acquire(
            self.workspace_root.as_deref(),
            &plan.input_name,
            &plan.output_name,
        ) {
            Ok(ws) => ws,
            Err(e) => {
                report.fail(e.with_context("An error occurred while preparing the workspace."));
                return report;
            }
        };

        match workspace.stage_input(&request.input) {
            Ok(()) => {
                report.enter(Phase::Staged);
                self.invoke(tool, request, &workspace, &mut report).await;
            }
            Err(e) => report.fail(e),
        }

        if let Err(warning) = workspace.release() {
            report.cleanup_warning = Some(warning);
        }
        report.enter(Phase::Cleaned);
        report
    }

    async fn invoke(
        &self,
        tool: &dyn ExternalTool,
        request: &OperationRequest,
        workspace: &Workspace,
        report: &mut OperationReport,
    ) {
        let command = tool.command_line(request.operation, workspace, &request.password);
        report.command = Some(command.redacted());

        report.enter(Phase::Invoking);
        let invocation = match process::invoke(&command, tool.timeout()).await {
            Ok(invocation) => invocation,
            Err(e) => {
                report.fail(e);
                return;
            }
        };

        match judge(tool, invocation, workspace) {
            Ok(result) => {
                report.result = Some(result);
                report.enter(Phase::Succeeded);
            }
            Err((result, e)) => {
                report.result = result;
                report.fail(e);
            }
        }
    }
}

/// Apply the success policy: exit code zero and the output file on disk.
fn judge(
    tool: &dyn ExternalTool,
    invocation: Invocation,
    workspace: &Workspace,
) -> std::result::Result<OperationResult, (Option<OperationResult>, AppError)> {
    let label = tool.label();

    if !invocation.exited_zero() {
        let code = invocation.exit_label();
        let msg = match tool.explain_failure(&invocation.stderr) {
            Some(hint) => format!("{} Error (Exit Code {}): {}", label, code, hint),
            None => format!("{} Error (Exit Code {})", label, code),
        };
        let err = AppError::with_kind(ErrorCategory::Internal, ErrorKind::ProcessFailure, msg);
        return Err((Some(OperationResult::failed(invocation)), err));
    }

    if !workspace.output_exists() {
        let err = AppError::with_kind(
            ErrorCategory::Internal,
            ErrorKind::MissingOutput,
            format!(
                "{} exited successfully but did not produce an output file.",
                label
            ),
        );
        return Err((Some(OperationResult::failed(invocation)), err));
    }

    match workspace.read_output() {
        Ok(bytes) => Ok(OperationResult::succeeded(invocation, bytes)),
        Err(e) => Err((
            Some(OperationResult::failed(invocation)),
            AppError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::UnexpectedFault,
                "An error occurred while reading the output file.",
                e,
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ArchiveTool, CipherTool};
    use std::fs;
    use std::time::Duration;
    use tempfile::TempDir;

    fn request(operation: Operation, password: &str, confirm: &str, output: &str) -> OperationRequest {
        OperationRequest {
            operation,
            input_name: "notes.txt".into(),
            input: b"hello test".to_vec(),
            password: Password::new(password),
            confirmation: Password::new(confirm),
            output_name: output.into(),
        }
    }

    /// Writes an executable shell script standing in for a real tool.
    #[cfg(unix)]
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn runner(cipher: &str, archive: &str, root: &Path) -> OperationRunner {
        OperationRunner::new(
            Toolbox {
                cipher: CipherTool::new(cipher, "aes-256-cbc", Duration::from_secs(10)),
                archive: ArchiveTool::new(archive, Duration::from_secs(10)),
            },
            Some(root.to_path_buf()),
        )
    }

    fn workspace_count(root: &Path) -> usize {
        fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_default_output_names() {
        use Operation::*;
        assert_eq!(OperationRequest::default_output_name(Encrypt, "notes.txt"), "notes.enc");
        assert_eq!(OperationRequest::default_output_name(Encrypt, "a.tar.gz"), "a.tar.enc");
        assert_eq!(OperationRequest::default_output_name(Decrypt, "notes.enc"), "notes");
        assert_eq!(OperationRequest::default_output_name(Decrypt, "notes.ENC"), "notes");
        assert_eq!(OperationRequest::default_output_name(Decrypt, "notes.bin"), "notes.bin.dec");
        assert_eq!(OperationRequest::default_output_name(Decrypt, ".enc"), ".enc.dec");
        assert_eq!(
            OperationRequest::default_output_name(Archive, "report.pdf"),
            "report_protected.zip"
        );
        assert_eq!(
            OperationRequest::default_output_name(Encrypt, "C:\\docs\\plan.txt"),
            "plan.enc"
        );
    }

    #[test]
    fn test_sanitize_upload_name() {
        assert_eq!(sanitize_upload_name("notes.txt"), "notes.txt");
        assert_eq!(sanitize_upload_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_upload_name("dir/"), "input");
        assert_eq!(sanitize_upload_name(".."), "input");
        assert_eq!(sanitize_upload_name(""), "input");
    }

    #[test]
    fn test_validation_rules() {
        let err = request(Operation::Encrypt, "", "", "notes.enc").validate().unwrap_err();
        assert_eq!(err.message(), "Password cannot be empty.");

        let err = request(Operation::Encrypt, "abc", "xyz", "notes.enc").validate().unwrap_err();
        assert!(err.is(ErrorKind::Validation));
        assert_eq!(err.message(), "Passwords do not match.");

        // Decrypt never asks for confirmation.
        assert!(request(Operation::Decrypt, "abc", "", "notes").validate().is_ok());

        let err = request(Operation::Archive, "abc", "abc", "").validate().unwrap_err();
        assert_eq!(err.message(), "Output ZIP filename cannot be empty.");

        let err = request(Operation::Encrypt, "abc", "abc", "../x.enc").validate().unwrap_err();
        assert!(err.is(ErrorKind::Validation));
    }

    #[test]
    fn test_archive_name_gets_zip_extension() {
        let plan = request(Operation::Archive, "pw", "pw", "bundle").validate().unwrap();
        assert_eq!(plan.output_name, "bundle.zip");
        assert_eq!(plan.notices.len(), 1);

        let plan = request(Operation::Archive, "pw", "pw", "bundle.ZIP").validate().unwrap();
        assert_eq!(plan.output_name, "bundle.ZIP");
        assert!(plan.notices.is_empty());
    }

    #[tokio::test]
    async fn test_empty_password_never_spawns() {
        let root = TempDir::new().unwrap();
        // A tool that cannot exist: spawning it would report ToolNotFound.
        let runner = runner("cryptapp-missing-openssl", "cryptapp-missing-zip", root.path());

        let report = runner.run(&request(Operation::Encrypt, "", "", "notes.enc")).await;
        assert!(!report.succeeded());
        assert!(report.error.as_ref().unwrap().is(ErrorKind::Validation));
        assert!(!report.invoked());
        assert_eq!(
            report.trail,
            vec![
                Phase::Idle,
                Phase::Validating,
                Phase::Failed(ErrorKind::Validation)
            ]
        );
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    async fn test_mismatched_passwords_never_spawn() {
        let root = TempDir::new().unwrap();
        let runner = runner("cryptapp-missing-openssl", "cryptapp-missing-zip", root.path());
        let report = runner.run(&request(Operation::Encrypt, "abc", "xyz", "notes.enc")).await;
        assert_eq!(report.error.unwrap().message(), "Passwords do not match.");
        assert!(report.command.is_none());
    }

    #[tokio::test]
    async fn test_missing_tool_at_invocation() {
        let root = TempDir::new().unwrap();
        let runner = runner("cryptapp-missing-openssl", "cryptapp-missing-zip", root.path());
        let report = runner
            .run(&request(Operation::Encrypt, "pw", "pw", "notes.enc"))
            .await;
        assert!(report.error.unwrap().is(ErrorKind::ToolNotFound));
        assert!(report.result.is_none());
        assert_eq!(report.trail.last(), Some(&Phase::Cleaned));
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_success_reads_output_and_cleans_up() {
        let root = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        // Arguments: enc -cipher -pbkdf2 -p -in IN -out OUT -pass pass:PW
        let cipher = fake_tool(
            bin.path(),
            "openssl",
            "cp \"$6\" \"$8\"; printf 'salt=00\\n'; printf 'warning\\n' >&2",
        );
        let runner = runner(&cipher, "zip", root.path());

        let report = runner
            .run(&request(Operation::Encrypt, "secret123", "secret123", "notes.enc"))
            .await;
        assert!(report.succeeded(), "{:?}", report.error);
        assert_eq!(report.output(), Some(&b"hello test"[..]));
        let result = report.result.as_ref().unwrap();
        assert_eq!(result.exit_code, Some(0));
        assert_eq!(result.stdout, "salt=00");
        assert_eq!(result.stderr, "warning");
        assert!(!report.command.as_ref().unwrap().contains("secret123"));
        assert_eq!(
            report.trail,
            vec![
                Phase::Idle,
                Phase::Validating,
                Phase::Staged,
                Phase::Invoking,
                Phase::Succeeded,
                Phase::Cleaned
            ]
        );
        assert!(report.cleanup_warning.is_none());
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_zero_exit_without_output_is_failure() {
        let root = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let archive = fake_tool(bin.path(), "zip", "exit 0");
        let runner = runner("openssl", &archive, root.path());

        let report = runner.run(&request(Operation::Archive, "pw", "pw", "a.zip")).await;
        assert!(!report.succeeded());
        assert!(report.error.as_ref().unwrap().is(ErrorKind::MissingOutput));
        let result = report.result.unwrap();
        assert!(!result.success);
        assert!(result.output.is_none());
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_nonzero_exit_with_known_diagnostic() {
        let root = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let archive = fake_tool(
            bin.path(),
            "zip",
            "echo 'zip error: Nothing to do! (x.zip)' >&2; exit 12",
        );
        let runner = runner("openssl", &archive, root.path());

        let report = runner.run(&request(Operation::Archive, "pw", "pw", "a.zip")).await;
        let err = report.error.as_ref().unwrap();
        assert!(err.is(ErrorKind::ProcessFailure));
        assert_eq!(
            err.message(),
            "Zip Error (Exit Code 12): Nothing to zip. Check input file path."
        );
        let result = report.result.as_ref().unwrap();
        assert_eq!(result.exit_code, Some(12));
        assert!(result.stderr.contains("Nothing to do"));
        assert!(result.output.is_none());
        assert_eq!(report.trail.last(), Some(&Phase::Cleaned));
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_partial_output_discarded_on_failure() {
        let root = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let cipher = fake_tool(bin.path(), "openssl", "echo partial > \"$8\"; exit 1");
        let runner = runner(&cipher, "zip", root.path());

        let report = runner
            .run(&request(Operation::Encrypt, "pw", "pw", "notes.enc"))
            .await;
        assert!(report.error.unwrap().is(ErrorKind::ProcessFailure));
        assert!(report.result.unwrap().output.is_none());
        assert_eq!(workspace_count(root.path()), 0);
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_failed_cleanup_is_reported_as_warning() {
        let root = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        // $8 is <workspace>/out/<name>; remove the whole workspace.
        let cipher = fake_tool(
            bin.path(),
            "openssl",
            "rm -rf \"$(dirname \"$(dirname \"$8\")\")\"",
        );
        let runner = runner(&cipher, "zip", root.path());

        let report = runner
            .run(&request(Operation::Encrypt, "pw", "pw", "notes.enc"))
            .await;
        assert!(!report.succeeded());
        assert!(report.error.as_ref().unwrap().is(ErrorKind::MissingOutput));
        let warning = report.cleanup_warning.as_ref().unwrap();
        assert!(warning.is(ErrorKind::CleanupWarning));
        assert!(
            warning
                .message()
                .starts_with("Could not automatically clean up temporary directory")
        );
        assert_eq!(
            report.trail,
            vec![
                Phase::Idle,
                Phase::Validating,
                Phase::Staged,
                Phase::Invoking,
                Phase::Failed(ErrorKind::MissingOutput),
                Phase::Cleaned
            ]
        );
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn test_timeout_is_reported_and_cleaned() {
        let root = TempDir::new().unwrap();
        let bin = TempDir::new().unwrap();
        let cipher = fake_tool(bin.path(), "openssl", "exec sleep 30");
        let runner = OperationRunner::new(
            Toolbox {
                cipher: CipherTool::new(cipher, "aes-256-cbc", Duration::from_millis(200)),
                archive: ArchiveTool::new("zip", Duration::from_secs(10)),
            },
            Some(root.path().to_path_buf()),
        );

        let report = runner.run(&request(Operation::Decrypt, "pw", "", "notes")).await;
        assert!(report.error.unwrap().is(ErrorKind::ProcessTimeout));
        assert_eq!(
            &report.trail[report.trail.len() - 2..],
            &[Phase::Failed(ErrorKind::ProcessTimeout), Phase::Cleaned]
        );
        assert_eq!(workspace_count(root.path()), 0);
    }
}
