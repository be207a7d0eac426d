//! Temporary workspaces
//!
//! Every operation gets a fresh, private directory holding exactly its staged
//! input and the artifact the external tool writes. The directory is removed
//! when the operation ends: explicitly through [`Workspace::release`], which
//! reports a failed removal, or implicitly when the value is dropped on an
//! early return or unwind.

use crate::error::{AppError, ErrorCategory, ErrorKind, Result};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const PREFIX: &str = "cryptapp-";
const INPUT_DIR: &str = "in";
const OUTPUT_DIR: &str = "out";

/// An isolated directory owning one operation's input and output paths.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
    input_path: PathBuf,
    output_path: PathBuf,
}

impl Workspace {
    /// Create a uniquely named workspace below `parent` (or the system temp
    /// directory), readable only by the current user.
    ///
    /// Input and output live in separate sub-directories, so an output name
    /// equal to the input name cannot clobber the staged input.
    pub fn acquire(parent: Option<&Path>, input_name: &str, output_name: &str) -> Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);
        let dir = match parent {
            Some(parent) => builder.tempdir_in(parent),
            None => builder.tempdir(),
        }
        .map_err(|e| io_error(ErrorCategory::Internal, "failed to create workspace", e))?;

        restrict_to_owner(dir.path())?;
        for sub in [INPUT_DIR, OUTPUT_DIR] {
            fs::create_dir(dir.path().join(sub)).map_err(|e| {
                io_error(
                    ErrorCategory::Internal,
                    format!("failed to create workspace directory {}", sub),
                    e,
                )
            })?;
        }

        let input_path = dir.path().join(INPUT_DIR).join(input_name);
        let output_path = dir.path().join(OUTPUT_DIR).join(output_name);
        tracing::debug!(workspace = %dir.path().display(), "workspace acquired");
        Ok(Self {
            dir,
            input_path,
            output_path,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Write the uploaded bytes to the input path (mode 0o600 on Unix).
    pub fn stage_input(&self, contents: &[u8]) -> Result<()> {
        write_file_secure(&self.input_path, contents)
            .map_err(|e| e.with_context("failed to stage uploaded file"))
    }

    pub fn output_exists(&self) -> bool {
        self.output_path.is_file()
    }

    /// Read the artifact the tool produced.
    pub fn read_output(&self) -> Result<Vec<u8>> {
        fs::read(&self.output_path).map_err(|e| {
            io_error(
                ErrorCategory::Internal,
                format!("failed to read from {}", self.output_path.display()),
                e,
            )
        })
    }

    /// Remove the workspace and everything in it.
    ///
    /// A failure here is a `CleanupWarning`: the operation itself has already
    /// finished, so callers record it rather than fail the request.
    pub fn release(self) -> Result<()> {
        let root = self.dir.path().to_path_buf();
        self.dir.close().map_err(|e| {
            tracing::warn!(workspace = %root.display(), error = %e, "workspace cleanup failed");
            AppError::with_kind_and_source(
                ErrorCategory::Internal,
                ErrorKind::CleanupWarning,
                format!(
                    "Could not automatically clean up temporary directory {}: {}",
                    root.display(),
                    e
                ),
                e,
            )
        })?;
        tracing::debug!(workspace = %root.display(), "workspace released");
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_to_owner(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o700)).map_err(|e| {
        io_error(
            ErrorCategory::Internal,
            "failed to set workspace permissions",
            e,
        )
    })
}

#[cfg(not(unix))]
fn restrict_to_owner(_path: &Path) -> Result<()> {
    Ok(())
}

/// Write file with secure permissions (0o600 on Unix)
fn write_file_secure(path: &Path, contents: &[u8]) -> Result<()> {
    #[cfg(unix)]
    {
        use std::fs::OpenOptions;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
            .map_err(|e| {
                io_error(
                    ErrorCategory::Internal,
                    format!("failed to open {}", path.display()),
                    e,
                )
            })?;

        file.write_all(contents).map_err(|e| {
            io_error(
                ErrorCategory::Internal,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents).map_err(|e| {
            io_error(
                ErrorCategory::Internal,
                format!("failed to write {}", path.display()),
                e,
            )
        })?;
        Ok(())
    }
}

fn io_error(category: ErrorCategory, msg: impl Into<String>, err: io::Error) -> AppError {
    AppError::with_kind_and_source(category, ErrorKind::Io, msg, err)
}
