use std::error::Error as StdError;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// Any failure that cannot be confidently attributed to any other error
    /// category in this enum.
    ///
    /// In particular this means that use of Internal is never a guarantee
    /// the error is not, for example due to a user error - merely that it
    /// cannot be confidently determined by the code.
    Internal,

    /// The user provided invalid input or performed an action that is
    /// unsupported or impossible to complete.
    User,

    /// The host is missing something the application depends on, such as
    /// an external command on the search path.
    Environment,
}

/// Fine-grained condition flags for consumers that want to branch on error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An external tool could not be resolved or spawned.
    ToolNotFound,
    /// Request input was rejected before any workspace or process existed.
    Validation,
    /// The external tool exceeded its time bound and was killed.
    ProcessTimeout,
    /// The external tool exited with a non-zero status.
    ProcessFailure,
    /// The external tool reported success but the expected artifact is absent.
    MissingOutput,
    /// Anything else that went wrong while running an operation.
    UnexpectedFault,
    /// The workspace could not be removed after the operation finished.
    CleanupWarning,
    /// Interaction with the filesystem or process pipes failed.
    Io,
}

#[derive(Debug, Error)]
#[error("{msg}")]
pub struct AppError {
    /// Broad error category, always provided.
    pub category: ErrorCategory,
    /// Optional specific condition tag for consumers that need to
    /// branch their behavior. Any code consuming errors MUST handle
    /// the absence of a defined kind.
    pub kind: Option<ErrorKind>,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync + 'static>>,
    msg: String,
}

impl AppError {
    /// Creates a new error that also tags the failure with a kind.
    pub fn with_kind(category: ErrorCategory, kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: None,
            msg: msg.into(),
        }
    }

    /// Creates a new error that carries both a kind tag and the originating source error.
    pub fn with_kind_and_source(
        category: ErrorCategory,
        kind: ErrorKind,
        msg: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            category,
            kind: Some(kind),
            source: Some(Box::new(source)),
            msg: msg.into(),
        }
    }

    /// A user input problem detected before anything was staged.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::with_kind(ErrorCategory::User, ErrorKind::Validation, msg)
    }

    /// The user-facing message carried by the error.
    pub fn message(&self) -> &str {
        &self.msg
    }

    /// True when the error is tagged with `kind`.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kind == Some(kind)
    }

    /// Returns the preserved source error if present.
    pub fn source_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        self.source.as_deref()
    }

    /// Wraps the current error with a higher-level message while preserving the original as source.
    pub fn with_context(self, msg: impl Into<String>) -> Self {
        let category = self.category;
        let kind = self.kind;
        Self {
            category,
            kind,
            source: Some(Box::new(self)),
            msg: msg.into(),
        }
    }
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_context_keeps_kind_and_source_chain() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = AppError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write input",
            io_err,
        )
        .with_context("failed to stage upload");

        assert_eq!(err.message(), "failed to stage upload");
        assert!(err.is(ErrorKind::Io));
        let inner = err.source_error().expect("context should keep the source");
        assert_eq!(inner.to_string(), "failed to write input");
    }

    #[test]
    fn test_validation_is_a_user_error() {
        let err = AppError::validation("Passwords do not match.");
        assert_eq!(err.category, ErrorCategory::User);
        assert!(err.is(ErrorKind::Validation));
        assert_eq!(err.to_string(), "Passwords do not match.");
    }
}
