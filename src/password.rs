//! Password handling
//!
//! Passwords arrive as form fields and leave as a command-line argument for
//! the external tool. In between they are held in `Zeroizing` buffers so the
//! copies this process owns are wiped when dropped.

use std::fmt;
use zeroize::Zeroizing;

/// Placeholder shown wherever a secret would otherwise be rendered.
pub const REDACTED: &str = "********";

/// A user-supplied password.
#[derive(Clone, Default)]
pub struct Password {
    secret: Zeroizing<String>,
}

impl Password {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: Zeroizing::new(secret.into()),
        }
    }

    /// Builds a password from raw form bytes.
    ///
    /// Browsers submit text fields as UTF-8; anything else is replaced
    /// lossily, which still never matches a differently-typed confirmation.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn is_empty(&self) -> bool {
        self.secret.is_empty()
    }

    /// True when `other` is exactly the same password.
    pub fn matches(&self, other: &Password) -> bool {
        *self.secret == *other.secret
    }

    /// The plaintext, for handing to the external tool.
    pub fn expose(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Password").field(&REDACTED).finish()
    }
}
