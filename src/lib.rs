//! cryptapp: a browser front end for two everyday file-protection tasks.
//!
//! Files are encrypted or decrypted with `openssl enc` using PBKDF2 key
//! derivation, or wrapped in a password-protected ZIP archive with `zip -e`.
//! Each submission runs in its own private temporary workspace that is removed
//! afterwards; the last successful artifact per tool stays downloadable for the
//! browser session.

#![forbid(unsafe_code)]

pub mod availability;
pub mod config;
pub mod error;
pub mod operation;
pub mod password;
pub mod preview;
pub mod process;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod web;
pub mod workspace;
