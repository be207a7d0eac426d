//! Runtime configuration
//!
//! Every setting is a command-line flag that can also be supplied through a
//! `CRYPTAPP_*` environment variable.

use crate::preview::PreviewLimits;
use crate::telemetry::LogFormat;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(name = "cryptapp")]
#[command(version)]
#[command(
    about = "Browser front end for password-based file encryption and protected ZIP archives.",
    long_about = None
)]
pub struct AppConfig {
    /// Address the web interface listens on
    #[arg(long, env = "CRYPTAPP_BIND", default_value = "127.0.0.1:8501")]
    pub bind: SocketAddr,

    /// Cipher tool program (name on PATH or absolute path)
    #[arg(long, env = "CRYPTAPP_OPENSSL", default_value = "openssl")]
    pub openssl: String,

    /// Archive tool program (name on PATH or absolute path)
    #[arg(long, env = "CRYPTAPP_ZIP", default_value = "zip")]
    pub zip: String,

    /// Cipher passed to `openssl enc`
    #[arg(long, env = "CRYPTAPP_CIPHER", default_value = "aes-256-cbc")]
    pub cipher: String,

    /// Seconds before a cipher invocation is killed
    #[arg(long, env = "CRYPTAPP_CIPHER_TIMEOUT_SECS", default_value_t = 60)]
    pub cipher_timeout_secs: u64,

    /// Seconds before an archive invocation is killed
    #[arg(long, env = "CRYPTAPP_ARCHIVE_TIMEOUT_SECS", default_value_t = 120)]
    pub archive_timeout_secs: u64,

    /// Files of at least this many bytes are not previewed
    #[arg(long, env = "CRYPTAPP_PREVIEW_MAX_BYTES", default_value_t = 5 * 1024 * 1024)]
    pub preview_max_bytes: u64,

    /// Text previews show at most this many lines
    #[arg(long, env = "CRYPTAPP_PREVIEW_MAX_LINES", default_value_t = 100)]
    pub preview_max_lines: usize,

    /// Largest accepted request body
    #[arg(long, env = "CRYPTAPP_MAX_UPLOAD_BYTES", default_value_t = 200 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    /// Directory under which per-operation workspaces are created
    #[arg(long, env = "CRYPTAPP_WORKSPACE_ROOT", value_name = "DIR")]
    pub workspace_root: Option<PathBuf>,

    /// Sessions idle for this many seconds are forgotten
    #[arg(long, env = "CRYPTAPP_SESSION_IDLE_SECS", default_value_t = 3600)]
    pub session_idle_secs: u64,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, env = "CRYPTAPP_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Log output format
    #[arg(long, env = "CRYPTAPP_LOG_FORMAT", value_enum, default_value_t = LogFormat::infer())]
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn preview_limits(&self) -> PreviewLimits {
        PreviewLimits {
            max_bytes: self.preview_max_bytes,
            max_lines: self.preview_max_lines,
            ..PreviewLimits::default()
        }
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}
