//! Tool form fields and multipart submission parsing.
//!
//! Every stateful field name carries the tool's widget generation
//! (`password-3`). After "Clear All" the generation moves on, so values a
//! browser restores into old fields are never read back.

use std::fmt;

use axum::extract::Multipart;
use axum::extract::multipart::MultipartError;

use crate::error::{AppError, ErrorCategory, ErrorKind, Result};
use crate::operation::OperationRequest;
use crate::password::Password;
use crate::tools::{Operation, ToolKind};

pub const FIELD_MODE: &str = "mode";
pub const FIELD_FILE: &str = "file";
pub const FIELD_PASSWORD: &str = "password";
pub const FIELD_CONFIRM: &str = "confirm";
pub const FIELD_OUTPUT: &str = "output_name";

pub const MODE_ENCRYPT: &str = "encrypt";
pub const MODE_DECRYPT: &str = "decrypt";

/// A form field name scoped to one widget generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldName<'a> {
    pub base: &'a str,
    pub generation: u64,
}

impl<'a> FieldName<'a> {
    pub fn new(base: &'a str, generation: u64) -> Self {
        Self { base, generation }
    }

    pub fn parse(raw: &'a str) -> Option<Self> {
        let (base, generation) = raw.rsplit_once('-')?;
        Some(Self {
            base,
            generation: generation.parse().ok()?,
        })
    }
}

impl fmt::Display for FieldName<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.base, self.generation)
    }
}

/// Read a tool form into a request.
///
/// A blank output name falls back to the default derived from the upload.
pub async fn read_submission(
    multipart: &mut Multipart,
    tool: ToolKind,
    generation: u64,
) -> Result<OperationRequest> {
    let mut mode = None;
    let mut upload: Option<(String, Vec<u8>)> = None;
    let mut password = Password::default();
    let mut confirmation = Password::default();
    let mut output_name = String::new();

    while let Some(field) = multipart.next_field().await.map_err(upload_error)? {
        let Some(raw) = field.name().map(str::to_owned) else {
            continue;
        };
        let Some(name) = FieldName::parse(&raw) else {
            continue;
        };
        if name.generation != generation {
            tracing::debug!(field = %raw, current = generation, "ignoring field from a cleared form");
            continue;
        }

        match name.base {
            FIELD_FILE => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(upload_error)?;
                // Browsers send an empty, unnamed part when no file was chosen.
                if !(file_name.is_empty() && bytes.is_empty()) {
                    upload = Some((file_name, bytes.to_vec()));
                }
            }
            FIELD_PASSWORD => {
                password = Password::from_bytes(&field.bytes().await.map_err(upload_error)?);
            }
            FIELD_CONFIRM => {
                confirmation = Password::from_bytes(&field.bytes().await.map_err(upload_error)?);
            }
            FIELD_OUTPUT => output_name = field.text().await.map_err(upload_error)?,
            FIELD_MODE => mode = Some(field.text().await.map_err(upload_error)?),
            _ => {}
        }
    }

    let operation = match tool {
        ToolKind::Archive => Operation::Archive,
        ToolKind::Cipher if mode.as_deref() == Some(MODE_DECRYPT) => Operation::Decrypt,
        ToolKind::Cipher => Operation::Encrypt,
    };

    let Some((input_name, input)) = upload else {
        return Err(AppError::validation("Choose a file to process."));
    };

    if output_name.trim().is_empty() {
        output_name = OperationRequest::default_output_name(operation, &input_name);
    }

    Ok(OperationRequest {
        operation,
        input_name,
        input,
        password,
        confirmation,
        output_name,
    })
}

fn upload_error(err: MultipartError) -> AppError {
    AppError::with_kind(
        ErrorCategory::User,
        ErrorKind::Io,
        format!("Could not read the submitted form: {}", err.body_text()),
    )
}
