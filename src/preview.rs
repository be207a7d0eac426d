//! Content previews and content-type guessing
//!
//! Previews are bounded: files at or above `max_bytes` are not shown at all,
//! text is cut after `max_lines` lines, and anything that is not text is shown
//! as a hex dump of its first `hex_bytes` bytes.

use std::fmt;
use std::path::Path;

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("txt", "text/plain"),
    ("text", "text/plain"),
    ("log", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("tsv", "text/tab-separated-values"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("css", "text/css"),
    ("js", "text/javascript"),
    ("py", "text/x-python"),
    ("rs", "text/x-rust"),
    ("sh", "text/x-sh"),
    ("ini", "text/plain"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("yaml", "application/yaml"),
    ("yml", "application/yaml"),
    ("toml", "application/toml"),
    ("svg", "image/svg+xml"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("webp", "image/webp"),
    ("zip", "application/zip"),
    ("gz", "application/gzip"),
    ("tar", "application/x-tar"),
    ("7z", "application/x-7z-compressed"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("doc", "application/msword"),
    (
        "docx",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    ),
    ("xls", "application/vnd.ms-excel"),
    (
        "xlsx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    ),
];

/// Best guess at a file's content type from its extension.
pub fn guess_content_type(name: &str) -> &'static str {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .and_then(|ext| {
            CONTENT_TYPES
                .iter()
                .find(|(known, _)| *known == ext)
                .map(|(_, content_type)| *content_type)
        })
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

fn is_textual(content_type: &str) -> bool {
    content_type.starts_with("text/")
        || matches!(
            content_type,
            "application/json"
                | "application/xml"
                | "application/yaml"
                | "application/toml"
                | "image/svg+xml"
        )
}

/// Bounds applied when building a [`Preview`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewLimits {
    pub max_bytes: u64,
    pub max_lines: usize,
    pub hex_bytes: usize,
}

impl Default for PreviewLimits {
    fn default() -> Self {
        Self {
            max_bytes: 5 * 1024 * 1024,
            max_lines: 100,
            hex_bytes: 256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Empty,
    TooLarge {
        size: u64,
    },
    Text {
        content: String,
        truncated: bool,
    },
    /// Binary content, or text that failed to decode.
    Hex {
        dump: String,
        shown: usize,
        total: usize,
    },
}

impl Preview {
    /// Build a preview of `contents`, using `name` to guess whether it is text.
    ///
    /// Names with an unrecognised extension are treated as text when the
    /// bytes are valid UTF-8 without stray control characters.
    pub fn build(name: &str, contents: &[u8], limits: &PreviewLimits) -> Self {
        let size = contents.len() as u64;
        if size == 0 {
            return Preview::Empty;
        }
        if size >= limits.max_bytes {
            return Preview::TooLarge { size };
        }

        let content_type = guess_content_type(name);
        let try_text = is_textual(content_type) || content_type == DEFAULT_CONTENT_TYPE;
        if try_text {
            if let Ok(text) = std::str::from_utf8(contents) {
                if is_textual(content_type) || looks_like_text(text) {
                    return text_preview(text, limits.max_lines);
                }
            }
        }

        let shown = contents.len().min(limits.hex_bytes);
        Preview::Hex {
            dump: hex_dump(&contents[..shown]),
            shown,
            total: contents.len(),
        }
    }
}

fn looks_like_text(text: &str) -> bool {
    !text
        .chars()
        .any(|c| c.is_control() && !matches!(c, '\n' | '\r' | '\t'))
}

fn text_preview(text: &str, max_lines: usize) -> Preview {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() > max_lines {
        Preview::Text {
            content: lines[..max_lines].join("\n"),
            truncated: true,
        }
    } else {
        Preview::Text {
            content: text.to_string(),
            truncated: false,
        }
    }
}

/// Lowercase hex bytes separated by single spaces.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(1)
        .map(hex::encode)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Size in the unit a person would pick.
pub fn human_size(bytes: u64) -> String {
    const KIB: f64 = 1024.0;
    let b = bytes as f64;
    if b >= KIB * KIB {
        format!("{:.2} MB", b / (KIB * KIB))
    } else {
        format!("{:.2} KB", b / KIB)
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preview::Empty => write!(f, "(File is empty)"),
            Preview::TooLarge { size } => {
                write!(f, "(File is too large for preview: {})", human_size(*size))
            }
            Preview::Text { content, truncated } => {
                write!(f, "{}", content)?;
                if *truncated {
                    write!(f, "\n... (truncated)")?;
                }
                Ok(())
            }
            Preview::Hex { dump, shown, total } => {
                write!(
                    f,
                    "(Binary file detected or text decoding failed)\nHex preview (first {} of {} bytes):\n{}",
                    shown, total, dump
                )?;
                if shown < total {
                    write!(f, " ...")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_guess() {
        assert_eq!(guess_content_type("notes.txt"), "text/plain");
        assert_eq!(guess_content_type("ARCHIVE.ZIP"), "application/zip");
        assert_eq!(guess_content_type("notes.enc"), DEFAULT_CONTENT_TYPE);
        assert_eq!(guess_content_type("noext"), DEFAULT_CONTENT_TYPE);
        assert_eq!(guess_content_type(".txt"), DEFAULT_CONTENT_TYPE);
    }

    #[test]
    fn test_empty_file() {
        let p = Preview::build("empty.txt", b"", &PreviewLimits::default());
        assert_eq!(p, Preview::Empty);
        assert_eq!(p.to_string(), "(File is empty)");
    }

    #[test]
    fn test_size_limit_is_inclusive() {
        let limits = PreviewLimits {
            max_bytes: 16,
            ..PreviewLimits::default()
        };
        let at_limit = vec![b'a'; 16];
        assert_eq!(
            Preview::build("a.txt", &at_limit, &limits),
            Preview::TooLarge { size: 16 }
        );
        let below = vec![b'a'; 15];
        assert!(matches!(
            Preview::build("a.txt", &below, &limits),
            Preview::Text { .. }
        ));
    }

    #[test]
    fn test_too_large_message() {
        let p = Preview::TooLarge {
            size: 6 * 1024 * 1024,
        };
        assert_eq!(p.to_string(), "(File is too large for preview: 6.00 MB)");
    }

    #[test]
    fn test_text_preview() {
        let p = Preview::build("notes.txt", b"hello test", &PreviewLimits::default());
        assert_eq!(
            p,
            Preview::Text {
                content: "hello test".into(),
                truncated: false
            }
        );
    }

    #[test]
    fn test_line_limit_truncates() {
        let limits = PreviewLimits {
            max_lines: 3,
            ..PreviewLimits::default()
        };
        let p = Preview::build("log.txt", b"1\n2\n3\n4\n5\n", &limits);
        assert_eq!(
            p,
            Preview::Text {
                content: "1\n2\n3".into(),
                truncated: true
            }
        );
        assert!(p.to_string().ends_with("... (truncated)"));
    }

    #[test]
    fn test_invalid_utf8_falls_back_to_hex() {
        let p = Preview::build("data.txt", &[0xff, 0xfe, 0x41], &PreviewLimits::default());
        assert_eq!(
            p,
            Preview::Hex {
                dump: "ff fe 41".into(),
                shown: 3,
                total: 3
            }
        );
    }

    #[test]
    fn test_binary_type_is_hex_even_if_decodable() {
        let p = Preview::build("image.png", b"PNG", &PreviewLimits::default());
        assert!(matches!(p, Preview::Hex { .. }));
    }

    #[test]
    fn test_unknown_extension_with_text_content() {
        let p = Preview::build("notes", b"plain words\n", &PreviewLimits::default());
        assert!(matches!(p, Preview::Text { .. }));
        let p = Preview::build("notes", b"Salted__\x01\x02", &PreviewLimits::default());
        assert!(matches!(p, Preview::Hex { .. }));
    }

    #[test]
    fn test_hex_prefix_is_bounded() {
        let data: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        match Preview::build("blob.bin", &data, &PreviewLimits::default()) {
            Preview::Hex { dump, shown, total } => {
                assert_eq!(shown, 256);
                assert_eq!(total, 1000);
                assert_eq!(dump.split(' ').count(), 256);
                assert!(dump.starts_with("00 01 02"));
            }
            other => panic!("expected hex preview, got {:?}", other),
        }
    }

    #[test]
    fn test_hex_dump_is_lowercase_and_spaced() {
        assert_eq!(hex_dump(&[0x00, 0xab, 0xff, 0x10]), "00 ab ff 10");
        assert_eq!(hex_dump(&[]), "");
    }

    #[test]
    fn test_human_size() {
        assert_eq!(human_size(10), "0.01 KB");
        assert_eq!(human_size(2048), "2.00 KB");
        assert_eq!(human_size(5 * 1024 * 1024), "5.00 MB");
    }
}
