//! HTML rendering.

use std::fmt::Write;

use crate::availability::{RequiredCommand, SystemCheck};
use crate::error::{AppError, ErrorKind};
use crate::operation::OperationReport;
use crate::preview::{Preview, PreviewLimits, human_size};
use crate::session::StoredResult;
use crate::tools::{Operation, ToolKind};

use super::form::{
    FIELD_CONFIRM, FIELD_FILE, FIELD_MODE, FIELD_OUTPUT, FIELD_PASSWORD, FieldName, MODE_DECRYPT,
    MODE_ENCRYPT,
};

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:46rem;margin:2rem auto;padding:0 1rem;line-height:1.5}\
nav a{margin-right:1rem}\
.box{border-radius:.4rem;padding:.6rem .9rem;margin:.8rem 0}\
.success{background:#e6f4ea}.error{background:#fce8e6}.warning{background:#fef7e0}.info{background:#e8f0fe}\
pre{background:#f4f4f4;padding:.6rem;overflow-x:auto;white-space:pre-wrap;word-break:break-all}\
label{display:block;margin-top:.7rem}input[type=text],input[type=password]{width:100%}\
.cols{display:flex;gap:1rem}.cols>div{flex:1}";

const SECURITY_NOTE: &str = "For automation, both tools pass passwords non-interactively to their \
command-line utilities. This may expose the password temporarily in the system's process list. \
Use with caution in shared or untrusted environments.";

/// Minimal HTML escaping for text and attribute values.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn layout(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">\
<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\
<title>{title}</title><style>{STYLE}</style></head><body>\
<nav><a href=\"/\">Home</a><a href=\"/encrypt\">Encrypt / Decrypt</a><a href=\"/zip\">Zip File Tool</a></nav>\
{body}<hr><p><small>cryptapp {version}</small></p></body></html>",
        title = escape(title),
        version = env!("CARGO_PKG_VERSION"),
    )
}

fn boxed(class: &str, html: &str) -> String {
    format!("<div class=\"box {}\">{}</div>", class, html)
}

fn pre(text: &str) -> String {
    format!("<pre>{}</pre>", escape(text))
}

fn missing_command_html(command: &RequiredCommand) -> String {
    format!(
        "<li><strong>{}</strong> (<code>{}</code>): {}</li>",
        escape(command.label),
        escape(&command.program),
        escape(command.remediation)
    )
}

pub fn home(system: &SystemCheck, cipher: &str) -> String {
    let mut body = String::new();
    body.push_str("<h1>Cryptography &amp; File Utilities</h1>");
    let _ = write!(
        body,
        "<h2>About This App</h2>\
<p>User-friendly tools for common file security tasks, built on the standard \
<strong>OpenSSL</strong> and <strong>Zip</strong> command-line utilities.</p>\
<ol><li><a href=\"/encrypt\">Encrypt / Decrypt Tool</a>: OpenSSL's <code>{cipher}</code> cipher with \
PBKDF2 key derivation. Ideal for securing individual files with a password.</li>\
<li><a href=\"/zip\">Zip File Tool</a>: password-protected ZIP archives using the system's \
<code>zip</code> command (<code>-e</code>). Standard ZIP encryption is considerably weaker than AES.</li></ol>\
<h3>Important Considerations</h3><ul>\
<li><strong>Remember your passwords!</strong> A file cannot be recovered without it.</li>\
<li>Encrypted files decrypt reliably only with the same OpenSSL parameters.</li>\
<li><strong>Security Note:</strong> {note}</li></ul>",
        cipher = escape(cipher),
        note = SECURITY_NOTE,
    );

    body.push_str("<h2>System Check</h2>");
    if system.all_found() {
        let names = system
            .found
            .iter()
            .map(|n| format!("<code>{}</code>", escape(n)))
            .collect::<Vec<_>>()
            .join(", ");
        body.push_str(&boxed(
            "success",
            &format!("Required commands ({}) found!", names),
        ));
        body.push_str(&boxed(
            "info",
            "Choose a tool from the navigation above to begin.",
        ));
    } else {
        let mut html = format!(
            "<strong>Critical Error:</strong> the following command(s) were not found: {}.\
<p>Install the missing utilities on the machine running this server and make sure they \
are on its PATH. The tools will not work until then.</p><ul>",
            system
                .missing_names()
                .iter()
                .map(|n| format!("<code>{}</code>", escape(n)))
                .collect::<Vec<_>>()
                .join(", ")
        );
        for command in &system.missing {
            html.push_str(&missing_command_html(command));
        }
        html.push_str("</ul>");
        body.push_str(&boxed("error", &html));
    }
    layout("Crypto App Home", &body)
}

pub fn not_found() -> String {
    layout(
        "Not Found",
        "<h1>Not Found</h1><p>No such tool. Choose one from the navigation above.</p>",
    )
}

/// What the tool page shows below the form.
pub enum Status<'a> {
    /// Nothing submitted and nothing cached.
    Fresh,
    /// Cached artifact from an earlier submission.
    Previous(&'a StoredResult),
    /// The submission could not even be read.
    Rejected(&'a AppError),
    /// A submission ran.
    Report {
        report: &'a OperationReport,
        input: InputSummary<'a>,
    },
}

/// The uploaded file, for the input preview.
pub struct InputSummary<'a> {
    pub name: &'a str,
    pub bytes: &'a [u8],
}

pub struct ToolView<'a> {
    pub tool: ToolKind,
    pub cipher: &'a str,
    pub generation: u64,
    /// Set when the tool's program is not installed.
    pub missing: Option<&'a RequiredCommand>,
    pub limits: &'a PreviewLimits,
    /// Radio selection for the cipher page.
    pub selected: Operation,
}

fn title(tool: ToolKind) -> &'static str {
    match tool {
        ToolKind::Cipher => "Encrypt / Decrypt File",
        ToolKind::Archive => "Create Password-Protected ZIP File",
    }
}

pub fn tool_page(view: &ToolView<'_>, status: &Status<'_>) -> String {
    let mut body = format!("<h1>{}</h1>", title(view.tool));
    match view.tool {
        ToolKind::Cipher => {
            let _ = write!(
                body,
                "<p>Uses <code>openssl enc -{} -pbkdf2</code>. Remember your password!</p>",
                escape(view.cipher)
            );
        }
        ToolKind::Archive => {
            body.push_str("<p>Uses the system's <code>zip</code> command with password protection.</p>");
            body.push_str(&boxed(
                "info",
                "<strong>Note:</strong> this tool currently supports zipping a single file.",
            ));
        }
    }

    if let Some(command) = view.missing {
        body.push_str(&boxed(
            "error",
            &format!(
                "<strong>CRITICAL ERROR:</strong> <code>{}</code> command not found. \
Please make sure it is installed and on the PATH.<ul>{}</ul>",
                escape(&command.program),
                missing_command_html(command)
            ),
        ));
    }

    body.push_str(&form(view));
    body.push_str("<hr>");
    body.push_str(&status_html(view, status));
    let _ = write!(
        body,
        "<hr><form method=\"post\" action=\"/{}/clear\"><button type=\"submit\">Clear All</button></form>",
        view.tool.slug()
    );
    layout(title(view.tool), &body)
}

fn form(view: &ToolView<'_>) -> String {
    let g = view.generation;
    let disabled = if view.missing.is_some() { " disabled" } else { "" };
    let mut html = format!(
        "<form method=\"post\" action=\"/{}\" enctype=\"multipart/form-data\" autocomplete=\"off\">",
        view.tool.slug()
    );

    if view.tool == ToolKind::Cipher {
        let mode = FieldName::new(FIELD_MODE, g);
        let checked = |op: Operation| if view.selected == op { " checked" } else { "" };
        let _ = write!(
            html,
            "<fieldset><legend>Select Operation</legend>\
<label><input type=\"radio\" name=\"{mode}\" value=\"{enc}\"{c1}> Encrypt</label>\
<label><input type=\"radio\" name=\"{mode}\" value=\"{dec}\"{c2}> Decrypt</label></fieldset>",
            mode = mode,
            enc = MODE_ENCRYPT,
            dec = MODE_DECRYPT,
            c1 = checked(Operation::Encrypt),
            c2 = checked(Operation::Decrypt),
        );
    }

    let file = FieldName::new(FIELD_FILE, g);
    let password = FieldName::new(FIELD_PASSWORD, g);
    let confirm = FieldName::new(FIELD_CONFIRM, g);
    let output = FieldName::new(FIELD_OUTPUT, g);
    let (file_label, confirm_label, output_label, placeholder) = match view.tool {
        ToolKind::Cipher => (
            "Choose a file",
            "Confirm Password (encrypt only)",
            "Desired Output Filename",
            "leave blank for notes.txt \u{2192} notes.enc, notes.enc \u{2192} notes",
        ),
        ToolKind::Archive => (
            "Choose the file to zip",
            "Confirm Password",
            "Desired Output ZIP Filename",
            "leave blank for report.pdf \u{2192} report_protected.zip",
        ),
    };
    let _ = write!(
        html,
        "<label for=\"{file}\">{file_label}</label><input type=\"file\" id=\"{file}\" name=\"{file}\" required>\
<div class=\"cols\"><div><label for=\"{password}\">Enter Password</label>\
<input type=\"password\" id=\"{password}\" name=\"{password}\"></div>\
<div><label for=\"{confirm}\">{confirm_label}</label>\
<input type=\"password\" id=\"{confirm}\" name=\"{confirm}\"></div></div>\
<label for=\"{output}\">{output_label}</label>\
<input type=\"text\" id=\"{output}\" name=\"{output}\" placeholder=\"{placeholder}\">",
        placeholder = escape(placeholder),
    );

    if view.tool == ToolKind::Archive {
        html.push_str(&boxed(
            "warning",
            "<strong>Security Note:</strong> this tool passes the password directly to the \
<code>zip</code> command using the <code>-P</code> flag, so it may be briefly visible in the \
system's process list. Use with caution in shared environments.",
        ));
    } else {
        html.push_str(&boxed(
            "warning",
            "<strong>Security Note:</strong> the password is passed to <code>openssl</code> as \
<code>-pass pass:&lt;password&gt;</code>, so it may be briefly visible in the system's process list.",
        ));
    }

    let button = match view.tool {
        ToolKind::Cipher => "Run".to_string(),
        ToolKind::Archive => Operation::Archive.to_string(),
    };
    let _ = write!(
        html,
        "<p><button type=\"submit\"{disabled}>{}</button></p></form>",
        escape(&button)
    );
    html
}

fn status_html(view: &ToolView<'_>, status: &Status<'_>) -> String {
    match status {
        Status::Fresh => String::new(),
        Status::Rejected(err) => boxed("error", &escape(err.message())),
        Status::Previous(stored) => {
            let mut html = boxed("success", "Showing previous successful result.");
            html.push_str(&output_section(
                view,
                &stored.output_name,
                &stored.bytes,
                "Preview Previous Output File",
            ));
            html
        }
        Status::Report { report, input } => report_html(view, report, input),
    }
}

fn file_details(summary: &str, name: &str, bytes: &[u8], limits: &PreviewLimits, open: bool) -> String {
    let preview = Preview::build(name, bytes, limits);
    let content = match &preview {
        Preview::Text { .. } => format!(
            "<p><strong>Preview (first {} lines or {}):</strong></p>{}",
            limits.max_lines,
            human_size(limits.max_bytes),
            pre(&preview.to_string())
        ),
        _ => pre(&preview.to_string()),
    };
    format!(
        "<details{}><summary>{}</summary><p><strong>Filename:</strong> <code>{}</code><br>\
<strong>Size:</strong> <code>{}</code></p>{}</details>",
        if open { " open" } else { "" },
        escape(summary),
        escape(name),
        human_size(bytes.len() as u64),
        content
    )
}

fn output_section(view: &ToolView<'_>, name: &str, bytes: &[u8], summary: &str) -> String {
    let mut html = file_details(summary, name, bytes, view.limits, true);
    let _ = write!(
        html,
        "<p><a href=\"/{}/download\" download=\"{}\"><button type=\"button\">Download {}</button></a></p>",
        view.tool.slug(),
        escape(name),
        escape(name)
    );
    html
}

fn report_html(view: &ToolView<'_>, report: &OperationReport, input: &InputSummary<'_>) -> String {
    let mut html = String::new();
    for notice in &report.notices {
        html.push_str(&boxed("warning", &escape(notice)));
    }

    let validation_failed = report
        .error
        .as_ref()
        .is_some_and(|e| e.is(ErrorKind::Validation));
    if !validation_failed {
        html.push_str(&file_details(
            "Preview Input File",
            input.name,
            input.bytes,
            view.limits,
            false,
        ));
    }

    let tool_label = match view.tool {
        ToolKind::Cipher => "OpenSSL",
        ToolKind::Archive => "Zip",
    };

    if let Some(err) = &report.error {
        let mut detail = format!("<strong>{}</strong>", escape(err.message()));
        if let Some(result) = &report.result {
            if !result.stderr.is_empty() {
                detail.push_str(&pre(&result.stderr));
            }
        }
        if err.is(ErrorKind::ToolNotFound) {
            if let Some(command) = view.missing {
                let _ = write!(detail, "<ul>{}</ul>", missing_command_html(command));
            }
        }
        html.push_str(&boxed("error", &detail));
        if !validation_failed {
            html.push_str(&boxed(
                "error",
                &format!(
                    "{} failed. See details above.",
                    escape(&report.operation.to_string())
                ),
            ));
        }
    } else if let (Some(result), Some(output), Some(name)) =
        (&report.result, report.output(), report.output_name.as_deref())
    {
        let message = match report.operation {
            Operation::Archive => "Password-protected ZIP created successfully!".to_string(),
            op => format!("{} successful!", op),
        };
        html.push_str(&boxed("success", &escape(&message)));
        if !result.stderr.is_empty() {
            let class = if view.tool == ToolKind::Archive { "info" } else { "warning" };
            html.push_str(&boxed(
                class,
                &format!(
                    "{} Messages (stderr):{}",
                    tool_label,
                    pre(&result.stderr)
                ),
            ));
        }
        if !result.stdout.is_empty() {
            let _ = write!(
                html,
                "<details><summary>{} output</summary>{}</details>",
                tool_label,
                pre(&result.stdout)
            );
        }
        html.push_str(&output_section(view, name, output, "Preview Output File"));
    }

    if let Some(warning) = &report.cleanup_warning {
        html.push_str(&boxed("warning", &escape(warning.message())));
    }
    html
}
