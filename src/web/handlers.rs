use std::sync::Arc;

use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{Html, IntoResponse, Redirect, Response},
};
use serde::Serialize;

use crate::availability::RequiredCommand;
use crate::error::{AppError, ErrorCategory, ErrorKind};
use crate::operation::OperationReport;
use crate::preview::guess_content_type;
use crate::session::StoredResult;
use crate::tools::{Operation, ToolKind};

use super::AppState;
use super::cookie::SessionId;
use super::form::read_submission;
use super::pages::{self, InputSummary, Status, ToolView};

const ZIP_CONTENT_TYPE: &str = "application/zip";

#[derive(Debug, Serialize)]
struct Health<'a> {
    status: &'static str,
    missing: Vec<&'a str>,
}

pub async fn home(State(state): State<Arc<AppState>>, session: SessionId) -> Response {
    let html = pages::home(&state.system, state.runner.toolbox().cipher.cipher());
    session.attach(Html(html).into_response())
}

pub async fn healthz(State(state): State<Arc<AppState>>) -> Response {
    let health = Health {
        status: if state.system.all_found() { "ok" } else { "degraded" },
        missing: state.system.missing_names(),
    };
    Json(health).into_response()
}

pub async fn tool_page(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Path(slug): Path<String>,
) -> Response {
    let Some(tool) = ToolKind::from_slug(&slug) else {
        return not_found();
    };
    let (generation, previous) = state.sessions.with(session.id, |cache| {
        (cache.generation(tool), cache.last(tool).cloned())
    });

    let selected = previous
        .as_ref()
        .map_or_else(|| default_operation(tool), |p| p.operation);
    let view = tool_view(&state, tool, generation, selected);
    let status = match &previous {
        Some(stored) => Status::Previous(stored),
        None => Status::Fresh,
    };
    session.attach(Html(pages::tool_page(&view, &status)).into_response())
}

pub async fn run_tool(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Path(slug): Path<String>,
    mut multipart: Multipart,
) -> Response {
    let Some(tool) = ToolKind::from_slug(&slug) else {
        return not_found();
    };
    let generation = state.sessions.with(session.id, |cache| {
        cache.begin(tool);
        cache.generation(tool)
    });

    let request = match read_submission(&mut multipart, tool, generation).await {
        Ok(request) => request,
        Err(err) => {
            let view = tool_view(&state, tool, generation, default_operation(tool));
            let html = pages::tool_page(&view, &Status::Rejected(&err));
            return session.attach((status_for(&err), Html(html)).into_response());
        }
    };

    let view = tool_view(&state, tool, generation, request.operation);
    if let Some(command) = view.missing {
        let err = missing_tool_error(command);
        tracing::warn!(tool = tool.slug(), program = %command.program, "submission for unavailable tool");
        let html = pages::tool_page(&view, &Status::Rejected(&err));
        return session.attach((status_for(&err), Html(html)).into_response());
    }

    let report = state.runner.run(&request).await;
    if let Some(command) = &report.command {
        tracing::info!(tool = tool.slug(), %command, succeeded = report.succeeded(), "operation finished");
    }
    if let Some(stored) = stored_result(tool, &report) {
        state.sessions.with(session.id, |cache| cache.store(tool, stored));
    }

    let status = report.error.as_ref().map_or(StatusCode::OK, status_for);
    let html = pages::tool_page(
        &view,
        &Status::Report {
            report: &report,
            input: InputSummary {
                name: &request.input_name,
                bytes: &request.input,
            },
        },
    );
    session.attach((status, Html(html)).into_response())
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Path(slug): Path<String>,
) -> Response {
    let Some(tool) = ToolKind::from_slug(&slug) else {
        return not_found();
    };
    let Some(stored) = state.sessions.with(session.id, |cache| cache.last(tool).cloned()) else {
        return session.attach((StatusCode::NOT_FOUND, "No result to download.").into_response());
    };

    let headers = [
        (CONTENT_TYPE, stored.content_type.to_string()),
        (CONTENT_DISPOSITION, attachment(&stored.output_name)),
        (CACHE_CONTROL, "no-store".to_string()),
    ];
    session.attach((headers, stored.bytes.to_vec()).into_response())
}

pub async fn clear(
    State(state): State<Arc<AppState>>,
    session: SessionId,
    Path(slug): Path<String>,
) -> Response {
    let Some(tool) = ToolKind::from_slug(&slug) else {
        return not_found();
    };
    let generation = state.sessions.with(session.id, |cache| cache.clear(tool));
    tracing::debug!(tool = tool.slug(), generation, "cleared tool state");
    session.attach(Redirect::to(&format!("/{}", tool.slug())).into_response())
}

fn tool_view(state: &AppState, tool: ToolKind, generation: u64, selected: Operation) -> ToolView<'_> {
    let program = state.runner.tool(tool).program();
    ToolView {
        tool,
        cipher: state.runner.toolbox().cipher.cipher(),
        generation,
        missing: state.system.missing_command(program),
        limits: &state.preview,
        selected,
    }
}

fn default_operation(tool: ToolKind) -> Operation {
    match tool {
        ToolKind::Cipher => Operation::Encrypt,
        ToolKind::Archive => Operation::Archive,
    }
}

fn missing_tool_error(command: &RequiredCommand) -> AppError {
    AppError::with_kind(
        ErrorCategory::Environment,
        ErrorKind::ToolNotFound,
        format!(
            "The '{}' command was not found. Is it installed and in PATH?",
            command.program
        ),
    )
}

fn stored_result(tool: ToolKind, report: &OperationReport) -> Option<StoredResult> {
    if !report.succeeded() {
        return None;
    }
    let name = report.output_name.clone()?;
    let bytes = report.output()?;
    let content_type = match tool {
        ToolKind::Archive => ZIP_CONTENT_TYPE,
        ToolKind::Cipher => guess_content_type(&name),
    };
    Some(StoredResult {
        operation: report.operation,
        output_name: name,
        content_type,
        bytes: Arc::from(bytes),
    })
}

fn status_for(err: &AppError) -> StatusCode {
    match err.kind {
        Some(ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
        Some(ErrorKind::ToolNotFound) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorKind::Io) if err.category == ErrorCategory::User => StatusCode::BAD_REQUEST,
        _ => StatusCode::OK,
    }
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Html(pages::not_found())).into_response()
}

/// `Content-Disposition` value with the name reduced to header-safe ASCII.
fn attachment(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect();
    format!("attachment; filename=\"{}\"", safe)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_names_are_quoted_safely() {
        assert_eq!(attachment("notes.enc"), "attachment; filename=\"notes.enc\"");
        assert_eq!(
            attachment("a\"b\\c\u{e9}.zip"),
            "attachment; filename=\"a_b_c_.zip\""
        );
    }

    #[test]
    fn test_status_follows_error_kind() {
        assert_eq!(
            status_for(&AppError::validation("x")),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        let missing = missing_tool_error(&RequiredCommand {
            program: "zip".into(),
            label: "Zip",
            remediation: "",
        });
        assert_eq!(status_for(&missing), StatusCode::SERVICE_UNAVAILABLE);
        let failed = AppError::with_kind(ErrorCategory::Internal, ErrorKind::ProcessFailure, "x");
        assert_eq!(status_for(&failed), StatusCode::OK);
    }
}
