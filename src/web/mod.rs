//! Browser front end.
//!
//! Server-rendered HTML over axum: a landing page with the system check, one
//! page per tool, downloads of the last successful artifact, and a JSON health
//! probe.

mod cookie;
mod form;
mod handlers;
mod pages;

pub use cookie::{SESSION_COOKIE, SessionId};
pub use form::{FieldName, read_submission};

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::availability::SystemCheck;
use crate::config::AppConfig;
use crate::operation::OperationRunner;
use crate::preview::PreviewLimits;
use crate::session::SessionStore;
use crate::tools::Toolbox;

/// Shared, read-mostly application state.
#[derive(Debug)]
pub struct AppState {
    pub runner: OperationRunner,
    pub system: SystemCheck,
    pub sessions: SessionStore,
    pub preview: PreviewLimits,
}

impl AppState {
    /// Build state from configuration, running the system check once.
    pub fn from_config(config: &AppConfig) -> Self {
        let toolbox = Toolbox::from_config(config);
        let system = SystemCheck::run(&toolbox.required_commands());
        Self {
            runner: OperationRunner::new(toolbox, config.workspace_root.clone()),
            system,
            sessions: SessionStore::new(config.session_idle()),
            preview: config.preview_limits(),
        }
    }
}

/// Axum router wrapper that hosts the web interface.
pub struct AppServer {
    router: Router,
}

impl AppServer {
    pub fn new(config: &AppConfig) -> Self {
        let state = Arc::new(AppState::from_config(config));
        Self::with_state(state, config.max_upload_bytes)
    }

    pub fn with_state(state: Arc<AppState>, max_upload_bytes: usize) -> Self {
        Self {
            router: build_router(state, max_upload_bytes),
        }
    }

    /// The router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound or the server fails.
    pub async fn serve(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr = %listener.local_addr()?, "web interface listening");
        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

fn build_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/healthz", get(handlers::healthz))
        .route("/{tool}", get(handlers::tool_page).post(handlers::run_tool))
        .route("/{tool}/download", get(handlers::download))
        .route("/{tool}/clear", post(handlers::clear))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
