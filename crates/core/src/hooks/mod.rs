// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hook Event Pipeline (spec §4.F): an HTTP server receiving structured
//! lifecycle events from agents, normalizing and dispatching them, plus the
//! runtime-control and file-send routes the hook script/TUI use to drive the
//! PTY Runtime directly.

mod events;
mod handlers;
mod runtime_routes;
mod send_files;

pub use events::EventPayload;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::chat::ChatClient;
use crate::project_store::ProjectStore;
use crate::pty::PtyRuntime;
use crate::pending::PendingTracker;
use crate::router::ContainerFileInjector;
use crate::streaming::StreamingUpdater;
use crate::transport::auth::{auth_layer, HookTokenSource};

/// Upper bound on a hook/runtime/send-files request body, well above any
/// realistic event payload, to bound handler JSON-decode work (spec §5
/// "HTTP handlers have a bounded request body size").
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Shared state behind every hook-pipeline route.
pub struct HookState {
    pub projects: Arc<dyn ProjectStore>,
    pub runtime: Arc<PtyRuntime>,
    pub pending: Arc<PendingTracker>,
    pub streaming: Arc<StreamingUpdater>,
    pub chat: Arc<dyn ChatClient>,
    pub container_injector: Option<Arc<dyn ContainerFileInjector>>,
    pub hook_token: Option<String>,
    pub show_thinking: bool,
    pub show_usage: bool,
    /// Per pending-tracker-key "session produced no activity" timers (spec
    /// §4.F `session.start` handler).
    lifecycle_timers: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl HookState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        projects: Arc<dyn ProjectStore>,
        runtime: Arc<PtyRuntime>,
        pending: Arc<PendingTracker>,
        streaming: Arc<StreamingUpdater>,
        chat: Arc<dyn ChatClient>,
        container_injector: Option<Arc<dyn ContainerFileInjector>>,
        hook_token: Option<String>,
        show_thinking: bool,
        show_usage: bool,
    ) -> Self {
        Self {
            projects,
            runtime,
            pending,
            streaming,
            chat,
            container_injector,
            hook_token,
            show_thinking,
            show_usage,
            lifecycle_timers: RwLock::new(HashMap::new()),
        }
    }

    /// Arms a fresh lifecycle timer for `key`, cancelling any prior one.
    async fn arm_lifecycle_timer(&self, key: String, handle: JoinHandle<()>) {
        let mut timers = self.lifecycle_timers.write().await;
        if let Some(old) = timers.insert(key, handle) {
            old.abort();
        }
    }

    /// Cancels the lifecycle timer for `key`, if one is armed.
    async fn cancel_lifecycle_timer(&self, key: &str) {
        if let Some(handle) = self.lifecycle_timers.write().await.remove(key) {
            handle.abort();
        }
    }
}

impl HookTokenSource for HookState {
    fn hook_token(&self) -> Option<&str> {
        self.hook_token.as_deref()
    }
}

async fn health() -> &'static str {
    "ok"
}

/// Build the axum `Router` for the hook pipeline (spec §4.F endpoints).
pub fn build_router(state: Arc<HookState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/opencode-event", post(handlers::handle_event))
        .route("/runtime/ensure", post(runtime_routes::ensure))
        .route("/runtime/focus", post(runtime_routes::focus))
        .route("/runtime/input", post(runtime_routes::input))
        .route("/runtime/windows", get(runtime_routes::windows))
        .route("/runtime/stop", post(runtime_routes::stop))
        .route("/send-files", post(send_files::send_files))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer::<HookState>))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve the hook pipeline until `shutdown` is cancelled.
pub async fn run(state: Arc<HookState>, host: &str, port: u16, shutdown: CancellationToken) -> anyhow::Result<()> {
    let router = build_router(state);
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!(addr, "hook pipeline listening");
    let result =
        axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await;
    if let Err(e) = result {
        error!(error = %e, "hook pipeline server error");
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
