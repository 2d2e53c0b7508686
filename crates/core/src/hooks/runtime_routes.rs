// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/runtime/*` routes (spec §4.F): direct PTY Runtime control for the hook
//! script and TUI, alongside the Stream Server's own `focus`/`input` message
//! types (spec §4.C), which these HTTP routes mirror for callers that can't
//! hold a stream-socket connection open.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::BridgeError;
use crate::pty::WindowStatus;

use super::HookState;

#[derive(Debug, Deserialize)]
pub struct EnsureRequest {
    pub session: String,
    pub window: String,
    pub command_line: String,
    #[serde(default)]
    pub container_id: Option<String>,
}

/// `POST /runtime/ensure` — ensure a window exists, spawning it if absent.
pub async fn ensure(
    State(state): State<Arc<HookState>>,
    Json(req): Json<EnsureRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    state
        .runtime
        .start_agent_in_window(&req.session, &req.window, &req.command_line, req.container_id.as_deref())
        .await
        .map_err(|e| BridgeError::new(crate::error::ErrorKind::RuntimeError, e.to_string()))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct WindowRequest {
    pub session: String,
    pub window: String,
}

/// `POST /runtime/focus` — acknowledges a TUI focus change. The PTY Runtime
/// has no focus-dependent state; this only validates the window exists so
/// callers get a `404` instead of a silent no-op.
pub async fn focus(
    State(state): State<Arc<HookState>>,
    Json(req): Json<WindowRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    if !state.runtime.window_exists(&req.session, &req.window).await {
        return Err(BridgeError::not_found(format!("window not found: {}:{}", req.session, req.window)));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct InputRequest {
    pub session: String,
    pub window: String,
    pub bytes_base64: String,
}

/// `POST /runtime/input` — write raw bytes straight to the window's PTY.
pub async fn input(
    State(state): State<Arc<HookState>>,
    Json(req): Json<InputRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(req.bytes_base64.as_bytes())
        .map_err(|e| BridgeError::invalid_payload(format!("invalid bytesBase64: {e}")))?;
    state
        .runtime
        .type_keys_to_window_raw(&req.session, &req.window, &bytes)
        .await
        .map_err(|e| BridgeError::new(crate::error::ErrorKind::RuntimeError, e.to_string()))?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct WindowsQuery {
    #[serde(default)]
    pub session: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct WindowInfoResponse {
    pub session_name: String,
    pub window_name: String,
    pub status: &'static str,
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<i32>,
}

fn status_str(status: WindowStatus) -> &'static str {
    match status {
        WindowStatus::Starting => "starting",
        WindowStatus::Running => "running",
        WindowStatus::Exited => "exited",
    }
}

#[derive(Debug, Serialize)]
pub struct WindowsResponse {
    pub windows: Vec<WindowInfoResponse>,
}

/// `GET /runtime/windows` — list known windows, optionally filtered to one
/// session.
pub async fn windows(State(state): State<Arc<HookState>>, Query(query): Query<WindowsQuery>) -> Json<WindowsResponse> {
    let infos = state.runtime.list_windows(query.session.as_deref()).await;
    let windows = infos
        .into_iter()
        .map(|w| WindowInfoResponse {
            session_name: w.session_name,
            window_name: w.window_name,
            status: status_str(w.status),
            pid: w.pid,
            exit_code: w.exit_code,
            signal: w.signal,
        })
        .collect();
    Json(WindowsResponse { windows })
}

/// `POST /runtime/stop` — SIGTERM (then SIGKILL after 1.5s) the window.
pub async fn stop(State(state): State<Arc<HookState>>, Json(req): Json<WindowRequest>) -> Json<serde_json::Value> {
    let stopped = state.runtime.stop_window(&req.session, &req.window).await;
    Json(serde_json::json!({ "ok": stopped }))
}

#[cfg(test)]
#[path = "runtime_routes_tests.rs"]
mod tests;
