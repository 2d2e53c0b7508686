// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /send-files` (spec §4.F): post a channel message with local file
//! attachments, used by hook scripts to surface generated artifacts.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::BridgeError;

use super::HookState;

#[derive(Debug, Deserialize)]
pub struct SendFilesRequest {
    pub channel_id: String,
    #[serde(default)]
    pub text: String,
    pub paths: Vec<String>,
}

/// `POST /send-files` — post `text` with `paths` attached as local files.
pub async fn send_files(
    State(state): State<Arc<HookState>>,
    Json(req): Json<SendFilesRequest>,
) -> Result<impl IntoResponse, BridgeError> {
    if req.paths.is_empty() {
        return Err(BridgeError::invalid_payload("paths must not be empty"));
    }
    state.chat.send_to_channel_with_files(&req.channel_id, &req.text, &req.paths).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[cfg(test)]
#[path = "send_files_tests.rs"]
mod tests;
