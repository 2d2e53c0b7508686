// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `POST /opencode-event` dispatch (spec §4.F "Event types and handlers").

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use tracing::warn;

use crate::chat::split_for_platform;
use crate::data::InstanceKey;
use crate::error::BridgeError;

use super::events::{resolve, EventPayload};
use super::HookState;

/// How long after `session.start` (absent a prompt-submit-derived start
/// message) the turn is considered to have produced no activity (spec §4.F
/// "session.start").
const LIFECYCLE_TIMEOUT: Duration = Duration::from_secs(5);

fn pending_key(project: &str, agent_type: &str, instance_id: Option<&str>) -> String {
    InstanceKey::new(project, agent_type, instance_id.map(str::to_owned)).pending_key()
}

/// `POST /opencode-event` — normalize and dispatch a structured lifecycle
/// event from an agent's hook script (spec §4.F).
pub async fn handle_event(
    State(state): State<Arc<HookState>>,
    Json(payload): Json<EventPayload>,
) -> Result<impl IntoResponse, BridgeError> {
    let resolved = resolve(state.projects.as_ref(), &payload).await?;
    let agent_type = &payload.agent_type;
    let project_name = &payload.project_name;
    let iid = payload.instance_id.as_deref();

    state.pending.set_hook_active(project_name, agent_type, iid).await;

    match payload.event_type.as_str() {
        "prompt.submit" => prompt_submit(&state, &payload, &resolved.channel_id).await,
        "session.start" => session_start(&state, &payload).await,
        "thinking.start" => {
            state.cancel_lifecycle_timer(&pending_key(project_name, agent_type, iid)).await;
        }
        "tool.activity" => {
            state.cancel_lifecycle_timer(&pending_key(project_name, agent_type, iid)).await;
            tool_activity(&state, &payload).await;
        }
        "session.idle" => session_idle(&state, &payload, &resolved.channel_id).await,
        "session.end" => {
            let reason = payload.reason.clone().unwrap_or_default();
            notify(&state, &resolved.channel_id, &format!("Session ended: {reason}")).await;
        }
        "permission.request" => {
            let tool_name = payload.tool_name.clone().unwrap_or_default();
            let text = match &payload.tool_input {
                Some(input) => format!("🔐 Permission needed: `{tool_name}` `{input}`"),
                None => format!("🔐 Permission needed: `{tool_name}`"),
            };
            notify(&state, &resolved.channel_id, &text).await;
        }
        "task.completed" => {
            let teammate = payload
                .teammate_name
                .as_deref()
                .map(|n| format!(" [{n}]"))
                .unwrap_or_default();
            let subject = payload.task_subject.clone().unwrap_or_default();
            notify(&state, &resolved.channel_id, &format!("✅ Task completed{teammate}: {subject}")).await;
        }
        "tool.failure" => {
            let tool_name = payload.tool_name.clone().unwrap_or_default();
            let error = payload.error.clone().unwrap_or_default();
            notify(&state, &resolved.channel_id, &format!("⚠️ *{tool_name} failed*: {error}")).await;
        }
        "teammate.idle" => {
            let teammate = payload.teammate_name.clone().unwrap_or_default();
            let team = payload.team_name.as_deref().map(|t| format!(" ({t})")).unwrap_or_default();
            notify(&state, &resolved.channel_id, &format!("💤 *[{teammate}]* idle{team}")).await;
        }
        other => {
            warn!(event_type = other, "unrecognized hook event type, ignoring");
        }
    }

    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn notify(state: &HookState, channel_id: &str, text: &str) {
    if let Err(e) = state.chat.send_to_channel(channel_id, text).await {
        warn!(error = %e, channel_id, "failed to notify channel from hook event");
    }
}

async fn prompt_submit(state: &Arc<HookState>, payload: &EventPayload, channel_id: &str) {
    let (project, agent, iid) =
        (payload.project_name.as_str(), payload.agent_type.as_str(), payload.instance_id.as_deref());

    state.pending.ensure_pending(project, agent, channel_id, iid).await;
    let prompt_text = payload.text.as_deref().or(payload.submitted_prompt.as_deref());
    state.pending.ensure_start_message(project, agent, iid, prompt_text).await;

    if let Some(entry) = state.pending.get_pending(project, agent, iid).await {
        if let Some(message_id) = &entry.start_message_id {
            state.streaming.start(project, agent, iid, channel_id, message_id).await;
        }
    }
}

async fn session_start(state: &Arc<HookState>, payload: &EventPayload) {
    if payload.source.as_deref() == Some("startup") {
        return;
    }

    let (project, agent, iid) =
        (payload.project_name.clone(), payload.agent_type.clone(), payload.instance_id.clone());
    let key = pending_key(&project, &agent, iid.as_deref());
    let pending = Arc::clone(&state.pending);
    let key_for_task = key.clone();

    let handle = tokio::spawn(async move {
        tokio::time::sleep(LIFECYCLE_TIMEOUT).await;
        let iid = iid.as_deref();
        if let Some(entry) = pending.get_pending(&project, &agent, iid).await {
            if entry.start_message_id.is_none() {
                pending.mark_completed(&project, &agent, iid).await;
            }
        }
        let _ = &key_for_task;
    });
    state.arm_lifecycle_timer(key, handle).await;
}

async fn tool_activity(state: &Arc<HookState>, payload: &EventPayload) {
    let (project, agent, iid) =
        (payload.project_name.as_str(), payload.agent_type.as_str(), payload.instance_id.as_deref());
    let tool_name = payload.tool_name.as_deref().unwrap_or("tool");
    let line = match payload.tool_input.as_deref() {
        Some(input) if !input.is_empty() => format!("🔧 {tool_name}({input})"),
        _ => format!("🔧 {tool_name}"),
    };
    state.streaming.append_cumulative(project, agent, iid, &line).await;
}

async fn session_idle(state: &Arc<HookState>, payload: &EventPayload, channel_id: &str) {
    let (project, agent, iid) =
        (payload.project_name.as_str(), payload.agent_type.as_str(), payload.instance_id.as_deref());
    let platform = state.chat.platform();

    let entry = state.pending.get_pending(project, agent, iid).await;
    let start_message_id = entry.as_ref().and_then(|e| e.start_message_id.clone());

    if let Some(text) = payload.message.as_deref().filter(|t| !t.is_empty()) {
        for chunk in split_for_platform(platform, text) {
            notify(state, channel_id, &chunk).await;
        }
    }

    if state.show_usage {
        if let Some(model) = payload.model.as_deref().filter(|m| !m.is_empty()) {
            notify(state, channel_id, &format!("_model: {model}_")).await;
        }
    }

    if state.show_thinking {
        if let Some(thinking) = payload.thinking.as_deref().filter(|t| !t.is_empty()) {
            let fenced = format!("```\n{thinking}\n```");
            let use_thread = state.chat.capabilities().reply_in_thread && start_message_id.is_some();
            for chunk in split_for_platform(platform, &fenced) {
                if use_thread {
                    if let Some(anchor) = &start_message_id {
                        if let Err(e) = state.chat.reply_in_thread(channel_id, anchor, &chunk).await {
                            warn!(error = %e, channel_id, "failed to post threaded thinking reply");
                        }
                        continue;
                    }
                }
                notify(state, channel_id, &chunk).await;
            }
        }
    }

    state.streaming.finalize(project, agent, iid, None, start_message_id.as_deref()).await;
    state.pending.mark_completed(project, agent, iid).await;
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
