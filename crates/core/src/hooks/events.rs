// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event payload shape and `(project, agent, instance) -> channel`
//! resolution for `POST /opencode-event` (spec §4.F "Event normalization").

use serde::Deserialize;

use crate::data::{InstanceRecord, ProjectRecord};
use crate::error::BridgeError;
use crate::project_store::ProjectStore;

/// Raw payload posted by an agent's hook script.
#[derive(Debug, Clone, Deserialize)]
pub struct EventPayload {
    pub project_name: String,
    pub agent_type: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub thinking: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Option<String>,
    #[serde(default)]
    pub task_id: Option<String>,
    #[serde(default)]
    pub task_subject: Option<String>,
    #[serde(default)]
    pub teammate_name: Option<String>,
    #[serde(default)]
    pub team_name: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub submitted_prompt: Option<String>,
}

/// The project/instance/channel a payload resolves to (spec §4.F steps 1-4).
#[derive(Debug, Clone)]
pub struct ResolvedEvent {
    pub project: ProjectRecord,
    pub instance_id: String,
    pub instance: InstanceRecord,
    pub channel_id: String,
}

/// Resolve a payload's project and instance, deriving the target channel.
/// Mirrors spec §4.F steps 1-3: project lookup (404), instance resolution
/// (direct by id, else primary for `agentType`), channel derivation (404 if
/// the instance has none).
pub async fn resolve(projects: &dyn ProjectStore, payload: &EventPayload) -> Result<ResolvedEvent, BridgeError> {
    let project = projects
        .get_project(&payload.project_name)
        .await
        .ok_or_else(|| BridgeError::not_found(format!("unknown project: {}", payload.project_name)))?;

    let (instance_id, instance) = project
        .resolve_instance(&payload.agent_type, payload.instance_id.as_deref())
        .map(|(id, rec)| (id.to_owned(), rec.clone()))
        .ok_or_else(|| {
            BridgeError::not_found(format!("no instance for agent type: {}", payload.agent_type))
        })?;

    let channel_id = instance.channel_id.clone();
    if channel_id.is_empty() {
        return Err(BridgeError::not_found("instance has no channel"));
    }

    Ok(ResolvedEvent { project, instance_id, instance, channel_id })
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
