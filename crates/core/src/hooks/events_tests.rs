// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;

use super::*;
use crate::data::{ContainerMode, InstanceRecord, ProjectRecord, RuntimeType};
use crate::project_store::{InMemoryProjectStore, ProjectStore};

fn payload(project_name: &str, agent_type: &str, instance_id: Option<&str>, event_type: &str) -> EventPayload {
    EventPayload {
        project_name: project_name.to_owned(),
        agent_type: agent_type.to_owned(),
        instance_id: instance_id.map(str::to_owned),
        event_type: event_type.to_owned(),
        text: None,
        message: None,
        thinking: None,
        model: None,
        source: None,
        reason: None,
        tool_name: None,
        tool_input: None,
        task_id: None,
        task_subject: None,
        teammate_name: None,
        team_name: None,
        error: None,
        submitted_prompt: None,
    }
}

async fn store_with_project() -> InMemoryProjectStore {
    let store = InMemoryProjectStore::new();
    let mut instances = BTreeMap::new();
    instances.insert(
        "claude".to_owned(),
        InstanceRecord {
            agent_type: "claude".to_owned(),
            tmux_window: "claude".to_owned(),
            channel_id: "chan-1".to_owned(),
            container: ContainerMode::Direct,
            runtime_type: RuntimeType::Pty,
        },
    );
    store
        .set_project(ProjectRecord {
            project_name: "proj".to_owned(),
            project_path: "/tmp/proj".to_owned(),
            tmux_session: "proj".to_owned(),
            instances,
        })
        .await;
    store
}

#[tokio::test]
async fn resolve_finds_project_and_derives_channel() {
    let store = store_with_project().await;
    let payload = payload("proj", "claude", None, "prompt.submit");

    let resolved = resolve(&store, &payload).await.expect("resolves");
    assert_eq!(resolved.channel_id, "chan-1");
    assert_eq!(resolved.instance_id, "claude");
}

#[tokio::test]
async fn resolve_rejects_unknown_project_with_not_found() {
    let store = InMemoryProjectStore::new();
    let payload = payload("nope", "claude", None, "prompt.submit");

    let err = resolve(&store, &payload).await.expect_err("unknown project must fail");
    assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
}

#[tokio::test]
async fn resolve_rejects_unknown_instance_with_not_found() {
    let store = store_with_project().await;
    let payload = payload("proj", "goose", None, "prompt.submit");

    let err = resolve(&store, &payload).await.expect_err("unknown instance must fail");
    assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
}

#[tokio::test]
async fn resolve_rejects_instance_with_no_channel() {
    let store = InMemoryProjectStore::new();
    let mut instances = BTreeMap::new();
    instances.insert(
        "claude".to_owned(),
        InstanceRecord {
            agent_type: "claude".to_owned(),
            tmux_window: "claude".to_owned(),
            channel_id: String::new(),
            container: ContainerMode::Direct,
            runtime_type: RuntimeType::Pty,
        },
    );
    store
        .set_project(ProjectRecord {
            project_name: "proj".to_owned(),
            project_path: "/tmp/proj".to_owned(),
            tmux_session: "proj".to_owned(),
            instances,
        })
        .await;

    let payload = payload("proj", "claude", None, "prompt.submit");
    let err = resolve(&store, &payload).await.expect_err("no channel must fail");
    assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
}

#[tokio::test]
async fn resolve_prefers_explicit_instance_id_over_agent_type_scan() {
    let store = InMemoryProjectStore::new();
    let mut instances = BTreeMap::new();
    instances.insert(
        "inst-a".to_owned(),
        InstanceRecord {
            agent_type: "claude".to_owned(),
            tmux_window: "w-a".to_owned(),
            channel_id: "chan-a".to_owned(),
            container: ContainerMode::Direct,
            runtime_type: RuntimeType::Pty,
        },
    );
    instances.insert(
        "inst-b".to_owned(),
        InstanceRecord {
            agent_type: "claude".to_owned(),
            tmux_window: "w-b".to_owned(),
            channel_id: "chan-b".to_owned(),
            container: ContainerMode::Direct,
            runtime_type: RuntimeType::Pty,
        },
    );
    store
        .set_project(ProjectRecord {
            project_name: "proj".to_owned(),
            project_path: "/tmp/proj".to_owned(),
            tmux_session: "proj".to_owned(),
            instances,
        })
        .await;

    let payload = payload("proj", "claude", Some("inst-b"), "prompt.submit");
    let resolved = resolve(&store, &payload).await.expect("resolves");
    assert_eq!(resolved.channel_id, "chan-b");
    assert_eq!(resolved.instance_id, "inst-b");
}
