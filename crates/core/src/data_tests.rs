// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn window_id_parses_valid_form() {
    let id: WindowId = "proj-main:claude-1".parse().unwrap();
    assert_eq!(id.session(), "proj-main");
    assert_eq!(id.window(), "claude-1");
    assert_eq!(id.to_string(), "proj-main:claude-1");
}

#[yare::parameterized(
    no_colon = { "nocolon" },
    two_colons = { "a:b:c" },
    empty_session = { ":window" },
    empty_window = { "session:" },
    empty_string = { "" },
)]
fn window_id_rejects_malformed(input: &str) {
    assert!(input.parse::<WindowId>().is_err());
}

#[test]
fn instance_key_defaults_to_agent_type() {
    let key = InstanceKey::new("proj", "claude", None);
    assert_eq!(key.instance_key(), "claude");
    assert_eq!(key.pending_key(), "proj:claude");
}

#[test]
fn instance_key_prefers_explicit_instance_id() {
    let key = InstanceKey::new("proj", "claude", Some("claude-2".to_owned()));
    assert_eq!(key.instance_key(), "claude-2");
    assert_eq!(key.pending_key(), "proj:claude-2");
}

fn sample_project() -> ProjectRecord {
    let mut instances = std::collections::BTreeMap::new();
    instances.insert(
        "claude".to_owned(),
        InstanceRecord {
            agent_type: "claude".to_owned(),
            tmux_window: "claude".to_owned(),
            channel_id: "c1".to_owned(),
            container: ContainerMode::Direct,
            runtime_type: RuntimeType::Pty,
        },
    );
    instances.insert(
        "claude-2".to_owned(),
        InstanceRecord {
            agent_type: "claude".to_owned(),
            tmux_window: "claude-2".to_owned(),
            channel_id: "c2".to_owned(),
            container: ContainerMode::Direct,
            runtime_type: RuntimeType::Pty,
        },
    );
    ProjectRecord {
        project_name: "proj".to_owned(),
        project_path: "/tmp/proj".to_owned(),
        tmux_session: "proj".to_owned(),
        instances,
    }
}

#[test]
fn resolve_instance_by_explicit_id() {
    let project = sample_project();
    let (id, rec) = project.resolve_instance("claude", Some("claude-2")).unwrap();
    assert_eq!(id, "claude-2");
    assert_eq!(rec.channel_id, "c2");
}

#[test]
fn resolve_instance_falls_back_to_primary_for_agent_type() {
    let project = sample_project();
    let (id, _rec) = project.resolve_instance("claude", None).unwrap();
    assert_eq!(id, "claude");
}

#[test]
fn resolve_instance_missing_returns_none() {
    let project = sample_project();
    assert!(project.resolve_instance("codex", None).is_none());
    assert!(project.resolve_instance("claude", Some("nope")).is_none());
}

#[yare::parameterized(
    within_bounds = { 120, 40, 120, 40 },
    cols_too_small = { 5, 40, MIN_COLS, 40 },
    cols_too_large = { 1000, 40, MAX_COLS, 40 },
    rows_too_small = { 120, 2, 120, MIN_ROWS },
    rows_too_large = { 120, 500, 120, MAX_ROWS },
)]
fn clamp_screen_size_bounds_to_spec_range(cols: u16, rows: u16, want_cols: u16, want_rows: u16) {
    assert_eq!(clamp_screen_size(cols, rows), (want_cols, want_rows));
}
