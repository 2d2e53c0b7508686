// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[tokio::test]
async fn start_agent_in_window_is_idempotent_while_running() -> anyhow::Result<()> {
    let runtime = PtyRuntime::new(80, 24, 200);
    runtime.start_agent_in_window("proj", "claude", "sleep 5", None).await?;
    assert!(runtime.window_exists("proj", "claude").await);

    // Calling again while the window is still running must be a no-op, not
    // a second spawn (spec §4.B `startAgentInWindow`).
    runtime.start_agent_in_window("proj", "claude", "sleep 5", None).await?;
    let windows = runtime.list_windows(Some("proj")).await;
    assert_eq!(windows.len(), 1);

    runtime.stop_window("proj", "claude").await;
    Ok(())
}

#[tokio::test]
async fn get_or_create_session_is_idempotent() {
    let runtime = PtyRuntime::new(80, 24, 200);
    let a = runtime.get_or_create_session("proj").await;
    let b = runtime.get_or_create_session("proj").await;
    assert_eq!(a, b);
}

#[tokio::test]
async fn window_buffer_reflects_output() -> anyhow::Result<()> {
    let runtime = PtyRuntime::new(80, 24, 200);
    runtime.start_agent_in_window("proj", "echoer", "printf 'hello-window'", None).await?;

    let mut buffer = String::new();
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        buffer = runtime.get_window_buffer("proj", "echoer").await.unwrap_or_default();
        if buffer.contains("hello-window") {
            break;
        }
    }
    assert!(buffer.contains("hello-window"), "buffer was: {buffer:?}");
    Ok(())
}

#[tokio::test]
async fn stop_window_on_missing_window_returns_true() {
    let runtime = PtyRuntime::new(80, 24, 200);
    assert!(runtime.stop_window("proj", "nope").await);
}

#[tokio::test]
async fn list_windows_filters_by_session() -> anyhow::Result<()> {
    let runtime = PtyRuntime::new(80, 24, 200);
    runtime.start_agent_in_window("proj-a", "w", "sleep 5", None).await?;
    runtime.start_agent_in_window("proj-b", "w", "sleep 5", None).await?;

    assert_eq!(runtime.list_windows(Some("proj-a")).await.len(), 1);
    assert_eq!(runtime.list_windows(None).await.len(), 2);

    runtime.stop_window("proj-a", "w").await;
    runtime.stop_window("proj-b", "w").await;
    Ok(())
}
