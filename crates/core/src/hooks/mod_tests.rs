// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::chat::Platform;
use crate::project_store::InMemoryProjectStore;
use crate::pty::PtyRuntime;
use crate::test_support::FakeChatClient;

fn state() -> Arc<HookState> {
    Arc::new(HookState::new(
        Arc::new(InMemoryProjectStore::new()),
        Arc::new(PtyRuntime::new(80, 24, 200)),
        Arc::new(PendingTracker::new(Arc::new(FakeChatClient::full_capabilities(Platform::Discord)))),
        Arc::new(StreamingUpdater::new(Arc::new(FakeChatClient::full_capabilities(Platform::Discord)))),
        Arc::new(FakeChatClient::full_capabilities(Platform::Discord)),
        None,
        Some("secret".to_owned()),
        true,
        false,
    ))
}

#[tokio::test]
async fn health_handler_reports_ok() {
    assert_eq!(health().await, "ok");
}

#[tokio::test]
async fn hook_token_source_exposes_configured_token() {
    let state = state();
    assert_eq!(state.hook_token(), Some("secret"));
}

#[tokio::test]
async fn arming_a_second_timer_for_the_same_key_aborts_the_first() {
    let state = state();
    let first_ran = Arc::new(tokio::sync::Notify::new());
    let first_ran_task = first_ran.clone();
    let first = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        first_ran_task.notify_one();
    });
    state.arm_lifecycle_timer("proj:claude".to_owned(), first).await;

    let second = tokio::spawn(async { tokio::time::sleep(Duration::from_secs(5)).await });
    state.arm_lifecycle_timer("proj:claude".to_owned(), second).await;

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(
        tokio::time::timeout(Duration::from_millis(10), first_ran.notified()).await.is_err(),
        "arming a new timer must abort the previous one before it fires"
    );
}

#[tokio::test]
async fn cancelling_an_unarmed_timer_is_a_no_op() {
    let state = state();
    state.cancel_lifecycle_timer("nothing-armed").await;
}
