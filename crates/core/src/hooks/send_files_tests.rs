// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use super::*;
use crate::chat::Platform;
use crate::pending::PendingTracker;
use crate::project_store::InMemoryProjectStore;
use crate::pty::PtyRuntime;
use crate::streaming::StreamingUpdater;
use crate::test_support::{Call, FakeChatClient};

fn state(chat: Arc<FakeChatClient>) -> Arc<HookState> {
    Arc::new(HookState::new(
        Arc::new(InMemoryProjectStore::new()),
        Arc::new(PtyRuntime::new(80, 24, 200)),
        Arc::new(PendingTracker::new(chat.clone())),
        Arc::new(StreamingUpdater::new(chat.clone())),
        chat,
        None,
        None,
        false,
        false,
    ))
}

#[tokio::test]
async fn send_files_forwards_channel_text_and_paths() {
    let chat = Arc::new(FakeChatClient::full_capabilities(Platform::Discord));
    let state = state(chat.clone());
    let req = SendFilesRequest {
        channel_id: "chan-1".to_owned(),
        text: "here's the output".to_owned(),
        paths: vec!["/tmp/a.txt".to_owned(), "/tmp/b.png".to_owned()],
    };

    send_files(State(state), Json(req)).await.expect("send succeeds");

    assert_eq!(
        chat.calls(),
        vec![Call::SendToChannelWithFiles {
            channel: "chan-1".into(),
            text: "here's the output".into(),
            paths: vec!["/tmp/a.txt".into(), "/tmp/b.png".into()],
        }]
    );
}

#[tokio::test]
async fn send_files_rejects_empty_paths() {
    let chat = Arc::new(FakeChatClient::full_capabilities(Platform::Discord));
    let state = state(chat.clone());
    let req = SendFilesRequest { channel_id: "chan-1".to_owned(), text: String::new(), paths: vec![] };

    match send_files(State(state), Json(req)).await {
        Ok(_) => panic!("empty paths must be rejected"),
        Err(e) => assert_eq!(e.kind, crate::error::ErrorKind::InvalidPayload),
    }
    assert!(chat.calls().is_empty());
}
