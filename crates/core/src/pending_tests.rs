// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::chat::Platform;
use crate::test_support::{Call, FakeChatClient};

fn tracker(ttl: Duration) -> (Arc<FakeChatClient>, PendingTracker) {
    let chat = Arc::new(FakeChatClient::full_capabilities(Platform::Discord));
    let tracker = PendingTracker::with_ttl(chat.clone(), ttl);
    (chat, tracker)
}

#[tokio::test]
async fn mark_pending_reacts_with_hourglass() {
    let (chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.mark_pending("proj", "claude", "c1", "m1", None).await;
    assert_eq!(
        chat.calls(),
        vec![Call::AddReaction { channel: "c1".into(), message_id: "m1".into(), emoji: "⏳".into() }]
    );
    assert!(tracker.has_pending("proj", "claude", None).await);
}

#[tokio::test]
async fn mark_completed_replaces_reaction_and_caches_entry() {
    let (chat, tracker) = tracker(Duration::from_millis(200));
    tracker.mark_pending("proj", "claude", "c1", "m1", None).await;
    tracker.mark_completed("proj", "claude", None).await;

    assert_eq!(
        chat.calls(),
        vec![
            Call::AddReaction { channel: "c1".into(), message_id: "m1".into(), emoji: "⏳".into() },
            Call::ReplaceReaction {
                channel: "c1".into(),
                message_id: "m1".into(),
                from: "⏳".into(),
                to: "✅".into()
            },
        ]
    );
    // Entry moved out of `active`, but still readable via recentlyCompleted
    // (spec §8 "Pending lifecycle").
    assert!(tracker.get_pending("proj", "claude", None).await.is_some());
}

#[tokio::test]
async fn recently_completed_entry_expires_after_its_ttl() {
    let (_chat, tracker) = tracker(Duration::from_millis(30));
    tracker.mark_pending("proj", "claude", "c1", "m1", None).await;
    tracker.mark_completed("proj", "claude", None).await;
    assert!(tracker.get_pending("proj", "claude", None).await.is_some());

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(tracker.get_pending("proj", "claude", None).await.is_none());
}

#[tokio::test]
async fn mark_error_deletes_without_caching() {
    let (chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.mark_pending("proj", "claude", "c1", "m1", None).await;
    tracker.mark_error("proj", "claude", None).await;

    assert!(chat.calls().contains(&Call::ReplaceReaction {
        channel: "c1".into(),
        message_id: "m1".into(),
        from: "⏳".into(),
        to: "❌".into()
    }));
    assert!(tracker.get_pending("proj", "claude", None).await.is_none());
}

#[tokio::test]
async fn ensure_pending_does_not_overwrite_an_existing_active_entry() {
    let (chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.mark_pending("proj", "claude", "c1", "m1", None).await;
    tracker.ensure_pending("proj", "claude", "c1", None).await;

    // ensurePending must not react again or replace the message id.
    assert_eq!(chat.calls().len(), 1);
    let entry = tracker.get_pending("proj", "claude", None).await.expect("entry present");
    assert_eq!(entry.message_id, "m1");
}

#[tokio::test]
async fn ensure_start_message_posts_preview_once() {
    let (chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.ensure_pending("proj", "claude", "c1", None).await;
    tracker.ensure_start_message("proj", "claude", None, Some("do the thing")).await;
    tracker.ensure_start_message("proj", "claude", None, Some("a different prompt")).await;

    let sends: Vec<_> =
        chat.calls().into_iter().filter(|c| matches!(c, Call::SendToChannelWithId { .. })).collect();
    assert_eq!(sends.len(), 1, "start message must be posted at most once per turn");
    match &sends[0] {
        Call::SendToChannelWithId { text, .. } => assert!(text.contains("do the thing")),
        _ => unreachable!(),
    }
}

#[tokio::test]
async fn ensure_start_message_suppresses_when_no_preview_is_known() {
    let (chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.ensure_pending("proj", "claude", "c1", None).await;
    tracker.ensure_start_message("proj", "claude", None, None).await;

    assert!(chat.calls().iter().all(|c| !matches!(c, Call::SendToChannelWithId { .. })));
}

#[tokio::test]
async fn is_hook_active_reflects_set_hook_active() {
    let (_chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.ensure_pending("proj", "claude", "c1", None).await;
    assert!(!tracker.is_hook_active("proj", "claude", None).await);
    tracker.set_hook_active("proj", "claude", None).await;
    assert!(tracker.is_hook_active("proj", "claude", None).await);
}

#[tokio::test]
async fn instance_id_distinguishes_keys_with_the_same_agent_type() {
    let (_chat, tracker) = tracker(DEFAULT_RECENTLY_COMPLETED_TTL);
    tracker.mark_pending("proj", "claude", "c1", "m1", Some("inst-a")).await;
    assert!(tracker.has_pending("proj", "claude", Some("inst-a")).await);
    assert!(!tracker.has_pending("proj", "claude", Some("inst-b")).await);
}
