// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming Message Updater (spec §4.E): a per-instance entry tracking the
//! latest status text, debounced into edits of a single chat message.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::chat::{ChatClient, Platform};
use crate::data::InstanceKey;

/// Default debounce before a streaming edit is flushed (spec §4.E).
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(750);

fn instance_key(project: &str, agent_type: &str, instance_id: Option<&str>) -> String {
    InstanceKey::new(project, agent_type, instance_id.map(str::to_owned)).pending_key()
}

/// Length-clamp `text` for `platform` (spec §4.E): slack ≤ 3900 chars, else
/// ≤ 1900; when trimmed, keeps the trailing `limit - prefix.len()` chars and
/// prepends `"...(truncated)\n"`.
pub fn clamp_for_platform(platform: Platform, text: &str) -> String {
    let limit = platform.max_message_len();
    if text.chars().count() <= limit {
        return text.to_owned();
    }
    const PREFIX: &str = "...(truncated)\n";
    let keep = limit.saturating_sub(PREFIX.chars().count());
    let total = text.chars().count();
    let tail: String = text.chars().skip(total.saturating_sub(keep)).collect();
    format!("{PREFIX}{tail}")
}

struct EntryState {
    channel_id: String,
    message_id: String,
    current_text: String,
    history_lines: Vec<String>,
}

struct StreamingEntry {
    state: AsyncMutex<EntryState>,
    /// Held for the duration of an in-flight `updateMessage` call; also
    /// used by `finalize` to detect whether a scheduled flush has started
    /// executing yet (spec §4.E correctness property (i)).
    flush_lock: AsyncMutex<()>,
    debounce_handle: AsyncMutex<Option<JoinHandle<()>>>,
}

/// Debounced edit-in-place updater for one "status" message per active turn.
pub struct StreamingUpdater {
    chat: Arc<dyn ChatClient>,
    debounce: Duration,
    entries: RwLock<HashMap<String, Arc<StreamingEntry>>>,
}

impl StreamingUpdater {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self::with_debounce(chat, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(chat: Arc<dyn ChatClient>, debounce: Duration) -> Self {
        Self { chat, debounce, entries: RwLock::new(HashMap::new()) }
    }

    /// Replaces any existing entry for this instance (cancelling its
    /// debounce timer) with a fresh one targeting `message_id`.
    pub async fn start(
        &self,
        project: &str,
        agent_type: &str,
        instance_id: Option<&str>,
        channel_id: &str,
        message_id: &str,
    ) {
        let key = instance_key(project, agent_type, instance_id);
        let entry = Arc::new(StreamingEntry {
            state: AsyncMutex::new(EntryState {
                channel_id: channel_id.to_owned(),
                message_id: message_id.to_owned(),
                current_text: String::new(),
                history_lines: Vec::new(),
            }),
            flush_lock: AsyncMutex::new(()),
            debounce_handle: AsyncMutex::new(None),
        });
        let previous = self.entries.write().await.insert(key, entry);
        if let Some(previous) = previous {
            if let Some(handle) = previous.debounce_handle.lock().await.take() {
                handle.abort();
            }
        }
    }

    /// Replaces the current status text and schedules a debounced flush.
    pub async fn append(&self, project: &str, agent_type: &str, instance_id: Option<&str>, text: &str) {
        let key = instance_key(project, agent_type, instance_id);
        let Some(entry) = self.entries.read().await.get(&key).cloned() else { return };
        {
            let mut state = entry.state.lock().await;
            state.current_text = text.to_owned();
        }
        self.schedule_flush(entry).await;
    }

    /// Appends a history line and recomputes the status text as the join of
    /// all history lines, then schedules a debounced flush.
    pub async fn append_cumulative(&self, project: &str, agent_type: &str, instance_id: Option<&str>, text: &str) {
        let key = instance_key(project, agent_type, instance_id);
        let Some(entry) = self.entries.read().await.get(&key).cloned() else { return };
        {
            let mut state = entry.state.lock().await;
            state.history_lines.push(text.to_owned());
            state.current_text = state.history_lines.join("\n");
        }
        self.schedule_flush(entry).await;
    }

    async fn schedule_flush(&self, entry: Arc<StreamingEntry>) {
        let mut handle_slot = entry.debounce_handle.lock().await;
        if let Some(old) = handle_slot.take() {
            old.abort();
        }
        let chat = Arc::clone(&self.chat);
        let debounce = self.debounce;
        let entry_for_task = Arc::clone(&entry);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            do_flush(&chat, &entry_for_task).await;
        });
        *handle_slot = Some(handle);
    }

    /// Waits for any in-flight or about-to-run flush to settle (ensuring
    /// the Done message never races a stale edit), aborts `expectedMessageId`
    /// mismatches as a no-op, removes the entry, and posts a fresh
    /// completion message (never an edit).
    pub async fn finalize(
        &self,
        project: &str,
        agent_type: &str,
        instance_id: Option<&str>,
        header: Option<&str>,
        expected_message_id: Option<&str>,
    ) {
        let key = instance_key(project, agent_type, instance_id);
        let Some(entry) = self.entries.read().await.get(&key).cloned() else { return };

        if let Some(expected) = expected_message_id {
            if entry.state.lock().await.message_id != expected {
                return;
            }
        }

        let mut already_flushed = false;
        let handle_opt = entry.debounce_handle.lock().await.take();
        if let Some(handle) = handle_opt {
            if handle.is_finished() {
                already_flushed = true;
            } else if entry.flush_lock.try_lock().is_ok() {
                handle.abort();
            } else {
                // A flush is actively running `updateMessage`; wait for it
                // rather than cancelling it out from under the network call.
                let _ = handle.await;
                already_flushed = true;
            }
        }
        if !already_flushed {
            do_flush(&self.chat, &entry).await;
        }

        {
            let mut entries = self.entries.write().await;
            if let Some(current) = entries.get(&key) {
                if Arc::ptr_eq(current, &entry) {
                    entries.remove(&key);
                }
            }
        }

        let channel_id = entry.state.lock().await.channel_id.clone();
        let header_text = header.unwrap_or("✅ Done").to_owned();
        if let Err(e) = self.chat.send_to_channel(&channel_id, &header_text).await {
            warn!(error = %e, channel_id, "failed to post completion message");
        }
    }
}

/// Performs the actual `updateMessage` call for the current text, holding
/// `flush_lock` for its duration (property (i): at most one flush in
/// flight). No-ops if the entry has no target message or no content yet.
async fn do_flush(chat: &Arc<dyn ChatClient>, entry: &Arc<StreamingEntry>) {
    let _guard = entry.flush_lock.lock().await;
    let (channel_id, message_id, text) = {
        let state = entry.state.lock().await;
        (state.channel_id.clone(), state.message_id.clone(), state.current_text.clone())
    };
    if message_id.is_empty() || text.is_empty() {
        return;
    }
    let clamped = clamp_for_platform(chat.platform(), &text);
    if let Err(e) = chat.update_message(&channel_id, &message_id, &clamped).await {
        warn!(error = %e, channel_id, message_id, "failed to flush streaming update");
    }
}

#[cfg(test)]
#[path = "streaming_tests.rs"]
mod tests;
