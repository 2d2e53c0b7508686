// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending Message Tracker (spec §4.D): correlates chat messages with
//! agent turns, owns the ⏳/✅/❌ reaction lifecycle, and tracks the
//! start-of-turn anchor message used for threaded replies.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::warn;

use crate::chat::ChatClient;
use crate::data::InstanceKey;

/// Default eviction window for `recentlyCompleted` entries (spec §3).
pub const DEFAULT_RECENTLY_COMPLETED_TTL: Duration = Duration::from_secs(30);

/// One turn's bookkeeping (spec §3 "Pending entry").
#[derive(Debug, Clone, Default)]
pub struct Entry {
    pub channel_id: String,
    pub message_id: String,
    pub start_message_id: Option<String>,
    pub hook_active: bool,
    pub prompt_preview: Option<String>,
    pub completed_at: Option<Instant>,
}

fn pending_key(project: &str, agent_type: &str, instance_id: Option<&str>) -> String {
    InstanceKey::new(project, agent_type, instance_id.map(str::to_owned)).pending_key()
}

/// Tracks at most one active turn per instance key, plus a short-lived
/// cache of just-completed turns for late stop-hooks (spec §3, §9: "an
/// explicit expiry timer, not a weak-ref map, to keep behavior
/// deterministic").
pub struct PendingTracker {
    chat: Arc<dyn ChatClient>,
    recently_completed_ttl: Duration,
    active: RwLock<HashMap<String, Entry>>,
    recently_completed: RwLock<HashMap<String, Entry>>,
}

impl PendingTracker {
    pub fn new(chat: Arc<dyn ChatClient>) -> Self {
        Self::with_ttl(chat, DEFAULT_RECENTLY_COMPLETED_TTL)
    }

    pub fn with_ttl(chat: Arc<dyn ChatClient>, recently_completed_ttl: Duration) -> Self {
        Self {
            chat,
            recently_completed_ttl,
            active: RwLock::new(HashMap::new()),
            recently_completed: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces any existing active entry with a fresh one, evicts a stale
    /// `recentlyCompleted` entry for the same key, and reacts ⏳ on
    /// `message_id`.
    pub async fn mark_pending(
        &self,
        project: &str,
        agent_type: &str,
        channel_id: &str,
        message_id: &str,
        instance_id: Option<&str>,
    ) {
        let key = pending_key(project, agent_type, instance_id);
        self.recently_completed.write().await.remove(&key);
        self.active.write().await.insert(
            key,
            Entry { channel_id: channel_id.to_owned(), message_id: message_id.to_owned(), ..Default::default() },
        );
        if let Err(e) = self.chat.add_reaction_to_message(channel_id, message_id, "⏳").await {
            warn!(error = %e, channel_id, message_id, "failed to add pending reaction");
        }
    }

    /// Creates an entry with an empty `messageId` if none is active yet.
    /// No reaction is sent (there is no originating message to react to).
    pub async fn ensure_pending(&self, project: &str, agent_type: &str, channel_id: &str, instance_id: Option<&str>) {
        let key = pending_key(project, agent_type, instance_id);
        let mut active = self.active.write().await;
        active.entry(key).or_insert_with(|| Entry { channel_id: channel_id.to_owned(), ..Default::default() });
    }

    /// Posts the start-of-turn anchor message if one hasn't been posted yet
    /// and a non-empty preview is known (from `prompt_text` or a prior
    /// `setPromptPreview`). Emits nothing when no preview is known — per
    /// spec §9's resolution for tmux-style agents, this suppresses the
    /// generic prompt marker rather than posting a placeholder.
    pub async fn ensure_start_message(
        &self,
        project: &str,
        agent_type: &str,
        instance_id: Option<&str>,
        prompt_text: Option<&str>,
    ) {
        let key = pending_key(project, agent_type, instance_id);
        let (channel_id, preview) = {
            let mut active = self.active.write().await;
            let Some(entry) = active.get_mut(&key) else { return };
            if entry.start_message_id.is_some() {
                return;
            }
            if let Some(text) = prompt_text {
                entry.prompt_preview = Some(text.to_owned());
            }
            let Some(preview) = entry.prompt_preview.clone().filter(|p| !p.is_empty()) else { return };
            (entry.channel_id.clone(), preview)
        };

        match self.chat.send_to_channel_with_id(&channel_id, &format!("📝 Prompt: {preview}")).await {
            Ok(id) => {
                if let Some(entry) = self.active.write().await.get_mut(&key) {
                    entry.start_message_id = Some(id);
                }
            }
            Err(e) => warn!(error = %e, channel_id, "failed to post start-of-turn message"),
        }
    }

    /// Stores a prompt preview for a later `ensureStartMessage`. No-op if
    /// no active entry exists for this key yet.
    pub async fn set_prompt_preview(
        &self,
        project: &str,
        agent_type: &str,
        preview: &str,
        instance_id: Option<&str>,
    ) {
        let key = pending_key(project, agent_type, instance_id);
        if let Some(entry) = self.active.write().await.get_mut(&key) {
            entry.prompt_preview = Some(preview.to_owned());
        }
    }

    pub async fn set_hook_active(&self, project: &str, agent_type: &str, instance_id: Option<&str>) {
        let key = pending_key(project, agent_type, instance_id);
        if let Some(entry) = self.active.write().await.get_mut(&key) {
            entry.hook_active = true;
        }
    }

    pub async fn is_hook_active(&self, project: &str, agent_type: &str, instance_id: Option<&str>) -> bool {
        let key = pending_key(project, agent_type, instance_id);
        self.active.read().await.get(&key).is_some_and(|e| e.hook_active)
    }

    pub async fn has_pending(&self, project: &str, agent_type: &str, instance_id: Option<&str>) -> bool {
        self.get_pending(project, agent_type, instance_id).await.is_some()
    }

    /// Returns the active entry, or the recently-completed entry if it
    /// hasn't yet expired (spec §3, §8 "Pending lifecycle").
    pub async fn get_pending(&self, project: &str, agent_type: &str, instance_id: Option<&str>) -> Option<Entry> {
        let key = pending_key(project, agent_type, instance_id);
        if let Some(entry) = self.active.read().await.get(&key) {
            return Some(entry.clone());
        }
        self.purge_expired().await;
        self.recently_completed.read().await.get(&key).cloned()
    }

    /// Replaces ⏳ with ✅ (if `messageId` is non-empty) and moves the
    /// entry into the `recentlyCompleted` cache.
    pub async fn mark_completed(&self, project: &str, agent_type: &str, instance_id: Option<&str>) {
        let key = pending_key(project, agent_type, instance_id);
        let Some(mut entry) = self.active.write().await.remove(&key) else { return };
        if !entry.message_id.is_empty() {
            if let Err(e) =
                self.chat.replace_own_reaction_on_message(&entry.channel_id, &entry.message_id, "⏳", "✅").await
            {
                warn!(error = %e, channel_id = %entry.channel_id, "failed to set completed reaction");
            }
        }
        entry.completed_at = Some(Instant::now());
        self.recently_completed.write().await.insert(key, entry);
    }

    /// Replaces ⏳ with ❌ (if `messageId` is non-empty) and deletes the
    /// entry without caching it.
    pub async fn mark_error(&self, project: &str, agent_type: &str, instance_id: Option<&str>) {
        let key = pending_key(project, agent_type, instance_id);
        let Some(entry) = self.active.write().await.remove(&key) else { return };
        if !entry.message_id.is_empty() {
            if let Err(e) =
                self.chat.replace_own_reaction_on_message(&entry.channel_id, &entry.message_id, "⏳", "❌").await
            {
                warn!(error = %e, channel_id = %entry.channel_id, "failed to set error reaction");
            }
        }
    }

    async fn purge_expired(&self) {
        let ttl = self.recently_completed_ttl;
        self.recently_completed
            .write()
            .await
            .retain(|_, entry| entry.completed_at.is_some_and(|at| at.elapsed() < ttl));
    }
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
