// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Chat platform contract consumed by the core (spec §6). The concrete
//! Discord/Slack client is an external collaborator, injected at
//! construction; this crate depends only on [`ChatClient`]. Optional sends
//! (`updateMessage`, `replyInThread`, `replyInThreadWithId`) are surfaced as
//! an explicit capability struct (spec §9 "Dynamic dispatch / duck typing")
//! rather than a runtime downcast.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{BridgeError, ErrorKind};

/// Which chat platform a [`ChatClient`] speaks; governs the message-length
/// limit used by response-text splitting (spec §4.F).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Discord,
    Slack,
}

impl Platform {
    pub fn max_message_len(self) -> usize {
        match self {
            Self::Discord => 1900,
            Self::Slack => 3900,
        }
    }
}

/// A local file path ready to be attached to an outgoing message.
#[derive(Debug, Clone)]
pub struct Attachment {
    pub local_path: String,
}

/// One agent channel to create under `createAgentChannels`.
#[derive(Debug, Clone)]
pub struct AgentChannelConfig {
    pub agent_type: String,
    pub instance_id: Option<String>,
}

/// Which optional sends a concrete [`ChatClient`] implementation supports.
/// Queried once by collaborators (the pending tracker, streaming updater,
/// hook pipeline) instead of attempting a call and branching on failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatCapabilities {
    pub update_message: bool,
    pub reply_in_thread: bool,
    pub reply_in_thread_with_id: bool,
}

/// An inbound chat message delivered to the registered message handler
/// (spec §4.G "Message Router").
#[derive(Debug, Clone)]
pub struct InboundMessage {
    pub agent_type: String,
    pub content: String,
    pub project_name: String,
    pub channel_id: String,
    pub message_id: String,
    pub instance_id: Option<String>,
    pub attachments: Vec<Attachment>,
}

/// Callback registered via [`ChatClient::on_message`].
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: InboundMessage);
}

/// Chat platform contract consumed by the core (spec §6). Optional methods
/// default to an `Unsupported` error; callers should consult
/// [`ChatClient::capabilities`] rather than match on the error kind.
#[async_trait]
pub trait ChatClient: Send + Sync {
    fn platform(&self) -> Platform;
    fn capabilities(&self) -> ChatCapabilities;

    async fn connect(&self) -> Result<(), BridgeError>;
    async fn disconnect(&self) -> Result<(), BridgeError>;

    async fn on_message(&self, handler: Arc<dyn MessageHandler>);

    async fn send_to_channel(&self, channel: &str, text: &str) -> Result<(), BridgeError>;
    async fn send_to_channel_with_id(&self, channel: &str, text: &str) -> Result<String, BridgeError>;
    async fn send_to_channel_with_files(
        &self,
        channel: &str,
        text: &str,
        local_paths: &[String],
    ) -> Result<(), BridgeError>;

    /// Present only when `capabilities().update_message`.
    async fn update_message(&self, channel: &str, message_id: &str, text: &str) -> Result<(), BridgeError> {
        let _ = (channel, message_id, text);
        Err(BridgeError::new(ErrorKind::Unsupported, "updateMessage not supported by this chat client"))
    }

    /// Present only when `capabilities().reply_in_thread`.
    async fn reply_in_thread(&self, channel: &str, anchor_message_id: &str, text: &str) -> Result<(), BridgeError> {
        let _ = (channel, anchor_message_id, text);
        Err(BridgeError::new(ErrorKind::Unsupported, "replyInThread not supported by this chat client"))
    }

    /// Present only when `capabilities().reply_in_thread_with_id`.
    async fn reply_in_thread_with_id(
        &self,
        channel: &str,
        anchor_message_id: &str,
        text: &str,
    ) -> Result<String, BridgeError> {
        let _ = (channel, anchor_message_id, text);
        Err(BridgeError::new(ErrorKind::Unsupported, "replyInThreadWithId not supported by this chat client"))
    }

    async fn add_reaction_to_message(&self, channel: &str, message_id: &str, emoji: &str) -> Result<(), BridgeError>;
    async fn replace_own_reaction_on_message(
        &self,
        channel: &str,
        message_id: &str,
        from_emoji: &str,
        to_emoji: &str,
    ) -> Result<(), BridgeError>;

    async fn create_agent_channels(
        &self,
        guild_id: &str,
        project_name: &str,
        configs: &[AgentChannelConfig],
        custom_name: Option<&str>,
    ) -> Result<BTreeMap<String, String>, BridgeError>;
}

/// Split `text` into platform-sized chunks, preferring line boundaries, and
/// dropping empty chunks (spec §4.F "Response-text splitting").
pub fn split_for_platform(platform: Platform, text: &str) -> Vec<String> {
    chunk_preferring_lines(text, platform.max_message_len())
}

fn chunk_preferring_lines(text: &str, limit: usize) -> Vec<String> {
    if limit == 0 || text.is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for line in text.split('\n') {
        for piece in hard_split(line, limit) {
            let piece_len = piece.chars().count();
            let joiner_len = usize::from(!current.is_empty());
            if !current.is_empty() && current_len + joiner_len + piece_len > limit {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(&piece);
            current_len += piece_len;
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    chunks.into_iter().filter(|c| !c.is_empty()).collect()
}

/// Hard-split a single line at `limit`-char boundaries when it alone
/// exceeds the platform limit.
fn hard_split(line: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = line.chars().collect();
    if chars.len() <= limit {
        return vec![line.to_owned()];
    }
    chars.chunks(limit).map(|c| c.iter().collect()).collect()
}

#[cfg(test)]
#[path = "chat_tests.rs"]
mod tests;
