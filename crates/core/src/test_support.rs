// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-repo test doubles for the external collaborators the core depends on
//! (spec §6 chat client, spec §3/§9 project store) and a tiny SDK-runner
//! fake for the Message Router's `runtimeType == "sdk"` path.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::chat::{AgentChannelConfig, ChatCapabilities, ChatClient, MessageHandler, Platform};
use crate::error::{BridgeError, ErrorKind};
use crate::router::{ContainerFileInjector, SdkRunner};

/// One recorded call against a [`FakeChatClient`], for assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Disconnect,
    SendToChannel { channel: String, text: String },
    SendToChannelWithId { channel: String, text: String },
    SendToChannelWithFiles { channel: String, text: String, paths: Vec<String> },
    UpdateMessage { channel: String, message_id: String, text: String },
    ReplyInThread { channel: String, anchor: String, text: String },
    ReplyInThreadWithId { channel: String, anchor: String, text: String },
    AddReaction { channel: String, message_id: String, emoji: String },
    ReplaceReaction { channel: String, message_id: String, from: String, to: String },
    CreateAgentChannels { guild_id: String, project_name: String },
}

/// A [`ChatClient`] double that records every call and returns
/// deterministic, incrementing message ids.
pub struct FakeChatClient {
    pub platform: Platform,
    pub capabilities: ChatCapabilities,
    pub calls: Mutex<Vec<Call>>,
    next_id: AtomicU64,
}

impl FakeChatClient {
    pub fn new(platform: Platform, capabilities: ChatCapabilities) -> Self {
        Self { platform, capabilities, calls: Mutex::new(Vec::new()), next_id: AtomicU64::new(1) }
    }

    /// All capabilities enabled; the common case in tests exercising
    /// threaded replies and streaming edits.
    pub fn full_capabilities(platform: Platform) -> Self {
        Self::new(
            platform,
            ChatCapabilities { update_message: true, reply_in_thread: true, reply_in_thread_with_id: true },
        )
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }

    fn next_message_id(&self) -> String {
        format!("msg-{}", self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChatClient for FakeChatClient {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn capabilities(&self) -> ChatCapabilities {
        self.capabilities
    }

    async fn connect(&self) -> Result<(), BridgeError> {
        self.record(Call::Connect);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BridgeError> {
        self.record(Call::Disconnect);
        Ok(())
    }

    async fn on_message(&self, _handler: Arc<dyn MessageHandler>) {}

    async fn send_to_channel(&self, channel: &str, text: &str) -> Result<(), BridgeError> {
        self.record(Call::SendToChannel { channel: channel.to_owned(), text: text.to_owned() });
        Ok(())
    }

    async fn send_to_channel_with_id(&self, channel: &str, text: &str) -> Result<String, BridgeError> {
        self.record(Call::SendToChannelWithId { channel: channel.to_owned(), text: text.to_owned() });
        Ok(self.next_message_id())
    }

    async fn send_to_channel_with_files(
        &self,
        channel: &str,
        text: &str,
        local_paths: &[String],
    ) -> Result<(), BridgeError> {
        self.record(Call::SendToChannelWithFiles {
            channel: channel.to_owned(),
            text: text.to_owned(),
            paths: local_paths.to_vec(),
        });
        Ok(())
    }

    async fn update_message(&self, channel: &str, message_id: &str, text: &str) -> Result<(), BridgeError> {
        if !self.capabilities.update_message {
            return Err(BridgeError::new(ErrorKind::Unsupported, "updateMessage not supported by this chat client"));
        }
        self.record(Call::UpdateMessage {
            channel: channel.to_owned(),
            message_id: message_id.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn reply_in_thread(&self, channel: &str, anchor_message_id: &str, text: &str) -> Result<(), BridgeError> {
        if !self.capabilities.reply_in_thread {
            return Err(BridgeError::new(ErrorKind::Unsupported, "replyInThread not supported by this chat client"));
        }
        self.record(Call::ReplyInThread {
            channel: channel.to_owned(),
            anchor: anchor_message_id.to_owned(),
            text: text.to_owned(),
        });
        Ok(())
    }

    async fn reply_in_thread_with_id(
        &self,
        channel: &str,
        anchor_message_id: &str,
        text: &str,
    ) -> Result<String, BridgeError> {
        if !self.capabilities.reply_in_thread_with_id {
            return Err(BridgeError::new(
                ErrorKind::Unsupported,
                "replyInThreadWithId not supported by this chat client",
            ));
        }
        self.record(Call::ReplyInThreadWithId {
            channel: channel.to_owned(),
            anchor: anchor_message_id.to_owned(),
            text: text.to_owned(),
        });
        Ok(self.next_message_id())
    }

    async fn add_reaction_to_message(&self, channel: &str, message_id: &str, emoji: &str) -> Result<(), BridgeError> {
        self.record(Call::AddReaction {
            channel: channel.to_owned(),
            message_id: message_id.to_owned(),
            emoji: emoji.to_owned(),
        });
        Ok(())
    }

    async fn replace_own_reaction_on_message(
        &self,
        channel: &str,
        message_id: &str,
        from_emoji: &str,
        to_emoji: &str,
    ) -> Result<(), BridgeError> {
        self.record(Call::ReplaceReaction {
            channel: channel.to_owned(),
            message_id: message_id.to_owned(),
            from: from_emoji.to_owned(),
            to: to_emoji.to_owned(),
        });
        Ok(())
    }

    async fn create_agent_channels(
        &self,
        guild_id: &str,
        project_name: &str,
        configs: &[AgentChannelConfig],
        _custom_name: Option<&str>,
    ) -> Result<BTreeMap<String, String>, BridgeError> {
        self.record(Call::CreateAgentChannels { guild_id: guild_id.to_owned(), project_name: project_name.to_owned() });
        Ok(configs.iter().map(|c| (c.agent_type.clone(), format!("channel-{}", c.agent_type))).collect())
    }
}

/// A minimal [`SdkRunner`] double recording submitted messages.
pub struct FakeSdkRunner {
    pub submitted: Mutex<Vec<String>>,
    pub fail: bool,
}

impl FakeSdkRunner {
    pub fn new() -> Self {
        Self { submitted: Mutex::new(Vec::new()), fail: false }
    }

    pub fn failing() -> Self {
        Self { submitted: Mutex::new(Vec::new()), fail: true }
    }
}

impl Default for FakeSdkRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SdkRunner for FakeSdkRunner {
    async fn submit_message(&self, text: &str) -> Result<(), BridgeError> {
        if self.fail {
            return Err(BridgeError::new(ErrorKind::RuntimeError, "fake sdk runner configured to fail"));
        }
        self.submitted.lock().unwrap_or_else(|e| e.into_inner()).push(text.to_owned());
        Ok(())
    }
}

/// A [`ContainerFileInjector`] double recording every call and tracking the
/// peak number of concurrent invocations it observed, to let tests assert
/// the Message Router serializes injections per container (spec §5).
pub struct FakeContainerInjector {
    pub calls: Mutex<Vec<(String, String, String)>>,
    in_flight: AtomicUsize,
    pub max_concurrent: AtomicUsize,
    delay: std::time::Duration,
}

impl FakeContainerInjector {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
            delay: std::time::Duration::from_millis(30),
        }
    }
}

impl Default for FakeContainerInjector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerFileInjector for FakeContainerInjector {
    async fn inject_file(
        &self,
        container_id: &str,
        local_path: &Path,
        container_path: &Path,
    ) -> Result<(), BridgeError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push((
            container_id.to_owned(),
            local_path.display().to_string(),
            container_path.display().to_string(),
        ));
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
