// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message Router (spec §4.G): the downstream half of the bridge. Dispatches
//! one inbound chat message at a time per instance, sanitizing input,
//! staging attachments, handing off to the PTY Runtime or an SDK runner, and
//! running the buffer-fallback safety net for agents that never fire a hook.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::chat::{Attachment, ChatClient, InboundMessage};
use crate::data::{ContainerMode, InstanceKey, InstanceRecord, ProjectRecord, RuntimeType};
use crate::error::BridgeError;
use crate::pending::PendingTracker;
use crate::project_store::ProjectStore;
use crate::pty::PtyRuntime;

/// Per-message content cap (spec §4.G step 1).
pub const MAX_MESSAGE_LEN: usize = 10_000;
/// Per-attachment size cap before an attachment is dropped (spec §4.G step 4).
pub const MAX_ATTACHMENT_BYTES: u64 = 50 * 1024 * 1024;
/// Retakes after the initial buffer-fallback capture, at
/// `buffer_fallback_stable` intervals, before deferring to a stop-hook.
const MAX_BUFFER_FALLBACK_RETAKES: u32 = 3;

/// An external SDK-driven agent runner, registered per `(project, instanceId)`
/// (spec §4.G step 3). The PTY path has no analogous trait — it goes
/// straight through [`PtyRuntime`].
#[async_trait]
pub trait SdkRunner: Send + Sync {
    async fn submit_message(&self, text: &str) -> Result<(), BridgeError>;
}

/// Copies a staged attachment into a running container (spec §4.G step 4).
/// Optional: instances that never run containerized have no need for one.
#[async_trait]
pub trait ContainerFileInjector: Send + Sync {
    async fn inject_file(&self, container_id: &str, local_path: &Path, container_path: &Path) -> Result<(), BridgeError>;
}

fn sanitize(content: &str) -> Result<String, BridgeError> {
    let stripped: String = content.chars().filter(|c| *c != '\0').collect();
    if stripped.trim().is_empty() {
        return Err(BridgeError::invalid_payload("message is empty"));
    }
    if stripped.chars().count() > MAX_MESSAGE_LEN {
        return Err(BridgeError::invalid_payload("message exceeds the maximum length"));
    }
    Ok(stripped)
}

/// A short, single-line preview stored for the start-of-turn anchor message.
fn preview(text: &str) -> String {
    const PREVIEW_CHARS: usize = 200;
    let first_line = text.lines().next().unwrap_or(text);
    if first_line.chars().count() <= PREVIEW_CHARS {
        first_line.to_owned()
    } else {
        let truncated: String = first_line.chars().take(PREVIEW_CHARS).collect();
        format!("{truncated}…")
    }
}

fn is_chrome_char(c: char) -> bool {
    matches!(
        c,
        '─' | '━'
            | '│'
            | '┃'
            | '┌'
            | '┐'
            | '└'
            | '┘'
            | '├'
            | '┤'
            | '┬'
            | '┴'
            | '┼'
            | '╭'
            | '╮'
            | '╰'
            | '╯'
            | '═'
            | '║'
            | '╔'
            | '╗'
            | '╚'
            | '╝'
            | '╠'
            | '╣'
            | '╦'
            | '╩'
            | '╬'
            | '-'
            | '—'
            | '–'
            | ' '
    )
}

fn is_chrome_line(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return true;
    }
    let total = trimmed.chars().count();
    let chrome = trimmed.chars().filter(|c| is_chrome_char(*c)).count();
    (chrome as f64 / total as f64) >= 0.9
}

/// Extracts the trailing command block starting at the last `"❯ "` prompt
/// line, or `None` if no such block exists or it has the idle-prompt shape
/// (spec §4.G.a).
fn extract_last_command_block(buffer: &str) -> Option<String> {
    let lines: Vec<&str> = buffer.lines().collect();
    let prompt_idx = lines.iter().rposition(|l| l.starts_with("❯ "))?;
    let mut block: Vec<&str> = lines[prompt_idx..].to_vec();
    while matches!(block.last(), Some(l) if l.trim().is_empty()) {
        block.pop();
    }
    if block.is_empty() {
        return None;
    }
    if block.len() >= 2 && is_chrome_line(block[1]) {
        let substantive = block[2..].iter().filter(|l| !is_chrome_line(l)).count();
        if substantive <= 2 {
            return None;
        }
    }
    let text = block.join("\n");
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Dispatches inbound chat messages to the PTY Runtime or a registered SDK
/// runner (spec §4.G).
pub struct MessageRouter {
    chat: Arc<dyn ChatClient>,
    projects: Arc<dyn ProjectStore>,
    runtime: Arc<PtyRuntime>,
    pending: Arc<PendingTracker>,
    container_injector: Option<Arc<dyn ContainerFileInjector>>,
    sdk_runners: RwLock<HashMap<(String, String), Arc<dyn SdkRunner>>>,
    submit_delay: Duration,
    buffer_fallback_initial: Duration,
    buffer_fallback_stable: Duration,
    instance_locks: RwLock<HashMap<String, Arc<AsyncMutex<()>>>>,
    container_locks: RwLock<HashMap<String, Arc<AsyncMutex<()>>>>,
    fallback_handles: RwLock<HashMap<String, JoinHandle<()>>>,
}

impl MessageRouter {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        chat: Arc<dyn ChatClient>,
        projects: Arc<dyn ProjectStore>,
        runtime: Arc<PtyRuntime>,
        pending: Arc<PendingTracker>,
        container_injector: Option<Arc<dyn ContainerFileInjector>>,
        submit_delay: Duration,
        buffer_fallback_initial: Duration,
        buffer_fallback_stable: Duration,
    ) -> Self {
        Self {
            chat,
            projects,
            runtime,
            pending,
            container_injector,
            sdk_runners: RwLock::new(HashMap::new()),
            submit_delay,
            buffer_fallback_initial,
            buffer_fallback_stable,
            instance_locks: RwLock::new(HashMap::new()),
            container_locks: RwLock::new(HashMap::new()),
            fallback_handles: RwLock::new(HashMap::new()),
        }
    }

    pub async fn register_sdk_runner(&self, project_name: &str, instance_id: &str, runner: Arc<dyn SdkRunner>) {
        self.sdk_runners.write().await.insert((project_name.to_owned(), instance_id.to_owned()), runner);
    }

    async fn instance_lock(&self, key: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.instance_locks.write().await;
        Arc::clone(locks.entry(key.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }

    /// Container file injection must be exclusive per container (spec §5
    /// "Container file injection and periodic sync are exclusive per
    /// container").
    async fn container_lock(&self, container_id: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = self.container_locks.write().await;
        Arc::clone(locks.entry(container_id.to_owned()).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
    }

    /// Processes one inbound chat message end to end (spec §4.G steps 1-7).
    /// Serialized per instance: a second message for the same instance
    /// waits for this one to finish steps 1-6 before it begins (spec §5).
    pub async fn route(&self, message: InboundMessage) {
        let InboundMessage { agent_type, content, project_name, channel_id, message_id, instance_id, attachments } =
            message;
        let iid = instance_id.as_deref();

        let text = match sanitize(&content) {
            Ok(text) => text,
            Err(_) => {
                self.pending.mark_error(&project_name, &agent_type, iid).await;
                self.notify(&channel_id, "Message rejected").await;
                return;
            }
        };

        let Some(project) = self.projects.get_project(&project_name).await else {
            self.pending.mark_error(&project_name, &agent_type, iid).await;
            self.notify(&channel_id, &format!("Unknown project: {project_name}")).await;
            return;
        };

        let Some((resolved_id, instance)) = project.resolve_instance(&agent_type, iid).map(|(id, rec)| (id.to_owned(), rec.clone())) else {
            self.pending.mark_error(&project_name, &agent_type, iid).await;
            self.notify(&channel_id, &format!("No running instance for {agent_type}")).await;
            return;
        };

        let lock_key = InstanceKey::new(&project_name, &agent_type, instance_id.clone()).pending_key();
        let lock = self.instance_lock(&lock_key).await;
        let _guard = lock.lock().await;

        if instance.runtime_type == RuntimeType::Sdk {
            self.route_sdk(&project_name, &agent_type, &channel_id, &message_id, iid, &resolved_id, &text).await;
            return;
        }

        self.route_pty(&project, &instance, &project_name, &agent_type, &channel_id, &message_id, iid, &text, &attachments)
            .await;
    }

    async fn notify(&self, channel_id: &str, text: &str) {
        if let Err(e) = self.chat.send_to_channel(channel_id, text).await {
            warn!(error = %e, channel_id, "failed to notify channel");
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn route_sdk(
        &self,
        project_name: &str,
        agent_type: &str,
        channel_id: &str,
        message_id: &str,
        instance_id: Option<&str>,
        resolved_id: &str,
        text: &str,
    ) {
        let runner = self.sdk_runners.read().await.get(&(project_name.to_owned(), resolved_id.to_owned())).cloned();
        let Some(runner) = runner else {
            self.pending.mark_error(project_name, agent_type, instance_id).await;
            self.notify(channel_id, "SDK runner not found").await;
            return;
        };

        self.pending.mark_pending(project_name, agent_type, channel_id, message_id, instance_id).await;
        self.pending.set_prompt_preview(project_name, agent_type, &preview(text), instance_id).await;

        if let Err(e) = runner.submit_message(text).await {
            warn!(error = %e, project_name, agent_type, "sdk runner rejected message");
            self.pending.mark_error(project_name, agent_type, instance_id).await;
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn route_pty(
        &self,
        project: &ProjectRecord,
        instance: &InstanceRecord,
        project_name: &str,
        agent_type: &str,
        channel_id: &str,
        message_id: &str,
        instance_id: Option<&str>,
        text: &str,
        attachments: &[Attachment],
    ) {
        let mut full_text = text.to_owned();
        if !attachments.is_empty() {
            match self.stage_attachments(project, instance, attachments).await {
                Ok(markers) => {
                    for marker in markers {
                        full_text.push(' ');
                        full_text.push_str(&marker);
                    }
                }
                Err(e) => warn!(error = %e, project_name, "failed to stage attachments"),
            }
        }

        self.pending.mark_pending(project_name, agent_type, channel_id, message_id, instance_id).await;
        self.pending.set_prompt_preview(project_name, agent_type, &preview(text), instance_id).await;

        let session = project.tmux_session.clone();
        let window = instance.tmux_window.clone();

        if let Err(e) = self.runtime.type_keys_to_window(&session, &window, &full_text).await {
            warn!(error = %e, session, window, "failed to type message into window");
            self.pending.mark_error(project_name, agent_type, instance_id).await;
            return;
        }

        if self.submit_delay.is_zero() {
            if let Err(e) = self.runtime.send_enter_to_window(&session, &window).await {
                warn!(error = %e, session, window, "failed to send enter");
            }
        } else {
            let runtime = Arc::clone(&self.runtime);
            let delay = self.submit_delay;
            let (session, window) = (session.clone(), window.clone());
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Err(e) = runtime.send_enter_to_window(&session, &window).await {
                    warn!(error = %e, session, window, "failed to send enter after staging delay");
                }
            });
        }

        self.schedule_buffer_fallback(
            project_name.to_owned(),
            agent_type.to_owned(),
            instance_id.map(str::to_owned),
            channel_id.to_owned(),
            session,
            window,
        )
        .await;
    }

    async fn stage_attachments(
        &self,
        project: &ProjectRecord,
        instance: &InstanceRecord,
        attachments: &[Attachment],
    ) -> anyhow::Result<Vec<String>> {
        let dest_dir = Path::new(&project.project_path).join(".discode").join("files");
        tokio::fs::create_dir_all(&dest_dir).await?;

        let mut markers = Vec::new();
        for attachment in attachments {
            let src = Path::new(&attachment.local_path);
            let metadata = tokio::fs::metadata(src).await?;
            if metadata.len() > MAX_ATTACHMENT_BYTES {
                warn!(path = %attachment.local_path, size = metadata.len(), "attachment exceeds size cap, skipping");
                continue;
            }

            let file_name = src.file_name().map(ToOwned::to_owned).unwrap_or_else(|| "attachment".into());
            let dest_path = dest_dir.join(&file_name);
            tokio::fs::copy(src, &dest_path).await?;
            markers.push(format!("[file:{}]", dest_path.display()));

            if let ContainerMode::Docker { container_id } = &instance.container {
                if let Some(injector) = &self.container_injector {
                    let container_path = Path::new("/workspace/.discode/files").join(&file_name);
                    let lock = self.container_lock(container_id).await;
                    let _guard = lock.lock().await;
                    if let Err(e) = injector.inject_file(container_id, &dest_path, &container_path).await {
                        warn!(error = %e, container_id, "failed to inject attachment into container");
                    }
                }
            }
        }
        Ok(markers)
    }

    async fn schedule_buffer_fallback(
        &self,
        project_name: String,
        agent_type: String,
        instance_id: Option<String>,
        channel_id: String,
        session: String,
        window: String,
    ) {
        let key = InstanceKey::new(&project_name, &agent_type, instance_id.clone()).pending_key();
        let handle = {
            let runtime = Arc::clone(&self.runtime);
            let pending = Arc::clone(&self.pending);
            let chat = Arc::clone(&self.chat);
            let initial = self.buffer_fallback_initial;
            let stable = self.buffer_fallback_stable;

            tokio::spawn(async move {
                let mut prior = runtime.get_window_buffer(&session, &window).await;
                tokio::time::sleep(initial).await;

                let mut attempt = 0u32;
                loop {
                    let iid = instance_id.as_deref();
                    if pending.is_hook_active(&project_name, &agent_type, iid).await
                        || !pending.has_pending(&project_name, &agent_type, iid).await
                    {
                        return;
                    }

                    let current = runtime.get_window_buffer(&session, &window).await;
                    if current == prior {
                        if let Some(block) = current.as_deref().and_then(extract_last_command_block) {
                            if let Err(e) = chat.send_to_channel(&channel_id, &format!("```\n{block}\n```")).await {
                                warn!(error = %e, channel_id, "failed to send buffer-fallback message");
                            }
                            pending.mark_completed(&project_name, &agent_type, iid).await;
                        }
                        return;
                    }

                    if attempt >= MAX_BUFFER_FALLBACK_RETAKES {
                        return;
                    }
                    prior = current;
                    attempt += 1;
                    tokio::time::sleep(stable).await;
                }
            })
        };

        let mut handles = self.fallback_handles.write().await;
        if let Some(old) = handles.insert(key, handle) {
            old.abort();
        }
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
