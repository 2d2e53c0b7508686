// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bridge composition root (spec §4.H): wires the VT Screen / PTY Runtime /
//! Stream Server / Hook Event Pipeline / Message Router / Pending Tracker /
//! Streaming Updater together around the external collaborators (chat
//! client, project store) supplied by the host application.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::chat::{ChatClient, InboundMessage, MessageHandler};
use crate::config::Config;
use crate::hooks::HookState;
use crate::pending::PendingTracker;
use crate::project_store::ProjectStore;
use crate::pty::PtyRuntime;
use crate::router::{ContainerFileInjector, MessageRouter};
use crate::stream::StreamServer;
use crate::streaming::StreamingUpdater;

/// Forwards inbound chat messages to the [`MessageRouter`]; the only
/// adapter needed to satisfy [`ChatClient::on_message`]'s callback shape.
struct RouterMessageHandler {
    router: Arc<MessageRouter>,
}

#[async_trait]
impl MessageHandler for RouterMessageHandler {
    async fn handle(&self, message: InboundMessage) {
        self.router.route(message).await;
    }
}

/// A fully-wired bridge, ready to [`Bridge::run`].
pub struct Bridge {
    config: Config,
    chat: Arc<dyn ChatClient>,
    projects: Arc<dyn ProjectStore>,
    runtime: Arc<PtyRuntime>,
    router: Arc<MessageRouter>,
    hook_state: Arc<HookState>,
    stream_server: Arc<StreamServer>,
    shutdown: CancellationToken,
}

/// Initialize `tracing` from `config.log_format`/`config.log_level`. Safe
/// to call more than once (e.g. from tests) since it uses `try_init`.
pub fn init_tracing(config: &Config) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let result = match config.log_format.as_str() {
        "json" => fmt::fmt().with_env_filter(filter).json().try_init(),
        _ => fmt::fmt().with_env_filter(filter).try_init(),
    };
    drop(result);
}

impl Bridge {
    /// Wire every component (spec §4.H "On start"), but do not yet connect
    /// the chat client or bind any listeners — that happens in [`Bridge::run`].
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        chat: Arc<dyn ChatClient>,
        projects: Arc<dyn ProjectStore>,
        container_injector: Option<Arc<dyn ContainerFileInjector>>,
        hook_token: Option<String>,
    ) -> Self {
        let runtime = Arc::new(PtyRuntime::new(config.pty_cols, config.pty_rows, config.effective_scrollback_lines()));
        let pending = Arc::new(PendingTracker::new(chat.clone()));
        let streaming = Arc::new(StreamingUpdater::new(chat.clone()));

        let router = Arc::new(MessageRouter::new(
            chat.clone(),
            projects.clone(),
            runtime.clone(),
            pending.clone(),
            container_injector.clone(),
            Duration::from_millis(config.submit_delay_ms),
            Duration::from_millis(config.buffer_fallback_initial_ms),
            Duration::from_millis(config.buffer_fallback_stable_ms),
        ));

        let hook_state = Arc::new(HookState::new(
            projects.clone(),
            runtime.clone(),
            pending,
            streaming,
            chat.clone(),
            container_injector,
            hook_token,
            config.show_thinking,
            config.show_usage,
        ));

        let stream_server = Arc::new(StreamServer::new(
            config.effective_stream_socket(),
            runtime.clone(),
            Duration::from_millis(config.min_emit_interval_ms),
            config.patch_threshold_ratio,
        ));

        Self {
            config,
            chat,
            projects,
            runtime,
            router,
            hook_state,
            stream_server,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Starts every background task and blocks until `shutdown` is
    /// cancelled (by a signal handler, by a test, or by the caller), then
    /// tears everything down best-effort (spec §4.H "On stop").
    pub async fn run(self) -> anyhow::Result<()> {
        self.chat.connect().await?;
        self.restore_runtime_windows().await;
        self.chat.on_message(Arc::new(RouterMessageHandler { router: self.router.clone() })).await;

        let hook_handle = {
            let state = self.hook_state.clone();
            let host = self.config.hook_host.clone();
            let port = self.config.hook_port;
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = crate::hooks::run(state, &host, port, shutdown).await {
                    error!(error = %e, "hook pipeline exited with an error");
                }
            })
        };

        let stream_handle = {
            let server = self.stream_server.clone();
            let shutdown = self.shutdown.clone();
            tokio::spawn(async move {
                if let Err(e) = server.run(shutdown).await {
                    error!(error = %e, "stream server exited with an error");
                }
            })
        };

        self.shutdown.cancelled().await;
        info!("bridge shutdown requested, disposing collaborators");

        let _ = tokio::join!(hook_handle, stream_handle);
        self.stop().await;
        Ok(())
    }

    /// Re-spawn windows for any instance whose project record exists but
    /// whose PTY window is not currently live.
    ///
    /// The project record (`InstanceRecord`) carries no recorded command
    /// line for its agent process, only its `(tmuxWindow, channelId,
    /// container, runtimeType)` — that command line lives with whatever
    /// spawned the instance originally (the host application, not this
    /// crate's data model). Restoring a PTY window therefore reduces to
    /// ensuring its tmux session is known to the runtime; the window itself
    /// is (re)created lazily the next time a message or `/runtime/ensure`
    /// call targets it.
    async fn restore_runtime_windows(&self) {
        for project in self.projects.list_projects().await {
            self.runtime.get_or_create_session(&project.project_name).await;
            for instance in project.instances.values() {
                if instance.runtime_type != crate::data::RuntimeType::Pty {
                    continue;
                }
                if self.runtime.window_exists(&project.tmux_session, &instance.tmux_window).await {
                    continue;
                }
                info!(
                    project = %project.project_name,
                    window = %instance.tmux_window,
                    "instance has no live window at startup, deferring respawn to first use"
                );
            }
        }
    }

    /// Best-effort disposal (spec §4.H "On stop"): tolerates partial-init
    /// states, so every step runs independently of the others' outcome.
    async fn stop(&self) {
        for window in self.runtime.list_windows(None).await {
            self.runtime.stop_window(&window.session_name, &window.window_name).await;
        }
        if let Err(e) = self.chat.disconnect().await {
            warn!(error = %e, "failed to disconnect chat client cleanly");
        }
    }
}

/// Run a bridge to completion: wire collaborators, install a signal
/// handler, and block until shutdown.
pub async fn run(
    config: Config,
    chat: Arc<dyn ChatClient>,
    projects: Arc<dyn ProjectStore>,
    container_injector: Option<Arc<dyn ContainerFileInjector>>,
) -> anyhow::Result<()> {
    init_tracing(&config);
    config.validate()?;

    let hook_token = config.hook_token.clone();
    let bridge = Bridge::new(config, chat, projects, container_injector, hook_token);
    spawn_signal_handler(bridge.shutdown_token());
    bridge.run().await
}

/// Graceful shutdown on the first `SIGTERM`/`SIGINT`, force-exit on the
/// second (spec §4.H, mirroring the teacher's session-runner signal task).
fn spawn_signal_handler(shutdown: CancellationToken) {
    tokio::spawn(async move {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()).ok();
        let mut sigint = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::interrupt()).ok();

        tokio::select! {
            _ = async {
                match sigterm.as_mut() {
                    Some(s) => s.recv().await,
                    None => std::future::pending().await,
                }
            } => info!("received SIGTERM"),
            _ = async {
                match sigint.as_mut() {
                    Some(s) => s.recv().await,
                    None => std::future::pending().await,
                }
            } => info!("received SIGINT"),
        }
        shutdown.cancel();

        tokio::select! {
            _ = async {
                match sigterm.as_mut() {
                    Some(s) => s.recv().await,
                    None => std::future::pending().await,
                }
            } => info!("received SIGTERM again, forcing exit"),
            _ = async {
                match sigint.as_mut() {
                    Some(s) => s.recv().await,
                    None => std::future::pending().await,
                }
            } => info!("received SIGINT again, forcing exit"),
        }
        std::process::exit(130);
    });
}

#[cfg(test)]
#[path = "bridge_tests.rs"]
mod tests;
