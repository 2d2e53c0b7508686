// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-window state machine (spec §4.B "State machine per window"):
//! `starting -> running -> exited`, driving one PTY-attached child process
//! and its VT screen.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use nix::libc;
use nix::sys::signal::Signal;
use tokio::sync::{broadcast, RwLock};

use crate::data::WindowId;
use crate::vt::{Responder, ResponderState, Screen, StyledFrame};

use super::native::NativePty;
use super::nbio::{read_chunk, write_all};

/// Lifecycle state of a window's child process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    Starting,
    Running,
    Exited,
}

#[derive(Debug, Clone, Copy)]
struct ExitInfo {
    code: Option<i32>,
    signal: Option<i32>,
    exited_at: SystemTime,
}

/// A per-window `frame(windowId, bufferLen)` notification, fired after every
/// screen mutation.
#[derive(Debug, Clone)]
pub struct FrameEvent {
    pub window_id: WindowId,
    pub buffer_len: usize,
}

struct Terminal {
    screen: Screen,
    responder: Responder,
}

/// One running (or exited) agent window: its PTY, VT screen, and lifecycle.
pub struct Window {
    id: WindowId,
    command_line: String,
    pty: Arc<NativePty>,
    terminal: Arc<RwLock<Terminal>>,
    status: Arc<RwLock<WindowStatus>>,
    exit: Arc<RwLock<Option<ExitInfo>>>,
    started_at: SystemTime,
    frame_tx: broadcast::Sender<FrameEvent>,
}

impl Window {
    pub fn spawn(
        id: WindowId,
        command_line: String,
        argv: Vec<String>,
        cols: u16,
        rows: u16,
        scrollback_lines: usize,
        env: &[(String, String)],
        frame_tx: broadcast::Sender<FrameEvent>,
    ) -> anyhow::Result<Arc<Self>> {
        let pty = Arc::new(NativePty::spawn(&argv, cols, rows, env)?);
        let terminal = Arc::new(RwLock::new(Terminal {
            screen: Screen::with_scrollback(cols as usize, rows as usize, scrollback_lines),
            responder: Responder::new(),
        }));
        let window = Arc::new(Self {
            id,
            command_line,
            pty,
            terminal,
            status: Arc::new(RwLock::new(WindowStatus::Starting)),
            exit: Arc::new(RwLock::new(None)),
            started_at: SystemTime::now(),
            frame_tx,
        });
        window.clone().spawn_reader_task();
        Ok(window)
    }

    pub fn id(&self) -> &WindowId {
        &self.id
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn pid(&self) -> u32 {
        self.pty.pid.as_raw() as u32
    }

    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    pub async fn status(&self) -> WindowStatus {
        *self.status.read().await
    }

    pub async fn exit_info(&self) -> Option<(Option<i32>, Option<i32>, SystemTime)> {
        self.exit.read().await.map(|e| (e.code, e.signal, e.exited_at))
    }

    fn spawn_reader_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            let heartbeat = tokio::time::sleep(Duration::from_millis(50));
            tokio::pin!(heartbeat);
            let mut became_running = false;

            loop {
                if !became_running {
                    tokio::select! {
                        biased;
                        result = read_chunk(&self.pty.master, &mut buf) => {
                            match result {
                                Ok(0) => break,
                                Ok(n) => {
                                    became_running = true;
                                    *self.status.write().await = WindowStatus::Running;
                                    self.ingest(&buf[..n]).await;
                                }
                                Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                                Err(_) => break,
                            }
                        }
                        _ = &mut heartbeat => {
                            became_running = true;
                            *self.status.write().await = WindowStatus::Running;
                        }
                    }
                    continue;
                }

                match read_chunk(&self.pty.master, &mut buf).await {
                    Ok(0) => break,
                    Ok(n) => self.ingest(&buf[..n]).await,
                    Err(e) if e.raw_os_error() == Some(libc::EIO) => break,
                    Err(_) => break,
                }
            }

            let exit_status = self.pty.wait().await.ok();
            *self.exit.write().await =
                Some(ExitInfo {
                    code: exit_status.and_then(|s| s.code),
                    signal: exit_status.and_then(|s| s.signal),
                    exited_at: SystemTime::now(),
                });
            *self.status.write().await = WindowStatus::Exited;
        });
    }

    async fn ingest(&self, data: &[u8]) {
        let mut terminal = self.terminal.write().await;
        let (cursor_row, cursor_col) = terminal.screen.cursor_position();
        let state = ResponderState {
            cols: terminal.screen.cols(),
            rows: terminal.screen.rows(),
            cursor_row,
            cursor_col,
            private_modes: terminal.screen.private_modes_snapshot(),
        };
        let response = terminal.responder.feed(data, &state);
        if !response.is_empty() {
            let _ = write_all(&self.pty.master, &response).await;
        }
        terminal.screen.feed(data);
        let buffer_len = terminal.screen.plain_text_buffer().len();
        drop(terminal);
        let _ = self.frame_tx.send(FrameEvent { window_id: self.id.clone(), buffer_len });
    }

    pub async fn write_raw(&self, data: &[u8]) -> anyhow::Result<()> {
        write_all(&self.pty.master, data).await.map_err(Into::into)
    }

    pub async fn send_keys(&self, keys: &str) -> anyhow::Result<()> {
        let mut data = keys.as_bytes().to_vec();
        data.push(b'\n');
        self.write_raw(&data).await
    }

    pub async fn type_keys(&self, keys: &str) -> anyhow::Result<()> {
        self.write_raw(keys.as_bytes()).await
    }

    pub async fn send_enter(&self) -> anyhow::Result<()> {
        self.write_raw(b"\r").await
    }

    pub async fn buffer(&self) -> String {
        self.terminal.read().await.screen.plain_text_buffer()
    }

    pub async fn frame(&self, cols: Option<usize>, rows: Option<usize>) -> StyledFrame {
        let terminal = self.terminal.read().await;
        match (cols, rows) {
            (None, None) => terminal.screen.snapshot(),
            (c, r) => {
                drop(terminal);
                let mut terminal = self.terminal.write().await;
                let (new_cols, new_rows) = (c.unwrap_or(terminal.screen.cols()), r.unwrap_or(terminal.screen.rows()));
                terminal.screen.resize(new_cols, new_rows);
                terminal.screen.snapshot()
            }
        }
    }

    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.pty.resize(cols, rows)
    }

    /// SIGTERM, then SIGKILL if still alive after 1.5s. No-op (returns
    /// `true`) if the window has already exited.
    pub async fn stop(&self) -> bool {
        if matches!(self.status().await, WindowStatus::Exited) {
            return true;
        }
        self.pty.send_signal(Signal::SIGTERM);
        tokio::time::sleep(Duration::from_millis(1500)).await;
        if !matches!(self.status().await, WindowStatus::Exited) {
            self.pty.send_signal(Signal::SIGKILL);
        }
        true
    }
}

/// A [`Window`]'s lifecycle snapshot for `listWindows` (spec §4.B).
#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub session_name: String,
    pub window_name: String,
    pub status: WindowStatus,
    pub pid: u32,
    pub started_at: SystemTime,
    pub exited_at: Option<SystemTime>,
    pub exit_code: Option<i32>,
    pub signal: Option<i32>,
}

/// Per-session bookkeeping: env bindings applied to windows started after
/// `setSessionEnv`, and the windows registered under this session name.
#[derive(Default)]
struct SessionEntry {
    env: Vec<(String, String)>,
}

/// The PTY Runtime (spec §4.B): owns every [`Window`] across every session,
/// keyed by `(session, window)` via [`WindowId`]. The `windows` map is
/// mutated only through these operations, matching the single-writer
/// discipline in spec §5 ("Shared resources").
pub struct PtyRuntime {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    windows: RwLock<HashMap<WindowId, Arc<Window>>>,
    frame_tx: broadcast::Sender<FrameEvent>,
    default_cols: u16,
    default_rows: u16,
    default_scrollback: usize,
}

impl PtyRuntime {
    pub fn new(default_cols: u16, default_rows: u16, default_scrollback: usize) -> Self {
        let (default_cols, default_rows) = crate::data::clamp_screen_size(default_cols, default_rows);
        let (frame_tx, _) = broadcast::channel(1024);
        Self {
            sessions: RwLock::new(HashMap::new()),
            windows: RwLock::new(HashMap::new()),
            frame_tx,
            default_cols,
            default_rows,
            default_scrollback,
        }
    }

    /// Subscribe to the `frame(windowId, bufferLen)` event stream fired
    /// after every window's screen mutation (consumed by the Stream Server).
    pub fn subscribe_frames(&self) -> broadcast::Receiver<FrameEvent> {
        self.frame_tx.subscribe()
    }

    /// Map a project to a shared session namespace. Idempotent: repeated
    /// calls for the same `project` return the same session name. The
    /// session name is the project name itself — this runtime has no
    /// notion of a project beyond what the caller hands it.
    pub async fn get_or_create_session(&self, project: &str) -> String {
        let mut sessions = self.sessions.write().await;
        sessions.entry(project.to_owned()).or_default();
        project.to_owned()
    }

    /// Attach an env binding applied to windows started in `session` from
    /// now on (does not affect already-running windows).
    pub async fn set_session_env(&self, session: &str, key: &str, value: &str) {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.entry(session.to_owned()).or_default();
        entry.env.retain(|(k, _)| k != key);
        entry.env.push((key.to_owned(), value.to_owned()));
    }

    pub async fn window_exists(&self, session: &str, window: &str) -> bool {
        let id = WindowId::new(session, window);
        self.windows.read().await.contains_key(&id)
    }

    /// Spawn via the platform shell (`sh -c`) with a PTY attached, inheriting
    /// the session's accumulated env. When `container_id` is set the child
    /// is launched with `docker exec -it <id> sh -c <commandLine>` instead
    /// of a direct `sh -c`. No-op if the window already exists and is not
    /// `Exited`.
    pub async fn start_agent_in_window(
        &self,
        session: &str,
        window: &str,
        command_line: &str,
        container_id: Option<&str>,
    ) -> anyhow::Result<()> {
        let id = WindowId::new(session, window);
        {
            let windows = self.windows.read().await;
            if let Some(existing) = windows.get(&id) {
                if !matches!(existing.status().await, WindowStatus::Exited) {
                    return Ok(());
                }
            }
        }

        let env = {
            let mut sessions = self.sessions.write().await;
            sessions.entry(session.to_owned()).or_default().env.clone()
        };
        let argv = match container_id {
            Some(cid) => NativePty::docker_argv(cid, command_line),
            None => NativePty::direct_argv(command_line),
        };

        let win = Window::spawn(
            id.clone(),
            command_line.to_owned(),
            argv,
            self.default_cols,
            self.default_rows,
            self.default_scrollback,
            &env,
            self.frame_tx.clone(),
        )?;
        self.windows.write().await.insert(id, win);
        Ok(())
    }

    async fn window(&self, session: &str, window: &str) -> Option<Arc<Window>> {
        let id = WindowId::new(session, window);
        self.windows.read().await.get(&id).cloned()
    }

    /// Write `keys` verbatim followed by a newline (submit a shell-command
    /// line).
    pub async fn send_keys_to_window(&self, session: &str, window: &str, keys: &str) -> anyhow::Result<()> {
        match self.window(session, window).await {
            Some(w) => w.send_keys(keys).await,
            None => anyhow::bail!("window not found: {session}:{window}"),
        }
    }

    /// Write `keys` verbatim without a trailing newline (stage input before
    /// a separate Enter).
    pub async fn type_keys_to_window(&self, session: &str, window: &str, keys: &str) -> anyhow::Result<()> {
        match self.window(session, window).await {
            Some(w) => w.type_keys(keys).await,
            None => anyhow::bail!("window not found: {session}:{window}"),
        }
    }

    /// Write raw bytes straight to the PTY, bypassing the UTF-8 text path —
    /// used for stream-socket `input` messages, which carry arbitrary
    /// terminal byte sequences.
    pub async fn type_keys_to_window_raw(&self, session: &str, window: &str, bytes: &[u8]) -> anyhow::Result<()> {
        match self.window(session, window).await {
            Some(w) => w.write_raw(bytes).await,
            None => anyhow::bail!("window not found: {session}:{window}"),
        }
    }

    pub async fn send_enter_to_window(&self, session: &str, window: &str) -> anyhow::Result<()> {
        match self.window(session, window).await {
            Some(w) => w.send_enter().await,
            None => anyhow::bail!("window not found: {session}:{window}"),
        }
    }

    /// Plain-text snapshot of the window's current VT frame, trailing blank
    /// lines trimmed.
    pub async fn get_window_buffer(&self, session: &str, window: &str) -> Option<String> {
        let w = self.window(session, window).await?;
        Some(w.buffer().await)
    }

    pub async fn get_window_frame(
        &self,
        session: &str,
        window: &str,
        cols: Option<usize>,
        rows: Option<usize>,
    ) -> Option<StyledFrame> {
        let w = self.window(session, window).await?;
        Some(w.frame(cols, rows).await)
    }

    pub async fn list_windows(&self, session: Option<&str>) -> Vec<WindowInfo> {
        let windows = self.windows.read().await;
        let mut out = Vec::new();
        for (id, w) in windows.iter() {
            if let Some(s) = session {
                if id.session() != s {
                    continue;
                }
            }
            let status = w.status().await;
            let (exit_code, signal, exited_at) = match w.exit_info().await {
                Some((code, signal, at)) => (code, signal, Some(at)),
                None => (None, None, None),
            };
            out.push(WindowInfo {
                session_name: id.session().to_owned(),
                window_name: id.window().to_owned(),
                status,
                pid: w.pid(),
                started_at: w.started_at(),
                exited_at,
                exit_code,
                signal,
            });
        }
        out
    }

    /// SIGTERM, then SIGKILL after 1.5s if still alive. Returns `true` if
    /// the window doesn't exist (nothing to stop) or was already exited.
    pub async fn stop_window(&self, session: &str, window: &str) -> bool {
        match self.window(session, window).await {
            Some(w) => w.stop().await,
            None => true,
        }
    }

    /// Resize an existing window's PTY and VT screen. `cols`/`rows` are
    /// clamped into the spec's bounded range (spec §3 "Screen state"
    /// invariants) before reaching the PTY or the VT screen.
    pub async fn resize_window(&self, session: &str, window: &str, cols: u16, rows: u16) -> anyhow::Result<()> {
        let (cols, rows) = crate::data::clamp_screen_size(cols, rows);
        match self.window(session, window).await {
            Some(w) => {
                w.resize(cols, rows)?;
                w.frame(Some(cols as usize), Some(rows as usize)).await;
                Ok(())
            }
            None => anyhow::bail!("window not found: {session}:{window}"),
        }
    }
}

#[cfg(test)]
#[path = "window_tests.rs"]
mod runtime_tests;
