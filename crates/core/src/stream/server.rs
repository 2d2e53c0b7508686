// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream Server (spec §4.C): a single local Unix domain socket multiplexing
//! styled-frame publication and keyboard/resize/focus input across many
//! connections, each subscribed to a subset of PTY windows.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::data::WindowId;
use crate::pty::{FrameEvent, PtyRuntime, WindowStatus};

use super::protocol::{ClientMessage, ServerMessage};
use super::subscription::Subscription;

/// Outbound messages are dropped (and the connection torn down) once this
/// many are queued for a slow client — the backpressure threshold spec §9
/// leaves implementation-defined.
const OUTBOUND_QUEUE_CAPACITY: usize = 512;

pub struct StreamServer {
    socket_path: PathBuf,
    runtime: Arc<PtyRuntime>,
    min_emit_interval: Duration,
    patch_threshold_ratio: f64,
}

impl StreamServer {
    pub fn new(
        socket_path: impl AsRef<Path>,
        runtime: Arc<PtyRuntime>,
        min_emit_interval: Duration,
        patch_threshold_ratio: f64,
    ) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            runtime,
            min_emit_interval,
            patch_threshold_ratio,
        }
    }

    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) -> anyhow::Result<()> {
        let _ = std::fs::remove_file(&self.socket_path);
        let listener = UnixListener::bind(&self.socket_path)?;
        info!(path = %self.socket_path.display(), "stream server listening");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, _addr) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "stream server accept failed");
                            continue;
                        }
                    };
                    let server = Arc::clone(&self);
                    let conn_shutdown = shutdown.child_token();
                    tokio::spawn(async move {
                        server.handle_connection(stream, conn_shutdown).await;
                    });
                }
            }
        }

        let _ = std::fs::remove_file(&self.socket_path);
        Ok(())
    }

    async fn handle_connection(self: Arc<Self>, stream: UnixStream, shutdown: CancellationToken) {
        let (read_half, mut write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let (out_tx, mut out_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);

        let writer_task = tokio::spawn(async move {
            while let Some(line) = out_rx.recv().await {
                if write_half.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if write_half.write_all(b"\n").await.is_err() {
                    break;
                }
            }
        });

        let mut subscriptions: HashMap<String, Subscription> = HashMap::new();
        let mut frame_rx = self.runtime.subscribe_frames();
        let mut line = String::new();

        loop {
            line.clear();
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = frame_rx.recv() => {
                    match event {
                        Ok(event) => self.on_frame_event(&mut subscriptions, &event, &out_tx).await,
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                    }
                }
                n = reader.read_line(&mut line) => {
                    match n {
                        Ok(0) => break,
                        Ok(_) => {
                            if !self.handle_line(&line, &mut subscriptions, &out_tx).await {
                                break;
                            }
                        }
                        Err(e) => {
                            debug!(error = %e, "stream connection read error");
                            break;
                        }
                    }
                }
            }
        }

        writer_task.abort();
    }

    /// Returns `false` if the outbound queue is saturated (backpressure
    /// threshold exceeded) and the connection should be dropped.
    async fn handle_line(
        &self,
        line: &str,
        subscriptions: &mut HashMap<String, Subscription>,
        out_tx: &mpsc::Sender<String>,
    ) -> bool {
        let trimmed = line.trim_end();
        if trimmed.is_empty() {
            return true;
        }
        let msg: ClientMessage = match serde_json::from_str(trimmed) {
            Ok(msg) => msg,
            Err(e) => {
                return self
                    .send(out_tx, &ServerMessage::Error {
                        code: "protocol_error".to_owned(),
                        message: format!("malformed message: {e}"),
                    })
                    .await;
            }
        };

        match msg {
            ClientMessage::Subscribe { window_id, cols, rows } => {
                self.subscribe(subscriptions, out_tx, window_id, cols, rows).await
            }
            ClientMessage::Resize { window_id, cols, rows } => {
                self.subscribe(subscriptions, out_tx, window_id, cols, rows).await
            }
            ClientMessage::Unsubscribe { window_id } => {
                subscriptions.remove(&window_id);
                true
            }
            ClientMessage::Input { window_id, bytes_base64 } => {
                self.handle_input(out_tx, &window_id, &bytes_base64).await
            }
            ClientMessage::Focus { window_id } => {
                // Focus has no server-side effect beyond validating the
                // window still exists; it exists so multiplexed clients can
                // tell the daemon which window is foregrounded.
                if self.resolve(&window_id).is_none() {
                    return self
                        .send(out_tx, &ServerMessage::Error {
                            code: "unknown_window".to_owned(),
                            message: format!("no such window: {window_id}"),
                        })
                        .await;
                }
                true
            }
        }
    }

    fn resolve(&self, window_id: &str) -> Option<WindowId> {
        WindowId::from_str(window_id).ok()
    }

    async fn subscribe(
        &self,
        subscriptions: &mut HashMap<String, Subscription>,
        out_tx: &mpsc::Sender<String>,
        window_id: String,
        cols: usize,
        rows: usize,
    ) -> bool {
        let Some(id) = self.resolve(&window_id) else {
            return self
                .send(out_tx, &ServerMessage::Error {
                    code: "unknown_window".to_owned(),
                    message: format!("malformed window id: {window_id}"),
                })
                .await;
        };
        if self.runtime.resize_window(id.session(), id.window(), cols as u16, rows as u16).await.is_err() {
            return self
                .send(out_tx, &ServerMessage::Error {
                    code: "unknown_window".to_owned(),
                    message: format!("no such window: {window_id}"),
                })
                .await;
        }
        let mut sub = Subscription::new(window_id.clone(), cols, rows);

        let Some(frame) = self.runtime.get_window_frame(id.session(), id.window(), None, None).await else {
            subscriptions.insert(window_id, sub);
            return true;
        };
        let emission = sub.maybe_emit(&frame, Instant::now(), Duration::ZERO, self.patch_threshold_ratio);
        subscriptions.insert(window_id, sub);
        if let Some(emission) = emission {
            if !self.send(out_tx, &emission.plain).await {
                return false;
            }
            if !self.send(out_tx, &emission.styled).await {
                return false;
            }
        }
        true
    }

    async fn handle_input(&self, out_tx: &mpsc::Sender<String>, window_id: &str, bytes_base64: &str) -> bool {
        let Some(id) = self.resolve(window_id) else {
            return self
                .send(out_tx, &ServerMessage::Error {
                    code: "unknown_window".to_owned(),
                    message: format!("malformed window id: {window_id}"),
                })
                .await;
        };
        let Ok(bytes) = base64::engine::general_purpose::STANDARD.decode(bytes_base64) else {
            return self
                .send(out_tx, &ServerMessage::Error {
                    code: "protocol_error".to_owned(),
                    message: "bytesBase64 is not valid base64".to_owned(),
                })
                .await;
        };
        let exited = self
            .runtime
            .list_windows(Some(id.session()))
            .await
            .iter()
            .find(|w| w.window_name == id.window())
            .is_some_and(|w| matches!(w.status, WindowStatus::Exited));
        if exited {
            return self
                .send(out_tx, &ServerMessage::Error {
                    code: "window_missing".to_owned(),
                    message: format!("window has exited: {window_id}"),
                })
                .await;
        }
        // `sendKeysToWindow`/`typeKeysToWindow` take UTF-8 text, not raw
        // bytes; input arrives as arbitrary terminal bytes (escape
        // sequences included), so it's written straight to the PTY.
        if self.runtime.type_keys_to_window_raw(id.session(), id.window(), &bytes).await.is_err() {
            return self
                .send(out_tx, &ServerMessage::Error {
                    code: "window_missing".to_owned(),
                    message: format!("no such window: {window_id}"),
                })
                .await;
        }
        true
    }

    async fn on_frame_event(
        &self,
        subscriptions: &mut HashMap<String, Subscription>,
        event: &FrameEvent,
        out_tx: &mpsc::Sender<String>,
    ) {
        let wire_id = event.window_id.to_string();
        let Some(sub) = subscriptions.get_mut(&wire_id) else { return };

        let windows = self.runtime.list_windows(Some(event.window_id.session())).await;
        let exited = windows
            .iter()
            .find(|w| w.window_name == event.window_id.window())
            .is_some_and(|w| matches!(w.status, WindowStatus::Exited));
        if exited {
            let info = windows.iter().find(|w| w.window_name == event.window_id.window());
            let (exit_code, signal) = info.map(|w| (w.exit_code, w.signal)).unwrap_or((None, None));
            self.send(out_tx, &ServerMessage::WindowExit { window_id: wire_id, exit_code, signal }).await;
            return;
        }

        let Some(frame) =
            self.runtime.get_window_frame(event.window_id.session(), event.window_id.window(), None, None).await
        else {
            if sub.should_emit_runtime_error() {
                self.send(out_tx, &ServerMessage::Error {
                    code: "runtime_error".to_owned(),
                    message: format!("failed to read frame for {wire_id}"),
                })
                .await;
            }
            return;
        };

        if let Some(emission) =
            sub.maybe_emit(&frame, Instant::now(), self.min_emit_interval, self.patch_threshold_ratio)
        {
            self.send(out_tx, &emission.plain).await;
            self.send(out_tx, &emission.styled).await;
        }
    }

    /// Serialize and enqueue `msg`. Returns `false` if the outbound queue is
    /// saturated, signaling the caller to drop the connection.
    async fn send(&self, out_tx: &mpsc::Sender<String>, msg: &ServerMessage) -> bool {
        let Ok(line) = serde_json::to_string(msg) else { return true };
        out_tx.try_send(line).is_ok()
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
