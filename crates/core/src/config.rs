// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration, parsed with `clap` from CLI flags and `DISCODE_*`
//! environment variables (spec §4.F, §4.D).

use clap::Parser;

/// Bridge daemon coupling a chat platform to interactive coding-agent PTYs.
#[derive(Debug, Parser)]
#[command(name = "discode", version, about)]
pub struct Config {
    /// Port the agent hook HTTP server listens on.
    #[arg(long, env = "DISCODE_HOOK_PORT", default_value = "18470")]
    pub hook_port: u16,

    /// Host address the hook HTTP server binds to.
    #[arg(long, env = "DISCODE_HOOK_HOST", default_value = "127.0.0.1")]
    pub hook_host: String,

    /// Shared secret required on every hook route except `/health`.
    #[arg(long, env = "DISCODE_HOOK_TOKEN")]
    pub hook_token: Option<String>,

    /// Unix domain socket path for the Stream Server. Defaults to
    /// `<tmpdir>/discode-stream-<pid>.sock`.
    #[arg(long, env = "DISCODE_STREAM_SOCKET")]
    pub stream_socket: Option<String>,

    /// Delay before the buffer-fallback path takes its first screen capture.
    #[arg(long, env = "DISCODE_BUFFER_FALLBACK_INITIAL_MS", default_value = "3000")]
    pub buffer_fallback_initial_ms: u64,

    /// Interval between buffer-fallback re-checks once the frame has changed.
    #[arg(long, env = "DISCODE_BUFFER_FALLBACK_STABLE_MS", default_value = "2000")]
    pub buffer_fallback_stable_ms: u64,

    /// Delay between staging a message's text and sending Enter.
    #[arg(long, env = "DISCODE_SUBMIT_DELAY_MS", default_value = "0")]
    pub submit_delay_ms: u64,

    /// Surface the agent's "thinking" segments to the chat channel.
    #[arg(long, env = "DISCODE_SHOW_THINKING", default_value = "false")]
    pub show_thinking: bool,

    /// Surface token/cost usage summaries to the chat channel.
    #[arg(long, env = "DISCODE_SHOW_USAGE", default_value = "false")]
    pub show_usage: bool,

    /// PTY columns for newly started windows.
    #[arg(long, env = "DISCODE_PTY_COLS", default_value = "120")]
    pub pty_cols: u16,

    /// PTY rows for newly started windows.
    #[arg(long, env = "DISCODE_PTY_ROWS", default_value = "40")]
    pub pty_rows: u16,

    /// Primary-buffer scrollback capacity, in lines. Defaults to `rows * 4`
    /// when unset.
    #[arg(long, env = "DISCODE_SCROLLBACK_LINES")]
    pub scrollback_lines: Option<usize>,

    /// Minimum interval between stream-subscription flushes.
    #[arg(long, env = "DISCODE_MIN_EMIT_INTERVAL_MS", default_value = "50")]
    pub min_emit_interval_ms: u64,

    /// Fraction of changed lines, at or below which a patch is emitted
    /// instead of a full frame.
    #[arg(long, env = "DISCODE_PATCH_THRESHOLD_RATIO", default_value = "0.55")]
    pub patch_threshold_ratio: f64,

    /// Log format: `json` or `text`.
    #[arg(long, env = "DISCODE_LOG_FORMAT", default_value = "json")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "DISCODE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Validate the configuration after parsing.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.hook_port == 0 {
            anyhow::bail!("--hook-port must be nonzero");
        }
        if self.pty_cols == 0 || self.pty_rows == 0 {
            anyhow::bail!("--pty-cols and --pty-rows must be nonzero");
        }
        if let Some(lines) = self.scrollback_lines {
            if lines < self.pty_rows as usize * 4 {
                anyhow::bail!("--scrollback-lines must be at least rows * 4");
            }
        }
        if !(0.0..=1.0).contains(&self.patch_threshold_ratio) {
            anyhow::bail!("--patch-threshold-ratio must be within [0, 1]");
        }
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => anyhow::bail!("invalid log level: {other}"),
        }
        Ok(())
    }

    /// Effective stream-socket path, defaulting to a per-process path under
    /// the system temp directory.
    pub fn effective_stream_socket(&self) -> std::path::PathBuf {
        match &self.stream_socket {
            Some(path) => std::path::PathBuf::from(path),
            None => std::env::temp_dir().join(format!("discode-stream-{}.sock", std::process::id())),
        }
    }

    /// Effective scrollback line budget, defaulting to `rows * 4` (spec
    /// §4.A's minimum) when `--scrollback-lines` is unset.
    pub fn effective_scrollback_lines(&self) -> usize {
        self.scrollback_lines.unwrap_or(self.pty_rows as usize * 4)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
