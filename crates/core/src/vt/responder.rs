// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal query responder (spec §4.A "Terminal responses"). Parses PTY
//! output independently of [`super::screen::Screen`] and produces the bytes
//! that must be written back to the PTY for query sequences the agent
//! process may send (cursor position, device status, private-mode state,
//! window size, color queries, kitty graphics). `avt::Vt` has no hook for
//! these — the screen's own emulation and the responder's query scanning
//! are deliberately separate passes over the same bytes.

use std::collections::HashMap;

use super::color::palette_256;
use super::query::{CsiParams, QueryEvent, QueryScanner};

/// Per-window state the responder needs to answer queries; distinct from
/// [`super::screen::Screen`]'s own fields since the responder never mutates
/// the screen, only reads a consistent view of it at feed time.
pub struct ResponderState {
    pub cols: usize,
    pub rows: usize,
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub private_modes: HashMap<u16, bool>,
}

/// Fixed foreground/background colors reported for OSC 10/11 queries.
const FIXED_FG: &str = "rgb:e5e5/e5e5/e5e5";
const FIXED_BG: &str = "rgb:0a0a/0a0a/0a0a";

/// Independent streaming scanner that recognizes query escape sequences and
/// emits the response bytes to write back to the PTY.
#[derive(Default)]
pub struct Responder {
    scanner: QueryScanner,
}

impl Responder {
    pub fn new() -> Self {
        Self { scanner: QueryScanner::new() }
    }

    /// Feed the same raw bytes given to the screen; returns any bytes that
    /// must be written back to the PTY immediately.
    pub fn feed(&mut self, data: &[u8], state: &ResponderState) -> Vec<u8> {
        let mut out = Vec::new();
        for event in self.scanner.scan(data) {
            match &event {
                QueryEvent::Csi(csi) => respond_csi(csi, state, &mut out),
                QueryEvent::Osc { ident, data } => respond_osc(ident, data, &mut out),
                QueryEvent::Apc(payload) => respond_apc(payload, &mut out),
            }
        }
        out
    }
}

fn respond_csi(csi: &CsiParams, state: &ResponderState, out: &mut Vec<u8>) {
    match csi.final_byte {
        b'n' => match csi.param(0, 0) {
            6 => out.extend(format!("\x1b[{};{}R", state.cursor_row + 1, state.cursor_col + 1).into_bytes()),
            5 => out.extend(b"\x1b[0n"),
            _ => {}
        },
        b'u' if csi.private => out.extend(b"\x1b[?0u"),
        b't' if csi.param(0, 0) == 14 => {
            out.extend(format!("\x1b[4;{};{}t", state.rows * 20, state.cols * 10).into_bytes())
        }
        b'c' if csi.private => {}
        b'c' => out.extend(b"\x1b[?1;2c"),
        b'p' if csi.private && csi.intermediates.first() == Some(&b'$') => {
            let mode = csi.param(0, 0);
            let enabled = state
                .private_modes
                .get(&mode)
                .copied()
                .unwrap_or(matches!(mode, 7 | 25));
            let flag = if enabled { 1 } else { 2 };
            out.extend(format!("\x1b[?{mode};{flag}$y").into_bytes());
        }
        _ => {}
    }
}

fn respond_osc(ident: &str, data: &str, out: &mut Vec<u8>) {
    match ident {
        "10" if data == "?" => out.extend(format!("\x1b]10;{FIXED_FG}\x07").into_bytes()),
        "11" if data == "?" => out.extend(format!("\x1b]11;{FIXED_BG}\x07").into_bytes()),
        "4" => {
            let Some((index, query)) = data.split_once(';') else { return };
            if query != "?" {
                return;
            }
            let Ok(index) = index.parse::<u8>() else { return };
            let hex = palette_256(index);
            out.extend(format!("\x1b]4;{index};{}\x07", expand_hex_rgb(&hex)).into_bytes());
        }
        _ => {}
    }
}

fn respond_apc(payload: &str, out: &mut Vec<u8>) {
    if payload.starts_with('G') {
        out.extend(b"\x1b_Gi=31337;OK\x1b\\");
    }
}

/// Turn `"#rrggbb"` into xterm's doubled-hex color-report form
/// `"rrrr/gggg/bbbb"`.
fn expand_hex_rgb(hex: &str) -> String {
    let hex = hex.trim_start_matches('#');
    let mut parts = Vec::with_capacity(3);
    for chunk in hex.as_bytes().chunks(2) {
        let pair = std::str::from_utf8(chunk).unwrap_or("00");
        parts.push(format!("{pair}{pair}"));
    }
    parts.join("/")
}

#[cfg(test)]
#[path = "responder_tests.rs"]
mod tests;
