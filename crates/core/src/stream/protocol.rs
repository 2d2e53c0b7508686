// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Line-delimited JSON message types for the Stream Server (spec §4.C).

use serde::{Deserialize, Serialize};

use crate::vt::Segment;

/// A styled segment as it appears on the wire: style fields flattened onto
/// the segment rather than nested, per spec §4.C
/// `{text, fg?, bg?, bold?, italic?, underline?}` (the protocol omits
/// `inverse`, which the VT screen always resolves into `fg`/`bg` swap
/// before a snapshot is taken).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireSegment {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
}

impl From<&Segment> for WireSegment {
    fn from(seg: &Segment) -> Self {
        let (fg, bg) = if seg.style.inverse {
            (seg.style.bg.clone(), seg.style.fg.clone())
        } else {
            (seg.style.fg.clone(), seg.style.bg.clone())
        };
        Self {
            text: seg.text.clone(),
            fg,
            bg,
            bold: seg.style.bold,
            italic: seg.style.italic,
            underline: seg.style.underline,
        }
    }
}

/// A message from a TUI client to the stream server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Subscribe { window_id: String, cols: usize, rows: usize },
    Unsubscribe { window_id: String },
    /// Resize also implicitly re-subscribes at the new viewport.
    Resize { window_id: String, cols: usize, rows: usize },
    Input { window_id: String, bytes_base64: String },
    Focus { window_id: String },
}

/// A styled line as emitted on the wire: a run-length list of segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledLine {
    pub segments: Vec<WireSegment>,
}

impl StyledLine {
    pub fn from_segments(segments: &[Segment]) -> Self {
        Self { segments: segments.iter().map(WireSegment::from).collect() }
    }
}

/// A sparse line update within a patch message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOp {
    pub index: usize,
    pub line: StyledLine,
}

/// A message from the stream server to a subscribed client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Frame {
        seq: u64,
        window_id: String,
        lines: Vec<String>,
        cursor_row: usize,
        cursor_col: usize,
        cursor_visible: bool,
    },
    FrameStyled {
        seq: u64,
        window_id: String,
        lines: Vec<StyledLine>,
        cursor_row: usize,
        cursor_col: usize,
        cursor_visible: bool,
        line_count: usize,
    },
    Patch {
        seq: u64,
        window_id: String,
        line_count: usize,
        cursor_row: usize,
        cursor_col: usize,
        cursor_visible: bool,
        ops: Vec<PlainPatchOp>,
    },
    PatchStyled {
        seq: u64,
        window_id: String,
        line_count: usize,
        cursor_row: usize,
        cursor_col: usize,
        cursor_visible: bool,
        ops: Vec<PatchOp>,
    },
    WindowExit {
        window_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        exit_code: Option<i32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        signal: Option<i32>,
    },
    Error { code: String, message: String },
}

/// A sparse plain-text line update within a plain-text patch message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlainPatchOp {
    pub index: usize,
    pub line: String,
}
