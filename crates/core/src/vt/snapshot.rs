// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Styled-frame snapshot types (spec §4.A "Snapshot").

use serde::{Deserialize, Serialize};

use crate::data::Style;

/// A run of adjacent cells sharing one style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub text: String,
    pub style: Style,
}

/// A rows×cols snapshot of a window's VT screen, rendered as styled segments
/// per line so a remote client can paint it without re-parsing escapes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledFrame {
    pub cols: usize,
    pub rows: usize,
    pub lines: Vec<Vec<Segment>>,
    pub cursor_row: usize,
    pub cursor_col: usize,
    pub cursor_visible: bool,
}
