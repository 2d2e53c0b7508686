// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The VT screen (spec §4.A): a thin wrapper around `avt::Vt`, the real
//! terminal emulator backing this module. `avt` owns the parser, SGR/color
//! resolution, wide/combining-character width, scroll regions, and the
//! alt-screen buffer switch itself; this wrapper only adds the UTF-8 carry
//! buffering a chunked byte stream needs, and the DEC-private-mode tracking
//! `avt` doesn't expose (alt-screen status and arbitrary mode state for
//! `CSI ?Ps$p` queries) via the narrow [`QueryScanner`](super::query::QueryScanner).

use std::collections::HashMap;

use crate::data::Style;

use super::query::{QueryEvent, QueryScanner};
use super::snapshot::{Segment, StyledFrame};

/// DEC private modes that toggle the alternate screen buffer.
const ALT_SCREEN_MODES: [u16; 3] = [47, 1047, 1049];

/// Per-window VT screen, backed by [`avt::Vt`].
pub struct Screen {
    vt: avt::Vt,
    alt_screen: bool,
    private_modes: HashMap<u16, bool>,
    mode_scanner: QueryScanner,
    /// Buffer for incomplete UTF-8 trailing bytes between `feed()` calls.
    utf8_buf: [u8; 3],
    utf8_buf_len: u8,
}

impl std::fmt::Debug for Screen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Screen")
            .field("alt_screen", &self.alt_screen)
            .field("private_modes", &self.private_modes)
            .finish()
    }
}

/// Returns the number of trailing bytes in `data` that form an incomplete
/// UTF-8 sequence (0 when the tail is complete, or pure ASCII).
fn incomplete_utf8_tail_len(data: &[u8]) -> usize {
    let len = data.len();
    for i in 1..=len.min(3) {
        let byte = data[len - i];
        if byte < 0x80 {
            return 0;
        }
        if byte >= 0xc0 {
            let expected = if byte < 0xe0 {
                2
            } else if byte < 0xf0 {
                3
            } else {
                4
            };
            return if i < expected { i } else { 0 };
        }
    }
    0
}

impl Screen {
    /// Construct a screen with `avt`'s default (unbounded) scrollback.
    pub fn new(cols: usize, rows: usize) -> Self {
        Self::with_scrollback(cols, rows, usize::MAX)
    }

    /// Construct a screen whose primary-buffer scrollback is capped at
    /// `scrollback_lines`, via `avt::Vt::builder().scrollback_limit(..)`.
    pub fn with_scrollback(cols: usize, rows: usize, scrollback_lines: usize) -> Self {
        let cols = cols.max(1);
        let rows = rows.max(1);
        Self {
            vt: avt::Vt::builder().size(cols, rows).scrollback_limit(scrollback_lines).build(),
            alt_screen: false,
            private_modes: HashMap::new(),
            mode_scanner: QueryScanner::new(),
            utf8_buf: [0; 3],
            utf8_buf_len: 0,
        }
    }

    pub fn cols(&self) -> usize {
        self.vt.size().0
    }

    pub fn rows(&self) -> usize {
        self.vt.size().1
    }

    pub fn cursor_position(&self) -> (usize, usize) {
        let cursor = self.vt.cursor();
        (cursor.row, cursor.col)
    }

    pub fn cursor_visible(&self) -> bool {
        self.vt.cursor().visible
    }

    pub fn using_alt_screen(&self) -> bool {
        self.alt_screen
    }

    pub fn private_mode(&self, code: u16) -> Option<bool> {
        self.private_modes.get(&code).copied()
    }

    /// Snapshot of every tracked DEC private mode, for the responder's `CSI
    /// ?Ps$p` query — cursor visibility (mode 25) comes from `avt` itself
    /// rather than from our own tracking, since DECTCEM is handled inside
    /// `avt::Vt`.
    pub fn private_modes_snapshot(&self) -> HashMap<u16, bool> {
        let mut modes = self.private_modes.clone();
        modes.insert(25, self.cursor_visible());
        modes
    }

    /// Feed a chunk of raw PTY output into the underlying `avt::Vt`, and
    /// scan the same bytes for DEC private mode changes `avt` doesn't
    /// surface on its own.
    pub fn feed(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        self.track_private_modes(data);

        let buf_len = self.utf8_buf_len as usize;
        let owned: Vec<u8>;
        let input = if buf_len == 0 {
            data
        } else {
            owned = [&self.utf8_buf[..buf_len], data].concat();
            self.utf8_buf_len = 0;
            &owned
        };

        let tail = incomplete_utf8_tail_len(input);
        let (to_feed, to_buffer) = input.split_at(input.len() - tail);

        if !to_buffer.is_empty() {
            self.utf8_buf[..to_buffer.len()].copy_from_slice(to_buffer);
            self.utf8_buf_len = to_buffer.len() as u8;
        }

        if !to_feed.is_empty() {
            let s = String::from_utf8_lossy(to_feed);
            let _ = self.vt.feed_str(&s);
        }
    }

    fn track_private_modes(&mut self, data: &[u8]) {
        for event in self.mode_scanner.scan(data) {
            let QueryEvent::Csi(csi) = event else { continue };
            if !csi.private {
                continue;
            }
            let enabled = match csi.final_byte {
                b'h' => true,
                b'l' => false,
                _ => continue,
            };
            for param in &csi.params {
                let Some(code) = param else { continue };
                if ALT_SCREEN_MODES.contains(code) {
                    self.alt_screen = enabled;
                }
                self.private_modes.insert(*code, enabled);
            }
        }
    }

    /// Resize the viewport.
    pub fn resize(&mut self, cols: usize, rows: usize) {
        let _ = self.vt.resize(cols.max(1), rows.max(1));
    }

    /// Styled snapshot of the current viewport.
    pub fn snapshot(&self) -> StyledFrame {
        let (cols, rows) = self.vt.size();
        let cursor = self.vt.cursor();
        let lines = self.vt.view().map(segment_line).collect();
        StyledFrame {
            cols,
            rows,
            lines,
            cursor_row: cursor.row,
            cursor_col: cursor.col,
            cursor_visible: cursor.visible,
        }
    }

    /// Plain-text rendering of the viewport with trailing blank lines trimmed.
    pub fn plain_text_buffer(&self) -> String {
        let mut rendered: Vec<String> = self.vt.view().map(|line| line.text()).collect();
        while rendered.last().is_some_and(|line| line.trim_end().is_empty()) {
            rendered.pop();
        }
        rendered.iter().map(|line| line.trim_end()).collect::<Vec<_>>().join("\n")
    }
}

fn color_to_hex(color: avt::Color) -> String {
    match color {
        avt::Color::Indexed(index) => super::color::palette_256(index),
        avt::Color::RGB(rgb) => super::color::truecolor(rgb.r, rgb.g, rgb.b),
    }
}

fn style_from_pen(pen: &avt::Pen) -> Style {
    Style {
        fg: pen.foreground().map(color_to_hex),
        bg: pen.background().map(color_to_hex),
        bold: pen.is_bold(),
        italic: pen.is_italic(),
        underline: pen.is_underline(),
        inverse: pen.is_inverse(),
    }
}

fn segment_line(line: &avt::Line) -> Vec<Segment> {
    let mut segments: Vec<Segment> = Vec::new();
    for cells in line.chunks(|c1, c2| c1.pen() != c2.pen()) {
        let style = style_from_pen(cells[0].pen());
        let text: String = cells.iter().map(|cell| cell.char()).collect();
        segments.push(Segment { text, style });
    }
    if segments.is_empty() {
        segments.push(Segment { text: String::new(), style: Style::default() });
    }
    segments
}

#[cfg(test)]
#[path = "screen_tests.rs"]
mod tests;
