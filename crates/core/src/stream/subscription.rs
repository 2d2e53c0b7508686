// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-subscription flush policy (spec §4.C "Flush policy"): coalesces
//! redundant frames, decides between a full frame and a sparse patch, and
//! stamps each emission with a monotonically increasing `seq`.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::{Duration, Instant};

use crate::vt::StyledFrame;

use super::protocol::{PatchOp, PlainPatchOp, ServerMessage, StyledLine};

/// One client's subscription to one window's frame stream.
pub struct Subscription {
    window_id: String,
    cols: usize,
    rows: usize,
    seq: u64,
    last_plain: Option<Vec<String>>,
    last_styled_sig: Option<Vec<u64>>,
    last_cursor: Option<(usize, usize, bool)>,
    last_emit: Option<Instant>,
    runtime_error_emitted: bool,
}

/// The two wire messages produced for one emitted frame: the plain-text
/// variant and the styled variant, sharing one `seq`.
pub struct Emission {
    pub plain: ServerMessage,
    pub styled: ServerMessage,
}

impl Subscription {
    pub fn new(window_id: impl Into<String>, cols: usize, rows: usize) -> Self {
        Self {
            window_id: window_id.into(),
            cols,
            rows,
            seq: 0,
            last_plain: None,
            last_styled_sig: None,
            last_cursor: None,
            last_emit: None,
            runtime_error_emitted: false,
        }
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    pub fn viewport(&self) -> (usize, usize) {
        (self.cols, self.rows)
    }

    pub fn resize(&mut self, cols: usize, rows: usize) {
        self.cols = cols;
        self.rows = rows;
        // Force a full frame on the next emission rather than a patch
        // against a now-stale line count.
        self.last_plain = None;
        self.last_styled_sig = None;
    }

    /// Decide whether to emit for this `frame`, honoring the `minEmitIntervalMs`
    /// coalescing window and the `patchThresholdRatio` full-vs-patch choice.
    /// Returns `None` when the flush is coalesced.
    pub fn maybe_emit(
        &mut self,
        frame: &StyledFrame,
        now: Instant,
        min_emit_interval: Duration,
        patch_threshold_ratio: f64,
    ) -> Option<Emission> {
        let plain: Vec<String> =
            frame.lines.iter().map(|segs| segs.iter().map(|s| s.text.as_str()).collect()).collect();
        let styled_sig: Vec<u64> = frame.lines.iter().map(|segs| hash_line(segs)).collect();
        let cursor = (frame.cursor_row, frame.cursor_col, frame.cursor_visible);

        let within_coalesce_window =
            self.last_emit.is_some_and(|last| now.duration_since(last) < min_emit_interval);
        let unchanged =
            self.last_plain.as_ref() == Some(&plain) && self.last_styled_sig.as_ref() == Some(&styled_sig)
                && self.last_cursor == Some(cursor);
        if within_coalesce_window && unchanged {
            return None;
        }

        let changed_lines = match (&self.last_plain, &self.last_styled_sig) {
            (Some(prev_plain), Some(prev_sig)) if prev_plain.len() == plain.len() => prev_plain
                .iter()
                .zip(&plain)
                .zip(prev_sig.iter().zip(&styled_sig))
                .filter(|((a, b), (c, d))| a != b || c != d)
                .count(),
            _ => plain.len(),
        };
        let ratio = if plain.is_empty() { 0.0 } else { changed_lines as f64 / plain.len() as f64 };
        let baseline = if ratio <= patch_threshold_ratio {
            self.last_plain.as_ref().zip(self.last_styled_sig.as_ref())
        } else {
            None
        };

        self.seq += 1;
        let seq = self.seq;
        let window_id = self.window_id.clone();

        let emission = if let Some((prev_plain, prev_sig)) = baseline {
            let mut plain_ops = Vec::new();
            let mut styled_ops = Vec::new();
            for (i, ((line, sig), (prev_line, prev_s))) in
                plain.iter().zip(&styled_sig).zip(prev_plain.iter().zip(prev_sig)).enumerate()
            {
                if line != prev_line || sig != prev_s {
                    plain_ops.push(PlainPatchOp { index: i, line: line.clone() });
                    styled_ops.push(PatchOp { index: i, line: StyledLine::from_segments(&frame.lines[i]) });
                }
            }
            Emission {
                plain: ServerMessage::Patch {
                    seq,
                    window_id: window_id.clone(),
                    line_count: plain.len(),
                    cursor_row: frame.cursor_row,
                    cursor_col: frame.cursor_col,
                    cursor_visible: frame.cursor_visible,
                    ops: plain_ops,
                },
                styled: ServerMessage::PatchStyled {
                    seq,
                    window_id,
                    line_count: plain.len(),
                    cursor_row: frame.cursor_row,
                    cursor_col: frame.cursor_col,
                    cursor_visible: frame.cursor_visible,
                    ops: styled_ops,
                },
            }
        } else {
            Emission {
                plain: ServerMessage::Frame {
                    seq,
                    window_id: window_id.clone(),
                    lines: plain.clone(),
                    cursor_row: frame.cursor_row,
                    cursor_col: frame.cursor_col,
                    cursor_visible: frame.cursor_visible,
                },
                styled: ServerMessage::FrameStyled {
                    seq,
                    window_id,
                    lines: frame.lines.iter().map(|s| StyledLine::from_segments(s)).collect(),
                    cursor_row: frame.cursor_row,
                    cursor_col: frame.cursor_col,
                    cursor_visible: frame.cursor_visible,
                    line_count: plain.len(),
                },
            }
        };

        self.last_plain = Some(plain);
        self.last_styled_sig = Some(styled_sig);
        self.last_cursor = Some(cursor);
        self.last_emit = Some(now);
        self.runtime_error_emitted = false;
        Some(emission)
    }

    /// Returns `true` and marks the flag if a `runtime_error` has not
    /// already been emitted for this subscription since its last
    /// successful frame.
    pub fn should_emit_runtime_error(&mut self) -> bool {
        if self.runtime_error_emitted {
            return false;
        }
        self.runtime_error_emitted = true;
        true
    }
}

fn hash_line(segments: &[crate::vt::Segment]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for seg in segments {
        seg.text.hash(&mut hasher);
        seg.style.fg.hash(&mut hasher);
        seg.style.bg.hash(&mut hasher);
        seg.style.bold.hash(&mut hasher);
        seg.style.italic.hash(&mut hasher);
        seg.style.underline.hash(&mut hasher);
        seg.style.inverse.hash(&mut hasher);
    }
    hasher.finish()
}

#[cfg(test)]
#[path = "subscription_tests.rs"]
mod tests;
