// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::{Duration, Instant};

use crate::data::Style;
use crate::vt::{Segment, StyledFrame};

use super::*;

fn frame(lines: &[&str]) -> StyledFrame {
    StyledFrame {
        cols: 10,
        rows: lines.len(),
        lines: lines
            .iter()
            .map(|l| vec![Segment { text: (*l).to_owned(), style: Style::default() }])
            .collect(),
        cursor_row: 0,
        cursor_col: 0,
        cursor_visible: true,
    }
}

#[test]
fn first_emission_is_always_a_full_frame() {
    let mut sub = Subscription::new("s:w", 10, 2);
    let f = frame(&["a", "b"]);
    let emission = sub
        .maybe_emit(&f, Instant::now(), Duration::from_millis(50), 0.55)
        .expect("first frame always emits");
    assert!(matches!(emission.plain, ServerMessage::Frame { .. }));
    assert!(matches!(emission.styled, ServerMessage::FrameStyled { .. }));
}

#[test]
fn identical_frame_within_coalesce_window_is_dropped() {
    let mut sub = Subscription::new("s:w", 10, 2);
    let f = frame(&["a", "b"]);
    let now = Instant::now();
    sub.maybe_emit(&f, now, Duration::from_millis(50), 0.55).expect("baseline emits");
    let second = sub.maybe_emit(&f, now + Duration::from_millis(10), Duration::from_millis(50), 0.55);
    assert!(second.is_none());
}

#[test]
fn unchanged_frame_past_the_window_still_coalesces() {
    // Coalescing only suppresses *redundant* emissions; past the interval
    // with no substantive change there's still nothing new to say.
    let mut sub = Subscription::new("s:w", 10, 2);
    let f = frame(&["a", "b"]);
    let now = Instant::now();
    sub.maybe_emit(&f, now, Duration::from_millis(50), 0.55).expect("baseline emits");
    let second = sub.maybe_emit(&f, now + Duration::from_millis(100), Duration::from_millis(50), 0.55);
    assert!(second.is_none());
}

#[test]
fn small_change_past_window_emits_a_patch() {
    let mut sub = Subscription::new("s:w", 10, 3);
    let now = Instant::now();
    sub.maybe_emit(&frame(&["a", "b", "c"]), now, Duration::from_millis(50), 0.55).expect("baseline");
    let changed = sub
        .maybe_emit(
            &frame(&["a", "B", "c"]),
            now + Duration::from_millis(100),
            Duration::from_millis(50),
            0.55,
        )
        .expect("one changed line emits");
    match changed.plain {
        ServerMessage::Patch { ops, .. } => {
            assert_eq!(ops.len(), 1);
            assert_eq!(ops[0].index, 1);
            assert_eq!(ops[0].line, "B");
        }
        other => panic!("expected Patch, got {other:?}"),
    }
}

#[test]
fn large_change_past_window_emits_a_full_frame() {
    let mut sub = Subscription::new("s:w", 10, 2);
    let now = Instant::now();
    sub.maybe_emit(&frame(&["a", "b"]), now, Duration::from_millis(50), 0.55).expect("baseline");
    let changed = sub
        .maybe_emit(&frame(&["X", "Y"]), now + Duration::from_millis(100), Duration::from_millis(50), 0.55)
        .expect("both lines changed");
    assert!(matches!(changed.plain, ServerMessage::Frame { .. }));
}

#[test]
fn seq_is_monotonically_increasing() {
    let mut sub = Subscription::new("s:w", 10, 1);
    let now = Instant::now();
    let first = sub.maybe_emit(&frame(&["a"]), now, Duration::from_millis(50), 0.55).unwrap();
    let second = sub
        .maybe_emit(&frame(&["b"]), now + Duration::from_millis(100), Duration::from_millis(50), 0.55)
        .unwrap();
    let seq_of = |m: &ServerMessage| match m {
        ServerMessage::Frame { seq, .. } | ServerMessage::Patch { seq, .. } => *seq,
        _ => panic!("unexpected message"),
    };
    assert!(seq_of(&second.plain) > seq_of(&first.plain));
}

#[test]
fn runtime_error_emits_at_most_once_until_next_success() {
    let mut sub = Subscription::new("s:w", 10, 1);
    assert!(sub.should_emit_runtime_error());
    assert!(!sub.should_emit_runtime_error());
    sub.maybe_emit(&frame(&["a"]), Instant::now(), Duration::from_millis(50), 0.55);
    assert!(sub.should_emit_runtime_error());
}
