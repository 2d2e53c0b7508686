// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn plain_lines(screen: &Screen) -> Vec<String> {
    screen.snapshot().lines.iter().map(|segs| segs.iter().map(|s| s.text.as_str()).collect()).collect()
}

#[test]
fn cell_count_invariant_holds_after_writes() {
    let mut screen = Screen::new(20, 5);
    screen.feed(b"hello\r\nworld\x1b[31mred text that is long enough to wrap across the row boundary");
    for segs in &screen.snapshot().lines {
        let len: usize = segs.iter().map(|s| s.text.chars().count()).sum();
        assert_eq!(len, 20);
    }
}

#[test]
fn sgr_truecolor_split_across_chunks() {
    // spec §8 scenario 1.
    let mut screen = Screen::new(20, 5);
    screen.feed(b"\x1b[38;2;255");
    screen.feed(b";255;255mWHITE\x1b[0m");
    let frame = screen.snapshot();
    let line0 = &frame.lines[0];
    let white_segment = line0.iter().find(|s| s.text.ends_with("WHITE")).expect("WHITE segment present");
    assert_eq!(white_segment.style.fg.as_deref(), Some("#ffffff"));
    assert!(!white_segment.text.contains(";255m"));
}

#[test]
fn deferred_wrap_scenario() {
    // spec §8 scenario 2.
    let mut screen = Screen::new(20, 5);
    screen.feed(b"ABCDEFGHIJ0123456789");
    screen.feed(b"\x1b[31m");
    screen.feed(b"X");
    let (row, col) = screen.cursor_position();
    assert_eq!((row, col), (1, 1));
    let lines = plain_lines(&screen);
    assert_eq!(lines[0], "ABCDEFGHIJ0123456789");
    assert!(lines[1].starts_with('X'));
}

#[test]
fn wide_character_does_not_split_at_right_edge() {
    let mut screen = Screen::new(5, 3);
    screen.feed("ABCD".as_bytes());
    screen.feed("漢".as_bytes());
    let lines = plain_lines(&screen);
    assert_eq!(lines[0].trim_end(), "ABCD");
    assert!(lines[1].starts_with('漢'));
}

#[test]
fn combining_mark_joins_preceding_cell() {
    let mut screen = Screen::new(10, 2);
    screen.feed("e".as_bytes());
    screen.feed("\u{0301}".as_bytes());
    let lines = plain_lines(&screen);
    assert!(lines[0].starts_with("e\u{0301}"));
}

#[test]
fn alt_screen_enter_and_leave_restores_primary_verbatim() {
    let mut screen = Screen::new(10, 3);
    screen.feed(b"primary content");
    screen.feed(b"\x1b[?1049h");
    assert!(screen.using_alt_screen());
    screen.feed(b"alt content");
    screen.feed(b"\x1b[?1049l");
    assert!(!screen.using_alt_screen());
    let lines = plain_lines(&screen);
    assert!(lines[0].starts_with("primary c"));
}

#[test]
fn reentering_alt_screen_is_noop() {
    let mut screen = Screen::new(10, 3);
    screen.feed(b"\x1b[?1049h");
    screen.feed(b"first");
    screen.feed(b"\x1b[?1049h");
    let lines = plain_lines(&screen);
    assert!(lines[0].starts_with("first"));
}

#[test]
fn scroll_region_insert_and_delete_lines() {
    let mut screen = Screen::new(10, 4);
    screen.feed(b"\x1b[1;4r"); // full region
    screen.feed(b"one\r\ntwo\r\nthree\r\nfour");
    screen.feed(b"\x1b[1;1H\x1b[1L"); // insert line at top
    let lines = plain_lines(&screen);
    assert!(lines[0].trim_end().is_empty());
    assert_eq!(lines[1].trim_end(), "one");
}

#[test]
fn decstbm_scroll_region_is_respected_on_linefeed() {
    let mut screen = Screen::new(10, 5);
    screen.feed(b"\x1b[2;4r"); // rows 2..4 (1-based) scroll region
    screen.feed(b"\x1b[1;1Htop");
    screen.feed(b"\x1b[2;1Ha\r\nb\r\nc\r\nd");
    let lines = plain_lines(&screen);
    assert_eq!(lines[0].trim_end(), "top");
}

#[test]
fn cursor_stays_in_bounds_after_motion() {
    let mut screen = Screen::new(10, 5);
    screen.feed(b"\x1b[100;100H");
    let (row, col) = screen.cursor_position();
    assert!(row < 5);
    assert!(col < 10);
}

#[test]
fn resize_pads_and_truncates_lines() {
    let mut screen = Screen::new(5, 2);
    screen.feed(b"abcde");
    screen.resize(8, 2);
    let lines = plain_lines(&screen);
    assert_eq!(lines[0].chars().count(), 8);
    screen.resize(3, 2);
    let lines = plain_lines(&screen);
    assert_eq!(lines[0].chars().count(), 3);
}

#[test]
fn ris_resets_to_blank_screen() {
    let mut screen = Screen::new(10, 2);
    screen.feed(b"dirty");
    screen.feed(b"\x1bc");
    let lines = plain_lines(&screen);
    assert!(lines[0].trim_end().is_empty());
    assert_eq!(screen.cursor_position(), (0, 0));
}

#[test]
fn private_mode_25_toggles_cursor_visibility() {
    let mut screen = Screen::new(5, 2);
    screen.feed(b"\x1b[?25l");
    assert!(!screen.cursor_visible());
    screen.feed(b"\x1b[?25h");
    assert!(screen.cursor_visible());
}

#[test]
fn unrecognized_private_mode_is_tracked_for_query() {
    let mut screen = Screen::new(5, 2);
    screen.feed(b"\x1b[?2004h");
    assert_eq!(screen.private_mode(2004), Some(true));
}
