// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_private_csi_with_params() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b[?1049h");
    assert_eq!(events.len(), 1);
    match &events[0] {
        QueryEvent::Csi(csi) => {
            assert!(csi.private);
            assert_eq!(csi.final_byte, b'h');
            assert_eq!(csi.param(0, 0), 1049);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn parses_non_private_csi() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b[6n");
    match &events[0] {
        QueryEvent::Csi(csi) => {
            assert!(!csi.private);
            assert_eq!(csi.final_byte, b'n');
            assert_eq!(csi.param(0, 0), 6);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn parses_dollar_p_intermediate() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b[?2004$p");
    match &events[0] {
        QueryEvent::Csi(csi) => {
            assert_eq!(csi.intermediates, vec![b'$']);
            assert_eq!(csi.final_byte, b'p');
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn sequence_split_across_scan_calls_still_resolves() {
    let mut scanner = QueryScanner::new();
    assert!(scanner.scan(b"\x1b[?10").is_empty());
    let events = scanner.scan(b"49h");
    assert_eq!(events.len(), 1);
    match &events[0] {
        QueryEvent::Csi(csi) => assert_eq!(csi.param(0, 0), 1049),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn osc_terminated_by_bel() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b]10;?\x07");
    assert_eq!(events[0], QueryEvent::Osc { ident: "10".to_owned(), data: "?".to_owned() });
}

#[test]
fn osc_terminated_by_string_terminator() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b]11;?\x1b\\");
    assert_eq!(events[0], QueryEvent::Osc { ident: "11".to_owned(), data: "?".to_owned() });
}

#[test]
fn apc_kitty_graphics_payload() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b_Gi=31337\x1b\\");
    assert_eq!(events[0], QueryEvent::Apc("Gi=31337".to_owned()));
}

#[test]
fn plain_text_and_unrelated_controls_produce_no_events() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"hello\r\nworld\x1b[31mtext");
    // \x1b[31m is a CSI `m` sequence; it's still recognized, just not acted
    // on by any caller — only non-escape bytes are silently dropped here.
    assert_eq!(events.len(), 1);
}

#[test]
fn multiple_sequences_in_one_buffer() {
    let mut scanner = QueryScanner::new();
    let events = scanner.scan(b"\x1b[?1049h\x1b[?1006h");
    assert_eq!(events.len(), 2);
}
