// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::Config;

fn parse(args: &[&str]) -> Config {
    Config::parse_from(args)
}

#[test]
fn defaults_are_correct() -> anyhow::Result<()> {
    let config = parse(&["discode"]);
    config.validate()?;
    assert_eq!(config.hook_port, 18470);
    assert_eq!(config.hook_host, "127.0.0.1");
    assert_eq!(config.buffer_fallback_initial_ms, 3000);
    assert_eq!(config.buffer_fallback_stable_ms, 2000);
    assert_eq!(config.submit_delay_ms, 0);
    assert!(!config.show_thinking);
    assert!(!config.show_usage);
    assert_eq!(config.pty_cols, 120);
    assert_eq!(config.pty_rows, 40);
    assert_eq!(config.min_emit_interval_ms, 50);
    assert_eq!(config.log_format, "json");
    assert_eq!(config.log_level, "info");
    Ok(())
}

#[test]
fn zero_hook_port_is_rejected() {
    let config = parse(&["discode", "--hook-port", "0"]);
    assert!(config.validate().is_err());
}

#[test]
fn patch_threshold_ratio_out_of_range_is_rejected() {
    let config = parse(&["discode", "--patch-threshold-ratio", "1.5"]);
    assert!(config.validate().is_err());
}

#[test]
fn invalid_log_format_is_rejected() {
    let config = parse(&["discode", "--log-format", "xml"]);
    assert!(config.validate().is_err());
}

#[test]
fn invalid_log_level_is_rejected() {
    let config = parse(&["discode", "--log-level", "verbose"]);
    assert!(config.validate().is_err());
}

#[test]
fn effective_scrollback_defaults_to_4x_rows() {
    let config = parse(&["discode", "--pty-rows", "40"]);
    assert_eq!(config.effective_scrollback_lines(), 160);
}

#[test]
fn explicit_scrollback_below_minimum_is_rejected() {
    let config = parse(&["discode", "--pty-rows", "40", "--scrollback-lines", "10"]);
    assert!(config.validate().is_err());
}

#[test]
fn stream_socket_defaults_to_pid_scoped_tmp_path() {
    let config = parse(&["discode"]);
    let path = config.effective_stream_socket();
    let name = path.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("discode-stream-"));
    assert!(name.ends_with(".sock"));
}

#[test]
fn explicit_stream_socket_is_honored() {
    let config = parse(&["discode", "--stream-socket", "/tmp/custom.sock"]);
    assert_eq!(config.effective_stream_socket(), std::path::PathBuf::from("/tmp/custom.sock"));
}
