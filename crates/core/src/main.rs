// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `discode` binary entrypoint.
//!
//! The chat-platform client and project state store are external
//! collaborators this crate only consumes through the `ChatClient`/
//! `ProjectStore` traits — a concrete Discord/Slack SDK and persistence
//! layer belong in a small host binary, not here. This entrypoint parses
//! and validates configuration and reports that a host binary is needed to
//! supply both collaborators and call `discode_core::bridge::run`.

use clap::Parser;
use tracing::error;

use discode_core::config::Config;

#[tokio::main]
async fn main() {
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    discode_core::bridge::init_tracing(&config);
    error!(
        "discode-core has no chat client or project store compiled in; link this crate into a \
         host binary that supplies both and calls discode_core::bridge::run"
    );
    std::process::exit(1);
}
