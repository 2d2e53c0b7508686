// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ANSI/VT terminal emulation (spec §4.A), backed by `avt::Vt`. Consumes a
//! byte stream, maintains styled screen state, and produces frame
//! snapshots, plus the independent query responder and DEC-mode tracking
//! `avt` itself doesn't surface. No I/O: the PTY runtime owns reading bytes
//! in and writing responder output back out.

mod color;
mod query;
mod responder;
mod screen;
mod snapshot;

pub use responder::{Responder, ResponderState};
pub use screen::Screen;
pub use snapshot::{Segment, StyledFrame};
