// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY Runtime (spec §4.B): manages child processes attached to PTYs,
//! routes input, and exposes per-window buffers, frames, and lifecycle
//! status. [`native`] spawns the raw PTY-attached child (direct or
//! `docker exec`); [`window`] owns the per-window state machine and the
//! [`window::PtyRuntime`] manager that implements the operations in §4.B.

pub mod native;
pub mod nbio;
pub mod window;

pub use native::{ExitStatus, NativePty};
pub use window::{FrameEvent, PtyRuntime, Window, WindowInfo, WindowStatus};
