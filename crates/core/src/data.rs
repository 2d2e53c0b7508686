// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Core data model shared across the bridge: window identifiers, instance
//! keys, and the read-only project records consumed from the state store.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Screen-size bounds a real PTY window is clamped into (spec §3 "Screen
/// state" invariants). The bare [`crate::vt::Screen`] type itself accepts
/// any size — these bounds are enforced at the PTY Runtime boundary, where
/// client-controlled `resize`/`subscribe` requests and window creation
/// enter the system.
pub const MIN_COLS: u16 = 20;
pub const MAX_COLS: u16 = 300;
pub const MIN_ROWS: u16 = 6;
pub const MAX_ROWS: u16 = 200;

/// Clamps a requested `(cols, rows)` viewport into the spec's bounded range.
pub fn clamp_screen_size(cols: u16, rows: u16) -> (u16, u16) {
    (cols.clamp(MIN_COLS, MAX_COLS), rows.clamp(MIN_ROWS, MAX_ROWS))
}

/// Canonical `"<sessionName>:<windowName>"` identifier for a PTY window.
///
/// Both halves must be non-empty and the string must contain exactly one
/// colon separator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId {
    session: String,
    window: String,
}

impl WindowId {
    /// Construct directly from validated parts.
    pub fn new(session: impl Into<String>, window: impl Into<String>) -> Self {
        Self { session: session.into(), window: window.into() }
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn window(&self) -> &str {
        &self.window
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.session, self.window)
    }
}

/// Error returned when parsing a malformed window identifier string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowIdParseError {
    WrongSeparatorCount(String),
    EmptySession(String),
    EmptyWindow(String),
}

impl fmt::Display for WindowIdParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongSeparatorCount(s) => {
                write!(f, "window id must contain exactly one ':' separator: {s:?}")
            }
            Self::EmptySession(s) => write!(f, "window id session half is empty: {s:?}"),
            Self::EmptyWindow(s) => write!(f, "window id window half is empty: {s:?}"),
        }
    }
}

impl std::error::Error for WindowIdParseError {}

impl std::str::FromStr for WindowId {
    type Err = WindowIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        let third = parts.next();
        if second.is_none() || third.is_some() {
            return Err(WindowIdParseError::WrongSeparatorCount(s.to_owned()));
        }
        let second = second.unwrap_or_default();
        if first.is_empty() {
            return Err(WindowIdParseError::EmptySession(s.to_owned()));
        }
        if second.is_empty() {
            return Err(WindowIdParseError::EmptyWindow(s.to_owned()));
        }
        Ok(Self { session: first.to_owned(), window: second.to_owned() })
    }
}

/// `(projectName, agentType, instanceId)` key identifying one agent instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    pub project_name: String,
    pub agent_type: String,
    pub instance_id: Option<String>,
}

impl InstanceKey {
    pub fn new(
        project_name: impl Into<String>,
        agent_type: impl Into<String>,
        instance_id: Option<String>,
    ) -> Self {
        Self { project_name: project_name.into(), agent_type: agent_type.into(), instance_id }
    }

    /// The instance-local key fragment: `instanceId` if present, else `agentType`.
    pub fn instance_key(&self) -> &str {
        self.instance_id.as_deref().unwrap_or(&self.agent_type)
    }

    /// The pending-tracker key: `"<projectName>:<instanceKey>"`.
    pub fn pending_key(&self) -> String {
        format!("{}:{}", self.project_name, self.instance_key())
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.pending_key())
    }
}

/// A single styled terminal cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Cell {
    /// The displayable grapheme cluster, possibly including appended
    /// combining marks.
    pub char: String,
    pub style: Style,
}

impl Cell {
    pub fn blank(style: Style) -> Self {
        Self { char: " ".to_owned(), style }
    }
}

/// Cell styling. Colors are `#rrggbb` hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Style {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fg: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bg: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub bold: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub italic: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub underline: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub inverse: bool,
}

/// Runtime kind for an agent instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeType {
    /// Driven through a PTY window managed by the PTY Runtime.
    Pty,
    /// Driven through an SDK runner registered by the host application.
    Sdk,
}

/// Container execution mode for a PTY-backed instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerMode {
    /// The agent runs as a direct child process on the host.
    Direct,
    /// The agent runs inside a Docker container via `docker exec`.
    Docker { container_id: String },
}

/// One instance entry within a [`ProjectRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceRecord {
    pub agent_type: String,
    pub tmux_window: String,
    pub channel_id: String,
    pub container: ContainerMode,
    pub runtime_type: RuntimeType,
}

/// Read-only project record as consumed from the project state store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub project_name: String,
    pub project_path: String,
    pub tmux_session: String,
    pub instances: std::collections::BTreeMap<String, InstanceRecord>,
}

impl ProjectRecord {
    /// Resolve an instance by explicit id, or fall back to the primary
    /// (first, in key order) instance of the given `agent_type`.
    pub fn resolve_instance(
        &self,
        agent_type: &str,
        instance_id: Option<&str>,
    ) -> Option<(&str, &InstanceRecord)> {
        if let Some(id) = instance_id {
            return self.instances.get(id).map(|rec| (id, rec));
        }
        self.instances
            .iter()
            .find(|(_, rec)| rec.agent_type == agent_type)
            .map(|(id, rec)| (id.as_str(), rec))
    }
}

#[cfg(test)]
#[path = "data_tests.rs"]
mod tests;
