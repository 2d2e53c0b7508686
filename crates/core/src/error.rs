// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Unified error taxonomy shared across the hook HTTP server and the
/// stream-socket protocol (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidPayload,
    MissingField,
    NotFound,
    Unauthorized,
    Unsupported,
    RuntimeError,
    ChatPlatformError,
    ProtocolError,
    Oversize,
}

impl ErrorKind {
    /// HTTP status this kind maps to on the hook endpoint (400/401/404/501;
    /// 500 is reserved for unexpected exceptions, not this taxonomy).
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::InvalidPayload | Self::MissingField | Self::Oversize => StatusCode::BAD_REQUEST,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Unsupported => StatusCode::NOT_IMPLEMENTED,
            Self::RuntimeError | Self::ChatPlatformError | Self::ProtocolError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Machine-readable code used in the stream-socket `error` frame and in
    /// HTTP JSON error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidPayload => "invalid_payload",
            Self::MissingField => "missing_field",
            Self::NotFound => "not_found",
            Self::Unauthorized => "unauthorized",
            Self::Unsupported => "unsupported",
            Self::RuntimeError => "runtime_error",
            Self::ChatPlatformError => "chat_platform_error",
            Self::ProtocolError => "protocol_error",
            Self::Oversize => "oversize",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error carrying an [`ErrorKind`] plus a human-readable message.
///
/// Returned from hook HTTP handlers (converted to a JSON body via
/// `IntoResponse`) and from stream-server protocol handling (converted to
/// an `error` frame, see [`crate::stream::protocol::ServerMessage::Error`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeError {
    pub kind: ErrorKind,
    pub message: String,
}

impl BridgeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidPayload, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(ErrorKind::MissingField, format!("missing field: {field}"))
    }
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for BridgeError {}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        let status = self.kind.http_status();
        let body =
            serde_json::json!({ "status": status.as_u16(), "message": self.message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
