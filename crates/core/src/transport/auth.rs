// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bearer-token authentication for the Hook Event Pipeline (spec §4.F):
//! "every non-GET endpoint requires `Authorization: Bearer <token>`
//! matching a shared secret loaded at startup."

use axum::extract::State;
use axum::http::{HeaderMap, Method, Request};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::BridgeError;

/// Constant-time string comparison to avoid a timing side-channel on the
/// shared-secret comparison.
fn constant_time_eq(a: &str, b: &str) -> bool {
    let a = a.as_bytes();
    let b = b.as_bytes();
    if a.len() != b.len() {
        return false;
    }
    let mut acc = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        acc |= x ^ y;
    }
    acc == 0
}

/// Validate a `Bearer` token from HTTP headers against the configured
/// shared secret. `Ok(())` when `expected` is `None` (auth disabled, e.g.
/// in tests) or the header matches.
pub fn validate_bearer(headers: &HeaderMap, expected: Option<&str>) -> Result<(), BridgeError> {
    let Some(expected) = expected else { return Ok(()) };

    let header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| BridgeError::unauthorized("missing Authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| BridgeError::unauthorized("Authorization header is not a Bearer token"))?;

    if constant_time_eq(token, expected) {
        Ok(())
    } else {
        Err(BridgeError::unauthorized("invalid bearer token"))
    }
}

/// Trait object carrying the hook token, so the middleware can be generic
/// over whatever application state a server wires it into.
pub trait HookTokenSource: Send + Sync + 'static {
    fn hook_token(&self) -> Option<&str>;
}

/// Axum middleware enforcing bearer auth on every non-`GET` request, and on
/// `GET` requests other than `/health` (spec §4.F: "every non-GET endpoint
/// requires ... ; all routes require bearer auth except health").
pub async fn auth_layer<S>(
    State(state): State<std::sync::Arc<S>>,
    req: Request<axum::body::Body>,
    next: Next,
) -> Response
where
    S: HookTokenSource,
{
    if req.uri().path() == "/health" && req.method() == Method::GET {
        return next.run(req).await;
    }

    if let Err(err) = validate_bearer(req.headers(), state.hook_token()) {
        return axum::response::IntoResponse::into_response(err);
    }

    next.run(req).await
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
