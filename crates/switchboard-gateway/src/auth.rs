// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bearer-token authentication for the gateway.
//!
//! `/v1` routes go through [`auth_middleware`]; the websocket handshake
//! checks the same [`AuthConfig`] by hand because browser clients can
//! only pass the token as a query param.
//!
//! With no token configured the gateway is open. That is the documented
//! local-development mode; `serve` logs a warning at startup when it is
//! active.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};

/// Token policy shared by the REST middleware and the websocket handshake.
#[derive(Clone)]
pub struct AuthConfig {
    /// Expected bearer token. `None` disables auth.
    pub bearer_token: Option<String>,
}

impl AuthConfig {
    /// Whether a presented token satisfies the configured policy.
    pub fn allows(&self, presented: Option<&str>) -> bool {
        match &self.bearer_token {
            Some(expected) => presented == Some(expected.as_str()),
            None => true,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field(
                "bearer_token",
                &self.bearer_token.as_ref().map(|_| "[redacted]"),
            )
            .finish()
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_from_headers(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Middleware that validates the bearer token on `/v1` routes.
pub async fn auth_middleware(
    State(auth): State<AuthConfig>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let presented = bearer_from_headers(request.headers());
    if auth.allows(presented) {
        Ok(next.run(request).await)
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}
