// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::auth::Authenticator;
use crate::error::BrokerError;
use crate::model::Identity;
use crate::state::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Authenticate a request by header, falling back to a `?token=` value.
pub fn authenticate(
    auth: &dyn Authenticator,
    headers: &HeaderMap,
    query_token: Option<&str>,
) -> Result<Identity, BrokerError> {
    let token = bearer_token(headers).or(query_token).ok_or(BrokerError::Unauthorized)?;
    auth.verify(token)
}

/// Axum middleware that enforces bearer authentication and stores the
/// caller's [`Identity`] as a request extension.
///
/// Exempt: `/api/health` and the WebSocket upgrade (`/ws`), which
/// authenticates itself before upgrading.
pub async fn auth_layer(
    state: State<Arc<AppState>>,
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let path = req.uri().path();
    if path == "/api/health" || path == "/ws" {
        return next.run(req).await;
    }

    match authenticate(state.auth.as_ref(), req.headers(), None) {
        Ok(identity) => {
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(code) => code.to_http_response("unauthorized").into_response(),
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod tests;
