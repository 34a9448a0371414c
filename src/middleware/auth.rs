// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session authentication for API routes.

use crate::error::AppError;
use crate::middleware::session::CurrentSession;
use axum::{extract::Request, middleware::Next, response::Response};

/// Middleware that requires a resolved session.
///
/// Runs after [`crate::middleware::session::load_session`] and exposes the
/// [`crate::models::Session`] as a request extension.
pub async fn require_session(mut request: Request, next: Next) -> Result<Response, AppError> {
    let session = request
        .extensions()
        .get::<CurrentSession>()
        .and_then(|current| current.0.clone())
        .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
