// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authorize endpoint of the in-memory provider.
//!
//! Offline, external sign-in links point here instead of the hosted auth
//! API. The "login" succeeds at once as the provider's local identity and
//! the browser goes back to the callback with a code.

use crate::error::{AppError, Result};
use crate::models::OAuthProvider;
use crate::AppState;
use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/v1/authorize", get(authorize))
}

#[derive(Deserialize)]
pub struct AuthorizeParams {
    provider: String,
    redirect_to: String,
    code_challenge: String,
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect> {
    let provider = state
        .offline_provider
        .as_ref()
        .ok_or_else(|| AppError::NotFound("Offline provider is not enabled".to_string()))?;
    let oauth_provider: OAuthProvider = params.provider.parse().map_err(AppError::BadRequest)?;

    let url = provider.complete_external_sign_in(
        oauth_provider,
        &params.redirect_to,
        &params.code_challenge,
    );
    tracing::info!(provider = %oauth_provider, "Offline external sign-in");
    Ok(Redirect::to(&url))
}
