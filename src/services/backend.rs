// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Interface to the hosted auth/database provider.
//!
//! Everything this application knows about identities and stored rows goes
//! through this trait. The hosted implementation lives in
//! [`crate::services::supabase`]; [`crate::services::memory`] keeps the same
//! contract in process for offline development and tests.

use crate::error::AppError;
use crate::models::{AuthUser, OAuthProvider, Session};
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Look up the user owning an access token.
    ///
    /// Returns [`AppError::InvalidToken`] when the token is expired or revoked.
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError>;

    /// Exchange an OAuth authorization code (PKCE flow) for a session.
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Session, AppError>;

    /// Sign in with email and password.
    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<Session, AppError>;

    /// Register an email/password account.
    ///
    /// Returns `None` when the project requires the address to be confirmed
    /// first; the confirmation link then returns to `redirect_to` with an
    /// authorization code for `code_challenge`.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<Session>, AppError>;

    /// Send a password reset link for `email`. Like sign-up confirmation,
    /// the link returns to `redirect_to` with a code for `code_challenge`.
    ///
    /// Unknown addresses are not reported.
    async fn recover_password(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), AppError>;

    /// Set a new password for the user behind an access token.
    async fn update_password(&self, access_token: &str, password: &str)
        -> Result<AuthUser, AppError>;

    /// Trade a refresh token for a new session.
    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError>;

    /// Revoke the session behind an access token.
    async fn sign_out(&self, access_token: &str) -> Result<(), AppError>;

    /// Merge `data` into the user's metadata.
    async fn update_user_metadata(
        &self,
        access_token: &str,
        data: Value,
    ) -> Result<AuthUser, AppError>;

    /// URL that starts an external sign-in with the given provider.
    fn authorize_url(&self, provider: OAuthProvider, redirect_to: &str, code_challenge: &str)
        -> String;

    /// Fetch exactly one row of `collection` where `column` equals `value`.
    ///
    /// `columns` is a comma-separated projection. Returns
    /// [`AppError::NotFound`] when no row matches.
    async fn select_single(
        &self,
        access_token: &str,
        collection: &str,
        column: &str,
        value: &str,
        columns: &str,
    ) -> Result<Value, AppError>;

    /// Insert a row, or merge it into the existing row with the same `id`.
    async fn upsert(&self, access_token: &str, collection: &str, row: Value)
        -> Result<(), AppError>;
}
