// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session client: the single entry point to the auth/database provider.
//!
//! Constructed once at startup and injected through [`crate::AppState`].
//! Besides passing calls through to the [`Backend`], it:
//! - resolves cookie tokens into a [`Session`], refreshing when needed
//! - publishes session changes to subscribers
//! - offers typed reads and upserts over named collections

use crate::error::AppError;
use crate::models::{AuthUser, OAuthProvider, Session, SessionTokens};
use crate::services::backend::Backend;
use crate::time_utils::unix_now;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Buffered events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 64;

/// Audience claim on provider-issued access tokens.
const TOKEN_AUDIENCE: &str = "authenticated";

/// Kind of session change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    SignedIn,
    SignedOut,
    TokenRefreshed,
    UserUpdated,
}

/// A change to some user's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEvent {
    pub kind: SessionEventKind,
    pub user_id: String,
}

/// Live subscription to session events. Dropping it unsubscribes.
pub struct SessionSubscription {
    rx: broadcast::Receiver<SessionEvent>,
}

impl SessionSubscription {
    /// Wait for the next event.
    ///
    /// Returns `RecvError::Lagged` if events were missed and
    /// `RecvError::Closed` once the client is gone.
    pub async fn recv(&mut self) -> Result<SessionEvent, broadcast::error::RecvError> {
        self.rx.recv().await
    }
}

/// A session resolved from cookies.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub session: Session,
    /// The access token was replaced; cookies must be rewritten.
    pub refreshed: bool,
}

/// Claims carried by provider access tokens.
#[derive(Debug, Deserialize)]
struct AccessClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Value,
}

#[derive(Clone)]
pub struct SessionClient {
    backend: Arc<dyn Backend>,
    jwt_secret: Option<Arc<[u8]>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionClient {
    pub fn new(backend: Arc<dyn Backend>, jwt_secret: Option<&[u8]>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            jwt_secret: jwt_secret.map(Arc::from),
            events,
        }
    }

    /// Subscribe to session changes for the lifetime of the returned handle.
    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.events.subscribe(),
        }
    }

    fn emit(&self, kind: SessionEventKind, user_id: &str) {
        tracing::debug!(user_id, ?kind, "Session event");
        // No receivers is fine
        let _ = self.events.send(SessionEvent {
            kind,
            user_id: user_id.to_string(),
        });
    }

    // ─── Sessions ────────────────────────────────────────────────

    /// Resolve the current session from cookie tokens.
    ///
    /// Returns `None` when there is no usable session. An expired or revoked
    /// access token is replaced using the refresh token when possible.
    pub async fn get_current_session(
        &self,
        tokens: &SessionTokens,
    ) -> Result<Option<ResolvedSession>, AppError> {
        if let Some(access_token) = tokens.access_token.as_deref() {
            match self.validate_access_token(access_token).await {
                Ok(user) => {
                    let session = Session {
                        access_token: access_token.to_string(),
                        refresh_token: tokens.refresh_token.clone().unwrap_or_default(),
                        expires_at: token_expiry(access_token).unwrap_or_else(unix_now),
                        user,
                    };
                    return Ok(Some(ResolvedSession {
                        session,
                        refreshed: false,
                    }));
                }
                Err(e) if e.is_auth_error() => {
                    tracing::debug!("Access token rejected, trying refresh");
                }
                Err(e) => return Err(e),
            }
        }

        let Some(refresh_token) = tokens.refresh_token.as_deref() else {
            return Ok(None);
        };

        match self.backend.refresh_session(refresh_token).await {
            Ok(session) => {
                self.emit(SessionEventKind::TokenRefreshed, session.user_id());
                Ok(Some(ResolvedSession {
                    session,
                    refreshed: true,
                }))
            }
            Err(e) if e.is_auth_error() => Ok(None),
            Err(AppError::Provider(msg)) => {
                tracing::warn!(error = %msg, "Session refresh failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Check an access token, locally when a JWT secret is configured.
    async fn validate_access_token(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let Some(secret) = self.jwt_secret.as_deref() else {
            return self.backend.get_user(access_token).await;
        };

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[TOKEN_AUDIENCE]);

        let data = decode::<AccessClaims>(
            access_token,
            &DecodingKey::from_secret(secret),
            &validation,
        )
        .map_err(|e| {
            tracing::debug!(error = %e, "Access token failed local verification");
            AppError::InvalidToken
        })?;

        Ok(AuthUser {
            id: data.claims.sub,
            email: data.claims.email,
            user_metadata: data.claims.user_metadata,
        })
    }

    /// Fetch the user behind a session from the provider.
    pub async fn get_current_user(&self, session: &Session) -> Result<AuthUser, AppError> {
        self.backend.get_user(&session.access_token).await
    }

    /// Exchange an OAuth code for a session.
    pub async fn exchange_code_for_session(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<Session, AppError> {
        let session = self.backend.exchange_code(code, code_verifier).await?;
        self.emit(SessionEventKind::SignedIn, session.user_id());
        Ok(session)
    }

    /// Sign in with email and password.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let session = self.backend.sign_in_with_password(email, password).await?;
        self.emit(SessionEventKind::SignedIn, session.user_id());
        Ok(session)
    }

    /// Register an email/password account; signed in unless the address
    /// must be confirmed first.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<Session>, AppError> {
        let session = self
            .backend
            .sign_up(email, password, redirect_to, code_challenge)
            .await?;
        if let Some(session) = &session {
            self.emit(SessionEventKind::SignedIn, session.user_id());
        }
        Ok(session)
    }

    /// Ask the provider to mail a password reset link.
    pub async fn recover_password(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), AppError> {
        self.backend
            .recover_password(email, redirect_to, code_challenge)
            .await
    }

    /// Set a new password for the signed-in user.
    pub async fn update_password(
        &self,
        session: &Session,
        password: &str,
    ) -> Result<AuthUser, AppError> {
        let user = self
            .backend
            .update_password(&session.access_token, password)
            .await?;
        self.emit(SessionEventKind::UserUpdated, &user.id);
        Ok(user)
    }

    /// Sign out at the provider.
    ///
    /// Subscribers are told the user signed out even if the provider call
    /// fails, since callers drop the local session either way.
    pub async fn sign_out(&self, session: &Session) -> Result<(), AppError> {
        let result = self.backend.sign_out(&session.access_token).await;
        self.emit(SessionEventKind::SignedOut, session.user_id());
        result
    }

    /// Merge `data` into the user's metadata.
    pub async fn update_user_metadata(
        &self,
        session: &Session,
        data: serde_json::Value,
    ) -> Result<AuthUser, AppError> {
        let user = self
            .backend
            .update_user_metadata(&session.access_token, data)
            .await?;
        self.emit(SessionEventKind::UserUpdated, &user.id);
        Ok(user)
    }

    /// URL that starts an external sign-in.
    pub fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        self.backend
            .authorize_url(provider, redirect_to, code_challenge)
    }

    // ─── Records ─────────────────────────────────────────────────

    /// Read the single row of `collection` where `column = value`.
    ///
    /// A "no rows" response is `Ok(None)`.
    pub async fn select_one<T: DeserializeOwned>(
        &self,
        session: &Session,
        collection: &str,
        column: &str,
        value: &str,
        columns: &str,
    ) -> Result<Option<T>, AppError> {
        match self
            .backend
            .select_single(&session.access_token, collection, column, value, columns)
            .await
        {
            Ok(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| AppError::Database(format!("Unexpected row shape: {}", e))),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Insert or update a row keyed on its `id`.
    pub async fn upsert<T: Serialize + Sync>(
        &self,
        session: &Session,
        collection: &str,
        row: &T,
    ) -> Result<(), AppError> {
        let value = serde_json::to_value(row)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("Row serialization failed: {}", e)))?;
        self.backend
            .upsert(&session.access_token, collection, value)
            .await
    }
}

/// Read the `exp` claim of a JWT without verifying it.
fn token_expiry(token: &str) -> Option<i64> {
    #[derive(Deserialize)]
    struct Exp {
        exp: i64,
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Exp>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims.exp)
}
