// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Hosted auth/database provider client.
//!
//! Talks to two HTTP APIs of the same project:
//! - the auth API (`/auth/v1`): users, sessions, OAuth authorize/code exchange
//! - the REST API (`/rest/v1`): rows in named collections
//!
//! No retries; every failure is mapped to an [`AppError`] and returned.

use crate::error::AppError;
use crate::models::{AuthUser, OAuthProvider, Session};
use crate::services::backend::Backend;
use crate::time_utils::unix_now;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// Media type asking the REST API for a single object instead of an array.
const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// Provider API client.
#[derive(Clone)]
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    /// Create a client for the project at `base_url`.
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base_url, path)
    }

    fn rest_url(&self, collection: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection)
    }

    /// POST to the token endpoint with the given grant.
    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, AppError> {
        let response = self
            .http
            .post(self.auth_url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Token request failed: {}", e)))?;

        let token: TokenResponse = check_auth_response_json(response).await?;
        Ok(token.into_session())
    }
}

#[async_trait]
impl Backend for SupabaseClient {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let response = self
            .http
            .get(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        check_auth_response_json(response).await
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Session, AppError> {
        self.token_grant(
            "pkce",
            serde_json::json!({
                "auth_code": code,
                "code_verifier": code_verifier,
            }),
        )
        .await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        self.token_grant(
            "password",
            serde_json::json!({
                "email": email,
                "password": password,
            }),
        )
        .await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<Session>, AppError> {
        let response = self
            .http
            .post(self.auth_url("signup"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "code_challenge": code_challenge,
                "code_challenge_method": "s256",
            }))
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Sign-up request failed: {}", e)))?;

        // A session when the project auto-confirms, otherwise just the user
        let body: Value = check_auth_response_json(response).await?;
        if body.get("access_token").is_none() {
            return Ok(None);
        }
        let token: TokenResponse = serde_json::from_value(body)
            .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))?;
        Ok(Some(token.into_session()))
    }

    async fn recover_password(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.auth_url("recover"))
            .query(&[("redirect_to", redirect_to)])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({
                "email": email,
                "code_challenge": code_challenge,
                "code_challenge_method": "s256",
            }))
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Recovery request failed: {}", e)))?;

        check_auth_response(response).await
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<AuthUser, AppError> {
        let response = self
            .http
            .put(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        check_auth_response_json(response).await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        self.token_grant(
            "refresh_token",
            serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.auth_url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Provider(format!("Sign-out request failed: {}", e)))?;

        check_auth_response(response).await
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        data: Value,
    ) -> Result<AuthUser, AppError> {
        let response = self
            .http
            .put(self.auth_url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "data": data }))
            .send()
            .await
            .map_err(|e| AppError::Provider(e.to_string()))?;

        check_auth_response_json(response).await
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "{}?\
             provider={}&\
             redirect_to={}&\
             code_challenge={}&\
             code_challenge_method=s256",
            self.auth_url("authorize"),
            provider,
            urlencoding::encode(redirect_to),
            urlencoding::encode(code_challenge)
        )
    }

    async fn select_single(
        &self,
        access_token: &str,
        collection: &str,
        column: &str,
        value: &str,
        columns: &str,
    ) -> Result<Value, AppError> {
        let filter = format!("eq.{}", value);
        let response = self
            .http
            .get(self.rest_url(collection))
            .query(&[("select", columns), (column, filter.as_str())])
            .header("apikey", &self.anon_key)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if response.status().is_success() {
            return response
                .json()
                .await
                .map_err(|e| AppError::Database(format!("JSON parse error: {}", e)));
        }

        Err(rest_error(response).await)
    }

    async fn upsert(
        &self,
        access_token: &str,
        collection: &str,
        row: Value,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .post(self.rest_url(collection))
            .header("apikey", &self.anon_key)
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .bearer_auth(access_token)
            .json(&row)
            .send()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(rest_error(response).await)
    }
}

/// Token endpoint response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Session {
        let expires_at = self
            .expires_at
            .unwrap_or_else(|| unix_now() + self.expires_in.unwrap_or(3600));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

/// Error body returned by the auth API. Older and newer versions use
/// different field names, so all of them are optional.
#[derive(Debug, Default, Deserialize)]
struct AuthErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl AuthErrorBody {
    fn message(self) -> Option<String> {
        self.error_description
            .or(self.msg)
            .or(self.message)
            .or(self.error)
    }
}

/// Error body returned by the REST API.
#[derive(Debug, Default, Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Check an auth API response and return error if not successful.
async fn check_auth_response(response: reqwest::Response) -> Result<(), AppError> {
    if response.status().is_success() {
        return Ok(());
    }
    Err(auth_error(response).await)
}

/// Check an auth API response and parse its JSON body.
async fn check_auth_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    if !response.status().is_success() {
        return Err(auth_error(response).await);
    }

    response
        .json()
        .await
        .map_err(|e| AppError::Provider(format!("JSON parse error: {}", e)))
}

async fn auth_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        tracing::debug!(status = %status, "Auth provider rejected token");
        return AppError::InvalidToken;
    }

    let message = serde_json::from_str::<AuthErrorBody>(&body)
        .ok()
        .and_then(AuthErrorBody::message)
        .unwrap_or_else(|| format!("HTTP {}: {}", status, body));

    AppError::Provider(message)
}

async fn rest_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<RestErrorBody>(&body).unwrap_or_default();

    if parsed.code.as_deref() == Some(AppError::NO_ROWS_CODE) {
        return AppError::NotFound(
            parsed
                .message
                .unwrap_or_else(|| "No matching row".to_string()),
        );
    }

    if status == StatusCode::UNAUTHORIZED {
        return AppError::InvalidToken;
    }

    AppError::Database(
        parsed
            .message
            .unwrap_or_else(|| format!("HTTP {}: {}", status, body)),
    )
}
