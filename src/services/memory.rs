// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process provider for offline development and tests.
//!
//! Mirrors the hosted provider's observable contract: opaque access and
//! refresh tokens with expiry, PKCE code exchange, placeholder profile rows
//! created on sign-up, "no rows" as [`AppError::NotFound`], and merge-upserts
//! keyed on `id`. Record reads and upserts are counted so callers can assert
//! how many round trips an operation made.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{AuthUser, OAuthProvider, Session, PLACEHOLDER_FIRST_NAME};
use crate::services::backend::Backend;
use crate::services::pkce;
use crate::time_utils::unix_now;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lifetime of issued access tokens.
const ACCESS_TOKEN_TTL_SECS: i64 = 3600;

/// Shortest password the provider accepts.
const MIN_PASSWORD_LEN: usize = 6;

#[derive(Default)]
struct MemoryState {
    users: HashMap<String, StoredUser>,
    /// access token -> (user id, expires at)
    access_tokens: HashMap<String, (String, i64)>,
    /// refresh token -> user id
    refresh_tokens: HashMap<String, String>,
    /// auth code -> (user id, S256 challenge)
    codes: HashMap<String, (String, String)>,
    rows: HashMap<String, Vec<Value>>,
    upserted: Vec<(String, Value)>,
    /// (email, link) for every confirmation or reset mail "sent"
    sent_links: Vec<(String, String)>,
}

struct StoredUser {
    user: AuthUser,
    password: Option<String>,
}

/// In-memory provider.
#[derive(Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    next_id: AtomicU64,
    record_reads: AtomicUsize,
    upserts: AtomicUsize,
    records_failing: AtomicBool,
    sign_out_failing: AtomicBool,
    metadata_failing: AtomicBool,
    confirm_sign_ups: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    // ─── Seeding ─────────────────────────────────────────────────

    /// Register a user. Like the hosted project's sign-up trigger, this also
    /// creates a profile row with the placeholder first name.
    pub fn add_user(&self, email: &str, password: Option<&str>) -> AuthUser {
        let mut state = self.state();
        self.add_user_locked(&mut state, email, password)
    }

    fn add_user_locked(
        &self,
        state: &mut MemoryState,
        email: &str,
        password: Option<&str>,
    ) -> AuthUser {
        let id = format!("00000000-0000-4000-8000-{:012}", self.next());
        let user = AuthUser {
            id: id.clone(),
            email: Some(email.to_string()),
            user_metadata: Value::Object(Map::new()),
        };

        state.users.insert(
            id.clone(),
            StoredUser {
                user: user.clone(),
                password: password.map(str::to_string),
            },
        );
        state
            .rows
            .entry(collections::PROFILES.to_string())
            .or_default()
            .push(serde_json::json!({
                "id": id,
                "username": null,
                "first_name": PLACEHOLDER_FIRST_NAME,
                "last_name": null,
                "age": null,
                "birthday": null,
                "updated_at": null,
            }));

        user
    }

    /// Create a live session for an existing user.
    pub fn issue_session(&self, user_id: &str) -> Result<Session, AppError> {
        let mut state = self.state();
        self.issue_locked(&mut state, user_id)
    }

    fn issue_locked(&self, state: &mut MemoryState, user_id: &str) -> Result<Session, AppError> {
        let user = state
            .users
            .get(user_id)
            .map(|u| u.user.clone())
            .ok_or_else(|| AppError::Provider("User not found".to_string()))?;

        let n = self.next();
        let access_token = format!("mem-at-{}", n);
        let refresh_token = format!("mem-rt-{}", n);
        let expires_at = unix_now() + ACCESS_TOKEN_TTL_SECS;

        state
            .access_tokens
            .insert(access_token.clone(), (user_id.to_string(), expires_at));
        state
            .refresh_tokens
            .insert(refresh_token.clone(), user_id.to_string());

        Ok(Session {
            access_token,
            refresh_token,
            expires_at,
            user,
        })
    }

    /// Issue an authorization code as the identity provider would after a
    /// successful external login started with `code_challenge`.
    pub fn issue_code(&self, user_id: &str, code_challenge: &str) -> String {
        let mut state = self.state();
        self.issue_code_locked(&mut state, user_id, code_challenge)
    }

    fn issue_code_locked(
        &self,
        state: &mut MemoryState,
        user_id: &str,
        code_challenge: &str,
    ) -> String {
        let code = format!("mem-code-{}", self.next());
        state.codes.insert(
            code.clone(),
            (user_id.to_string(), code_challenge.to_string()),
        );
        code
    }

    /// Complete an external login without leaving the machine.
    ///
    /// Each provider has one local identity, created on first use. Returns
    /// the URL the provider would send the browser back to.
    pub fn complete_external_sign_in(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        let email = format!("{}@offline.localhost", provider);
        let mut state = self.state();
        let user_id = match Self::user_by_email(&state, &email) {
            Some(id) => id,
            None => self.add_user_locked(&mut state, &email, None).id,
        };
        let code = self.issue_code_locked(&mut state, &user_id, code_challenge);
        with_code(redirect_to, &code)
    }

    /// Links mailed to `email`, oldest first.
    pub fn sent_links(&self, email: &str) -> Vec<String> {
        self.state()
            .sent_links
            .iter()
            .filter(|(to, _)| to == email)
            .map(|(_, link)| link.clone())
            .collect()
    }

    /// Force an access token to be expired.
    pub fn expire_access_token(&self, access_token: &str) {
        if let Some(entry) = self.state().access_tokens.get_mut(access_token) {
            entry.1 = 0;
        }
    }

    /// Insert or replace a row directly (not counted as an upsert).
    pub fn put_row(&self, collection: &str, row: Value) {
        let mut state = self.state();
        merge_row(state.rows.entry(collection.to_string()).or_default(), row);
    }

    /// Remove the row with the given id.
    pub fn delete_row(&self, collection: &str, id: &str) {
        if let Some(rows) = self.state().rows.get_mut(collection) {
            rows.retain(|row| row.get("id").and_then(Value::as_str) != Some(id));
        }
    }

    /// Current row with the given id.
    pub fn row(&self, collection: &str, id: &str) -> Option<Value> {
        self.state().rows.get(collection).and_then(|rows| {
            rows.iter()
                .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
                .cloned()
        })
    }

    /// Current metadata of a user.
    pub fn user_metadata(&self, user_id: &str) -> Option<Value> {
        self.state()
            .users
            .get(user_id)
            .map(|u| u.user.user_metadata.clone())
    }

    // ─── Instrumentation ─────────────────────────────────────────

    /// Number of `select_single` calls made so far.
    pub fn record_reads(&self) -> usize {
        self.record_reads.load(Ordering::SeqCst)
    }

    /// Number of `upsert` calls made so far.
    pub fn upsert_count(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    /// Rows passed to `upsert` for a collection, in call order.
    pub fn upserted_rows(&self, collection: &str) -> Vec<Value> {
        self.state()
            .upserted
            .iter()
            .filter(|(c, _)| c == collection)
            .map(|(_, row)| row.clone())
            .collect()
    }

    /// Make every record operation fail as if the network were down.
    pub fn set_records_failing(&self, failing: bool) {
        self.records_failing.store(failing, Ordering::SeqCst);
    }

    /// Make sign-out fail with a provider error.
    pub fn set_sign_out_failing(&self, failing: bool) {
        self.sign_out_failing.store(failing, Ordering::SeqCst);
    }

    /// Make metadata updates fail with a provider error.
    pub fn set_metadata_failing(&self, failing: bool) {
        self.metadata_failing.store(failing, Ordering::SeqCst);
    }

    /// Require new accounts to confirm their address before signing in.
    pub fn set_confirm_sign_ups(&self, confirm: bool) {
        self.confirm_sign_ups.store(confirm, Ordering::SeqCst);
    }

    fn user_by_email(state: &MemoryState, email: &str) -> Option<String> {
        state
            .users
            .values()
            .find(|u| u.user.email.as_deref() == Some(email))
            .map(|u| u.user.id.clone())
    }

    /// Record a mailed link carrying a fresh code for `user_id`.
    fn send_link(
        &self,
        state: &mut MemoryState,
        email: &str,
        user_id: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) {
        let code = self.issue_code_locked(state, user_id, code_challenge);
        let link = with_code(redirect_to, &code);
        tracing::info!(email, link = %link, "Offline provider mail");
        state.sent_links.push((email.to_string(), link));
    }

    fn user_for_token(state: &MemoryState, access_token: &str) -> Result<String, AppError> {
        match state.access_tokens.get(access_token) {
            Some((user_id, expires_at)) if *expires_at > unix_now() => Ok(user_id.clone()),
            _ => Err(AppError::InvalidToken),
        }
    }
}

fn with_code(redirect_to: &str, code: &str) -> String {
    let separator = if redirect_to.contains('?') { '&' } else { '?' };
    format!("{}{}code={}", redirect_to, separator, urlencoding::encode(code))
}

fn check_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Provider(format!(
            "Password should be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn merge_row(rows: &mut Vec<Value>, row: Value) {
    let position = row
        .get("id")
        .and_then(|id| rows.iter().position(|r| r.get("id") == Some(id)));

    match (position, row) {
        (Some(i), Value::Object(update)) => {
            if let Value::Object(current) = &mut rows[i] {
                for (key, value) in update {
                    current.insert(key, value);
                }
            } else {
                rows[i] = Value::Object(update);
            }
        }
        (_, row) => rows.push(row),
    }
}

fn project(row: &Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row.clone();
    }
    let mut out = Map::new();
    for column in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        out.insert(
            column.to_string(),
            row.get(column).cloned().unwrap_or(Value::Null),
        );
    }
    Value::Object(out)
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let state = self.state();
        let user_id = Self::user_for_token(&state, access_token)?;
        state
            .users
            .get(&user_id)
            .map(|u| u.user.clone())
            .ok_or(AppError::InvalidToken)
    }

    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<Session, AppError> {
        let mut state = self.state();
        let (user_id, challenge) = state
            .codes
            .remove(code)
            .ok_or_else(|| {
                AppError::Provider("invalid flow state, no valid flow state found".to_string())
            })?;

        if pkce::challenge_for(code_verifier) != challenge {
            return Err(AppError::Provider(
                "code challenge does not match previously saved code verifier".to_string(),
            ));
        }

        self.issue_locked(&mut state, &user_id)
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AppError> {
        let mut state = self.state();
        let user_id = state
            .users
            .values()
            .find(|u| {
                u.user.email.as_deref() == Some(email) && u.password.as_deref() == Some(password)
            })
            .map(|u| u.user.id.clone())
            .ok_or_else(|| AppError::Provider("Invalid login credentials".to_string()))?;

        self.issue_locked(&mut state, &user_id)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<Option<Session>, AppError> {
        check_password(password)?;

        let mut state = self.state();
        if Self::user_by_email(&state, email).is_some() {
            return Err(AppError::Provider("User already registered".to_string()));
        }
        let user = self.add_user_locked(&mut state, email, Some(password));

        if self.confirm_sign_ups.load(Ordering::SeqCst) {
            self.send_link(&mut state, email, &user.id, redirect_to, code_challenge);
            return Ok(None);
        }
        self.issue_locked(&mut state, &user.id).map(Some)
    }

    async fn recover_password(
        &self,
        email: &str,
        redirect_to: &str,
        code_challenge: &str,
    ) -> Result<(), AppError> {
        let mut state = self.state();
        if let Some(user_id) = Self::user_by_email(&state, email) {
            self.send_link(&mut state, email, &user_id, redirect_to, code_challenge);
        }
        Ok(())
    }

    async fn update_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<AuthUser, AppError> {
        check_password(password)?;

        let mut state = self.state();
        let user_id = Self::user_for_token(&state, access_token)?;
        let stored = state.users.get_mut(&user_id).ok_or(AppError::InvalidToken)?;
        stored.password = Some(password.to_string());
        Ok(stored.user.clone())
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        let mut state = self.state();
        let user_id = state
            .refresh_tokens
            .remove(refresh_token)
            .ok_or(AppError::InvalidToken)?;
        self.issue_locked(&mut state, &user_id)
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        if self.sign_out_failing.load(Ordering::SeqCst) {
            return Err(AppError::Provider("Sign-out request failed".to_string()));
        }

        let mut state = self.state();
        let user_id = Self::user_for_token(&state, access_token)?;
        state.access_tokens.retain(|_, (owner, _)| *owner != user_id);
        state.refresh_tokens.retain(|_, owner| *owner != user_id);
        Ok(())
    }

    async fn update_user_metadata(
        &self,
        access_token: &str,
        data: Value,
    ) -> Result<AuthUser, AppError> {
        if self.metadata_failing.load(Ordering::SeqCst) {
            return Err(AppError::Provider("Metadata update failed".to_string()));
        }

        let mut state = self.state();
        let user_id = Self::user_for_token(&state, access_token)?;
        let stored = state.users.get_mut(&user_id).ok_or(AppError::InvalidToken)?;

        if !stored.user.user_metadata.is_object() {
            stored.user.user_metadata = Value::Object(Map::new());
        }
        if let (Value::Object(current), Value::Object(update)) =
            (&mut stored.user.user_metadata, data)
        {
            for (key, value) in update {
                current.insert(key, value);
            }
        }

        Ok(stored.user.clone())
    }

    fn authorize_url(
        &self,
        provider: OAuthProvider,
        redirect_to: &str,
        code_challenge: &str,
    ) -> String {
        format!(
            "/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
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
        self.record_reads.fetch_add(1, Ordering::SeqCst);
        if self.records_failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("Network request failed".to_string()));
        }

        let state = self.state();
        Self::user_for_token(&state, access_token)?;

        let matches: Vec<&Value> = state
            .rows
            .get(collection)
            .map(|rows| {
                rows.iter()
                    .filter(|row| row.get(column).and_then(Value::as_str) == Some(value))
                    .collect()
            })
            .unwrap_or_default();

        match matches.as_slice() {
            [] => Err(AppError::NotFound("Results contain 0 rows".to_string())),
            [row] => Ok(project(row, columns)),
            many => Err(AppError::Database(format!(
                "Results contain {} rows, application/vnd.pgrst.object+json requires 1 row",
                many.len()
            ))),
        }
    }

    async fn upsert(
        &self,
        access_token: &str,
        collection: &str,
        row: Value,
    ) -> Result<(), AppError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        if self.records_failing.load(Ordering::SeqCst) {
            return Err(AppError::Database("Network request failed".to_string()));
        }

        let mut state = self.state();
        Self::user_for_token(&state, access_token)?;

        if row.get("id").and_then(Value::as_str).is_none() {
            return Err(AppError::Database(
                "null value in column \"id\" violates not-null constraint".to_string(),
            ));
        }

        state.upserted.push((collection.to_string(), row.clone()));
        merge_row(state.rows.entry(collection.to_string()).or_default(), row);
        Ok(())
    }
}
