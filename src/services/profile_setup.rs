// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile setup: validation and persistence of the first-run profile form.

use crate::db::ProfileRepo;
use crate::models::{ProfileRecord, Session, PLACEHOLDER_FIRST_NAME};
use crate::services::username::{check_username, username_len, Availability, MIN_USERNAME_LEN};
use crate::services::SessionClient;
use crate::time_utils::{format_utc_rfc3339, parse_birthday};
use serde::{Deserialize, Serialize};

pub const USERNAME_TOO_SHORT: &str = "Username must be at least 3 characters";
pub const USERNAME_TAKEN: &str = "Username is already taken";
pub const FIRST_NAME_REQUIRED: &str = "First name is required";
pub const FIRST_NAME_PLACEHOLDER: &str = "First name cannot be \"New User\"";
pub const AGE_INVALID: &str = "Age must be a number between 1 and 120";
pub const BIRTHDAY_INVALID: &str = "Birthday must be a valid date";
pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Raw form fields as submitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub birthday: String,
}

/// Why a submission was not saved. The message is shown on the form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("{0}")]
    Invalid(&'static str),

    #[error("{0}")]
    Persistence(String),
}

/// Form contents after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidProfile {
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub age: Option<u8>,
    pub birthday: Option<String>,
}

impl ValidProfile {
    fn into_record(self, user_id: String, updated_at: String) -> ProfileRecord {
        ProfileRecord {
            id: user_id,
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
            age: self.age,
            birthday: self.birthday,
            updated_at,
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Validate a form. The first failing rule wins.
pub fn validate(form: &ProfileForm, availability: Availability) -> Result<ValidProfile, FormError> {
    let username = non_empty(&form.username);
    if let Some(name) = username.as_deref() {
        if username_len(name) < MIN_USERNAME_LEN {
            return Err(FormError::Invalid(USERNAME_TOO_SHORT));
        }
        if availability.is_taken() {
            return Err(FormError::Invalid(USERNAME_TAKEN));
        }
    }

    let first_name = non_empty(&form.first_name).ok_or(FormError::Invalid(FIRST_NAME_REQUIRED))?;
    if first_name == PLACEHOLDER_FIRST_NAME {
        return Err(FormError::Invalid(FIRST_NAME_PLACEHOLDER));
    }

    let age = match non_empty(&form.age) {
        None => None,
        Some(raw) => match raw.parse::<u8>() {
            Ok(age) if (1..=120).contains(&age) => Some(age),
            _ => return Err(FormError::Invalid(AGE_INVALID)),
        },
    };

    let birthday = match non_empty(&form.birthday) {
        None => None,
        Some(raw) => Some(
            parse_birthday(&raw)
                .ok_or(FormError::Invalid(BIRTHDAY_INVALID))?
                .format("%Y-%m-%d")
                .to_string(),
        ),
    };

    Ok(ValidProfile {
        username,
        first_name,
        last_name: non_empty(&form.last_name),
        age,
        birthday,
    })
}

/// Validates and saves profile setup submissions.
#[derive(Clone)]
pub struct ProfileSetup {
    sessions: SessionClient,
    profiles: ProfileRepo,
}

impl ProfileSetup {
    pub fn new(sessions: SessionClient, profiles: ProfileRepo) -> Self {
        Self { sessions, profiles }
    }

    /// Current availability of a username for this session's user.
    pub async fn availability(&self, session: &Session, username: &str) -> Availability {
        check_username(&self.profiles, session, username).await
    }

    /// Validate and persist a submission.
    ///
    /// On success the profile row is upserted, the names are copied into the
    /// user's metadata and `on_complete` is invoked with the saved record.
    /// Navigation is left to the caller.
    pub async fn submit<F, R>(
        &self,
        session: &Session,
        form: &ProfileForm,
        on_complete: F,
    ) -> Result<R, FormError>
    where
        F: FnOnce(&ProfileRecord) -> R,
    {
        let availability = self.availability(session, &form.username).await;
        let valid = validate(form, availability)?;

        let user = self
            .sessions
            .get_current_user(session)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Profile setup without a valid user");
                FormError::Persistence(NOT_AUTHENTICATED.to_string())
            })?;

        let record = valid.into_record(user.id, format_utc_rfc3339(chrono::Utc::now()));

        self.profiles
            .upsert(session, &record)
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, user_id = %record.id, "Profile upsert failed");
                FormError::Persistence(e.user_message())
            })?;

        let metadata = serde_json::json!({
            "username": record.username,
            "first_name": record.first_name,
            "last_name": record.last_name,
        });
        if let Err(e) = self.sessions.update_user_metadata(session, metadata).await {
            tracing::warn!(
                error = %e,
                user_id = %record.id,
                "Failed to copy profile names into user metadata"
            );
        }

        tracing::info!(user_id = %record.id, "Profile setup complete");
        Ok(on_complete(&record))
    }
}
