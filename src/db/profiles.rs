// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed operations on the `profiles` collection.

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Profile, ProfileRecord, ProfileSummary, Session};
use crate::services::SessionClient;

/// Profile repository. Reads and writes run with the caller's session so
/// the backend's row-level policies apply.
#[derive(Clone)]
pub struct ProfileRepo {
    sessions: SessionClient,
}

impl ProfileRepo {
    pub fn new(sessions: SessionClient) -> Self {
        Self { sessions }
    }

    /// Names and username of a user's profile, if the row exists.
    pub async fn get_summary(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Option<ProfileSummary>, AppError> {
        self.sessions
            .select_one(
                session,
                collections::PROFILES,
                "id",
                user_id,
                ProfileSummary::COLUMNS,
            )
            .await
    }

    /// Full profile row of a user.
    pub async fn get_profile(
        &self,
        session: &Session,
        user_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        self.sessions
            .select_one(session, collections::PROFILES, "id", user_id, "*")
            .await
    }

    /// Id of the profile using `username`, if any.
    pub async fn username_owner(
        &self,
        session: &Session,
        username: &str,
    ) -> Result<Option<String>, AppError> {
        #[derive(serde::Deserialize)]
        struct Owner {
            id: String,
        }

        let owner: Option<Owner> = self
            .sessions
            .select_one(
                session,
                collections::PROFILES,
                "username",
                username,
                "id,username",
            )
            .await?;
        Ok(owner.map(|o| o.id))
    }

    /// Create or overwrite the row keyed by `record.id`.
    pub async fn upsert(&self, session: &Session, record: &ProfileRecord) -> Result<(), AppError> {
        self.sessions
            .upsert(session, collections::PROFILES, record)
            .await
    }
}
