// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod profile;
pub mod session;

pub use profile::{Profile, ProfileRecord, ProfileSummary, Viewer, PLACEHOLDER_FIRST_NAME};
pub use session::{AuthUser, OAuthProvider, Session, SessionTokens};
