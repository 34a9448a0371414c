// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session and identity types issued by the auth provider.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Authenticated identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    /// Provider user id (UUID string); also the profile row id
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Free-form metadata; holds a denormalized copy of profile names
    #[serde(default)]
    pub user_metadata: serde_json::Value,
}

/// An authenticated login. Held only in memory and in cookies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token expiry (Unix seconds)
    pub expires_at: i64,
    pub user: AuthUser,
}

impl Session {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

/// Raw tokens as carried by the browser's cookies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTokens {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl SessionTokens {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// External identity providers offered on the sign-in page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OAuthProvider {
    Google,
    Github,
}

impl OAuthProvider {
    pub const ALL: [OAuthProvider; 2] = [OAuthProvider::Google, OAuthProvider::Github];

    pub fn as_str(self) -> &'static str {
        match self {
            OAuthProvider::Google => "google",
            OAuthProvider::Github => "github",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OAuthProvider::Google => "Google",
            OAuthProvider::Github => "GitHub",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OAuthProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(OAuthProvider::Google),
            "github" => Ok(OAuthProvider::Github),
            other => Err(format!("Unsupported provider: {}", other)),
        }
    }
}
