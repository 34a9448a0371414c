// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.

use std::env;

/// Production site used when a production request still resolves to a
/// loopback origin (misconfigured proxy headers).
pub const DEFAULT_PRODUCTION_URL: &str = "https://memory-keeper-wine.vercel.app";

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted auth/database project
    pub supabase_url: String,
    /// Public (anon) API key sent with every provider request
    pub supabase_anon_key: String,
    /// JWT secret for verifying access tokens locally (optional)
    pub supabase_jwt_secret: Option<Vec<u8>>,
    /// Explicit OAuth callback URL; overrides the one derived from the request
    pub redirect_url: Option<String>,
    /// Whether the deployment is flagged as production
    pub production: bool,
    /// Fixed public URL of the production deployment
    pub production_url: String,
    /// Public URL of this site (used for cookie security)
    pub site_url: String,
    /// Server port
    pub port: u16,
    /// Directory served under `/assets`
    pub assets_dir: String,
    /// Use the in-memory provider instead of the hosted one
    pub offline: bool,
    /// Email/password account created at startup in offline mode
    pub offline_user_email: Option<String>,
    pub offline_user_password: Option<String>,
}

impl Config {
    /// Config for tests: offline, localhost, not production.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            supabase_jwt_secret: None,
            redirect_url: None,
            production: false,
            production_url: DEFAULT_PRODUCTION_URL.to_string(),
            site_url: "http://localhost:3000".to_string(),
            port: 3000,
            assets_dir: "assets".to_string(),
            offline: true,
            offline_user_email: None,
            offline_user_password: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// A `.env` file is read first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let offline = env_bool("OFFLINE_MODE").unwrap_or(false);

        let required = |name: &'static str, fallback: &str| -> Result<String, ConfigError> {
            match env::var(name) {
                Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
                _ if offline => Ok(fallback.to_string()),
                _ => Err(ConfigError::Missing(name)),
            }
        };

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::Invalid("PORT", raw))?,
            Err(_) => 3000,
        };

        Ok(Self {
            supabase_url: required("SUPABASE_URL", "http://localhost:54321")?
                .trim_end_matches('/')
                .to_string(),
            supabase_anon_key: required("SUPABASE_ANON_KEY", "offline")?,
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().as_bytes().to_vec()),
            redirect_url: env::var("REDIRECT_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| v.trim().to_string()),
            production: env::var("APP_ENV")
                .map(|v| v.trim().eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            production_url: env::var("PRODUCTION_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| DEFAULT_PRODUCTION_URL.to_string()),
            site_url: env::var("SITE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            port,
            assets_dir: env::var("ASSETS_DIR").unwrap_or_else(|_| "assets".to_string()),
            offline,
            offline_user_email: env_non_empty("OFFLINE_USER_EMAIL"),
            offline_user_password: env_non_empty("OFFLINE_USER_PASSWORD"),
        })
    }

    /// Whether session cookies get the `Secure` attribute.
    pub fn cookie_secure(&self) -> bool {
        self.production || self.site_url.starts_with("https://")
    }

    /// Offline account to seed, when both halves are configured.
    pub fn offline_user(&self) -> Option<(&str, &str)> {
        Some((
            self.offline_user_email.as_deref()?,
            self.offline_user_password.as_deref()?,
        ))
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a boolean-ish environment variable.
pub(crate) fn env_bool(key: &str) -> Option<bool> {
    env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
