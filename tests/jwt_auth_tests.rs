// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local access-token verification tests.
//!
//! With a JWT secret configured, provider-issued access tokens are checked
//! locally; these tests craft tokens the way the provider signs them and
//! run them through the router.

use axum::http::StatusCode;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use memory_keeper::config::Config;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tower::ServiceExt;

mod common;

const SECRET: &[u8] = b"super-secret-jwt-token-with-at-least-32-characters";

/// Claims in the shape the provider issues.
#[derive(Debug, Serialize)]
struct Claims {
    sub: String,
    aud: String,
    exp: u64,
    iat: u64,
    email: String,
    role: String,
}

fn provider_token(email: &str, aud: &str, ttl_secs: i64, secret: &[u8]) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs();

    let claims = Claims {
        sub: "00000000-0000-4000-8000-000000000042".to_string(),
        aud: aud.to_string(),
        exp: now.saturating_add_signed(ttl_secs),
        iat: now,
        email: email.to_string(),
        role: "authenticated".to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .expect("Failed to create JWT")
}

fn app_with_secret() -> common::TestApp {
    let mut config = Config::test_default();
    config.supabase_jwt_secret = Some(SECRET.to_vec());
    common::create_test_app_with_config(config)
}

async fn signed_in_as(app: common::TestApp, token: &str) -> Option<String> {
    let response = app
        .router
        .oneshot(common::get(
            "/signin",
            Some(&format!("mk_access_token={token}")),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = common::body_string(response).await;
    let marker = "You are logged in as: ";
    body.find(marker).map(|start| {
        body[start + marker.len()..]
            .split('<')
            .next()
            .unwrap_or_default()
            .to_string()
    })
}

#[tokio::test]
async fn test_valid_token_is_accepted_locally() {
    let token = provider_token("jane@example.com", "authenticated", 3600, SECRET);
    let email = signed_in_as(app_with_secret(), &token).await;
    assert_eq!(email.as_deref(), Some("jane@example.com"));
}

#[tokio::test]
async fn test_wrong_secret_is_rejected() {
    let token = provider_token("jane@example.com", "authenticated", 3600, b"another-secret");
    assert_eq!(signed_in_as(app_with_secret(), &token).await, None);
}

#[tokio::test]
async fn test_wrong_audience_is_rejected() {
    let token = provider_token("jane@example.com", "service_role", 3600, SECRET);
    assert_eq!(signed_in_as(app_with_secret(), &token).await, None);
}

#[tokio::test]
async fn test_expired_token_is_rejected() {
    let token = provider_token("jane@example.com", "authenticated", -3600, SECRET);
    assert_eq!(signed_in_as(app_with_secret(), &token).await, None);
}
