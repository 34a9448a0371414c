// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route guard tests against the full router.
//!
//! These tests verify that:
//! 1. Signed-out visitors are always sent to /signin
//! 2. Incomplete profiles are sent to /profile-setup, complete ones to /
//! 3. Expired access tokens are refreshed transparently
//! 4. Cached profiles are dropped when the user's metadata changes

use axum::http::StatusCode;
use memory_keeper::db::collections;
use memory_keeper::middleware::{GuardDecision, ProtectedPage};
use std::time::Duration;
use tower::ServiceExt;

mod common;

use common::{get, location, session_cookie};

#[tokio::test]
async fn test_signed_out_redirects_to_signin() {
    let app = common::create_test_app();

    for uri in ["/", "/profile-setup"] {
        let response = app.router.clone().oneshot(get(uri, None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER, "{uri}");
        assert_eq!(location(&response), "/signin", "{uri}");
    }
}

#[tokio::test]
async fn test_placeholder_profile_redirects_to_setup() {
    let app = common::create_test_app();
    let session = common::signed_in_user(&app.backend, "jane@example.com");

    let response = app
        .router
        .oneshot(get("/", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/profile-setup");
}

#[tokio::test]
async fn test_missing_profile_row_redirects_to_setup() {
    let app = common::create_test_app();
    let session = common::signed_in_user(&app.backend, "jane@example.com");
    app.backend
        .delete_row(collections::PROFILES, &session.user.id);

    let response = app
        .router
        .oneshot(get("/", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(location(&response), "/profile-setup");
}

#[tokio::test]
async fn test_profile_lookup_failure_counts_as_absent() {
    let app = common::create_test_app();
    let session = common::user_with_profile(&app.backend, "jane@example.com", "Jane");
    app.backend.set_records_failing(true);

    let response = app
        .router
        .oneshot(get("/", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(location(&response), "/profile-setup");
}

#[tokio::test]
async fn test_complete_profile_renders_dashboard() {
    let app = common::create_test_app();
    let session = common::user_with_profile(&app.backend, "jane@example.com", "Jane");

    let response = app
        .router
        .oneshot(get("/", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_string(response).await;
    assert!(body.contains("Welcome to Your Memory Dashboard"));
    assert!(body.contains("Recent Memories"));
    assert!(body.contains("Hello, Jane."));
}

#[tokio::test]
async fn test_dashboard_shows_full_name_and_username() {
    let app = common::create_test_app();
    let session = common::signed_in_user(&app.backend, "jane@example.com");
    app.backend.put_row(
        collections::PROFILES,
        serde_json::json!({
            "id": session.user.id,
            "first_name": "Jane",
            "last_name": "Doe",
            "username": "janed",
        }),
    );

    let response = app
        .router
        .oneshot(get("/", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_string(response).await;
    assert!(body.contains("Hello, Jane Doe."), "{body}");
    assert!(body.contains("@janed"), "{body}");
    assert!(body.contains(r#"data-page="dashboard""#));
}

#[tokio::test]
async fn test_complete_profile_skips_setup_page() {
    let app = common::create_test_app();
    let session = common::user_with_profile(&app.backend, "jane@example.com", "Jane");

    let response = app
        .router
        .oneshot(get("/profile-setup", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_incomplete_profile_renders_setup_page() {
    let app = common::create_test_app();
    let session = common::signed_in_user(&app.backend, "jane@example.com");

    let response = app
        .router
        .oneshot(get("/profile-setup", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_string(response).await;
    assert!(body.contains("Complete Your Profile"));
    // The placeholder name is not offered back to the user
    assert!(!body.contains(r#"value="New User""#));
    // The page listens for session changes too
    assert!(body.contains(r#"data-page="profile-setup""#));
    assert!(body.contains("/api/session/events"));
}

#[tokio::test]
async fn test_expired_access_token_is_refreshed() {
    let app = common::create_test_app();
    let session = common::user_with_profile(&app.backend, "jane@example.com", "Jane");
    app.backend.expire_access_token(&session.access_token);

    let response = app
        .router
        .oneshot(get("/", Some(&session_cookie(&session))))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = common::set_cookie_headers(&response);
    let access = common::find_cookie(&cookies, "mk_access_token");
    let refresh = common::find_cookie(&cookies, "mk_refresh_token");
    assert!(!access.starts_with(&format!("mk_access_token={};", session.access_token)));
    assert!(!refresh.starts_with(&format!("mk_refresh_token={};", session.refresh_token)));
    assert!(access.contains("HttpOnly"));
}

#[tokio::test]
async fn test_unusable_tokens_are_cleared() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(get(
            "/",
            Some("mk_access_token=bogus; mk_refresh_token=bogus"),
        ))
        .await
        .unwrap();

    assert_eq!(location(&response), "/signin");
    let cookies = common::set_cookie_headers(&response);
    assert!(common::find_cookie(&cookies, "mk_access_token").contains("Max-Age=0"));
    assert!(common::find_cookie(&cookies, "mk_refresh_token").contains("Max-Age=0"));
}

#[tokio::test]
async fn test_complete_profile_is_cached() {
    let app = common::create_test_app();
    let session = common::user_with_profile(&app.backend, "jane@example.com", "Jane");

    let first = app
        .state
        .guard
        .check(ProtectedPage::Dashboard, Some(&session))
        .await;
    assert!(matches!(first, GuardDecision::Render(_)));
    let reads = app.backend.record_reads();

    let second = app
        .state
        .guard
        .check(ProtectedPage::Dashboard, Some(&session))
        .await;
    assert_eq!(first, second);
    assert_eq!(app.backend.record_reads(), reads);
}

#[tokio::test]
async fn test_user_update_evicts_cached_profile() {
    let app = common::create_test_app();
    let session = common::user_with_profile(&app.backend, "jane@example.com", "Jane");

    let decision = app
        .state
        .guard
        .check(ProtectedPage::Dashboard, Some(&session))
        .await;
    assert!(matches!(decision, GuardDecision::Render(_)));

    // Profile reset behind the cache's back
    app.backend.put_row(
        collections::PROFILES,
        serde_json::json!({ "id": session.user.id, "first_name": "New User" }),
    );
    let decision = app
        .state
        .guard
        .check(ProtectedPage::Dashboard, Some(&session))
        .await;
    assert!(matches!(decision, GuardDecision::Render(_)));

    app.state
        .sessions
        .update_user_metadata(&session, serde_json::json!({ "first_name": "New User" }))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let decision = app
        .state
        .guard
        .check(ProtectedPage::Dashboard, Some(&session))
        .await;
    assert_eq!(decision, GuardDecision::ProfileSetup);
}
