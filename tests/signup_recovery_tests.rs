// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account creation and password recovery tests.
//!
//! These tests verify that:
//! 1. Sign-up signs the new user in, or mails a confirmation link
//! 2. Duplicate and malformed sign-ups are rejected
//! 3. A reset link signs the user in and lands on the password form
//! 4. Changing the password replaces the old one

use axum::{http::StatusCode, response::Response};
use tower::ServiceExt;

mod common;

use common::{cookie_value, find_cookie, get, location, post_form, set_cookie_headers};

/// `Cookie` header value for the session a response just set.
fn session_from(response: &Response) -> String {
    let cookies = set_cookie_headers(response);
    format!(
        "mk_access_token={}; mk_refresh_token={}",
        cookie_value(&find_cookie(&cookies, "mk_access_token")),
        cookie_value(&find_cookie(&cookies, "mk_refresh_token"))
    )
}

#[tokio::test]
async fn test_sign_up_signs_in_and_starts_profile_setup() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/auth/signup",
            None,
            "email=new%40example.com&password=secret123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
    let cookie = session_from(&response);

    let response = app.router.oneshot(get("/", Some(&cookie))).await.unwrap();
    assert_eq!(location(&response), "/profile-setup");
}

#[tokio::test]
async fn test_sign_up_with_existing_email_is_rejected() {
    let app = common::create_test_app();
    app.backend.add_user("jane@example.com", Some("password123"));

    let response = app
        .router
        .oneshot(post_form(
            "/auth/signup",
            None,
            "email=jane%40example.com&password=secret123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = common::body_string(response).await;
    assert!(body.contains("User already registered"));
    assert!(body.contains(r#"value="jane@example.com""#));
}

#[tokio::test]
async fn test_sign_up_with_short_password_is_rejected() {
    let app = common::create_test_app();

    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/auth/signup",
            None,
            "email=new%40example.com&password=abc",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_string(response).await;
    assert!(body.contains("a password of at least 6 characters"));

    // Nothing was registered, so the address is still free
    let response = app
        .router
        .oneshot(post_form(
            "/auth/signup",
            None,
            "email=new%40example.com&password=secret123",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_confirmed_sign_up_completes_through_callback() {
    let app = common::create_test_app();
    app.backend.set_confirm_sign_ups(true);

    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/auth/signup",
            None,
            "email=new%40example.com&password=secret123",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookies = set_cookie_headers(&response);
    assert!(!cookies.iter().any(|c| c.starts_with("mk_access_token=")));
    let verifier = cookie_value(&find_cookie(&cookies, "mk_code_verifier"));
    let body = common::body_string(response).await;
    assert!(body.contains("Check your email for the confirmation link"));

    let links = app.backend.sent_links("new@example.com");
    assert_eq!(links.len(), 1);
    let link = links[0].trim_start_matches("http://localhost:3000");
    assert!(link.starts_with("/auth/callback?code="), "{link}");

    let response = app
        .router
        .oneshot(get(link, Some(&format!("mk_code_verifier={verifier}"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "http://localhost:3000");
    let access = find_cookie(&set_cookie_headers(&response), "mk_access_token");
    assert!(!cookie_value(&access).is_empty());
}

#[tokio::test]
async fn test_recovery_for_unknown_email_sends_nothing() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(post_form("/auth/recover", None, "email=nobody%40example.com"))
        .await
        .unwrap();

    // Same answer as for a known address
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_string(response).await;
    assert!(body.contains("Check your email for the password reset link"));
    assert!(app.backend.sent_links("nobody@example.com").is_empty());
}

#[tokio::test]
async fn test_recovery_with_invalid_email_is_rejected() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(post_form("/auth/recover", None, "email=not-an-email"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_reset_flow() {
    let app = common::create_test_app();
    app.backend.add_user("jane@example.com", Some("password123"));

    // Ask for a reset link
    let response = app
        .router
        .clone()
        .oneshot(post_form("/auth/recover", None, "email=jane%40example.com"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let verifier = cookie_value(&find_cookie(
        &set_cookie_headers(&response),
        "mk_code_verifier",
    ));

    let links = app.backend.sent_links("jane@example.com");
    assert_eq!(links.len(), 1);
    assert!(links[0].contains("next=%2Fsignin"), "{}", links[0]);
    let link = links[0].trim_start_matches("http://localhost:3000");

    // Following it signs in and lands on the sign-in page
    let response = app
        .router
        .clone()
        .oneshot(get(link, Some(&format!("mk_code_verifier={verifier}"))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "http://localhost:3000/signin");
    let cookie = session_from(&response);

    let response = app
        .router
        .clone()
        .oneshot(get("/signin", Some(&cookie)))
        .await
        .unwrap();
    let body = common::body_string(response).await;
    assert!(body.contains(r#"action="/auth/password""#));

    // Set a new password
    let response = app
        .router
        .clone()
        .oneshot(post_form("/auth/password", Some(&cookie), "password=newsecret1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_string(response).await;
    assert!(body.contains("Your password has been updated"));

    // Only the new password works now
    let response = app
        .router
        .clone()
        .oneshot(post_form(
            "/auth/signin",
            None,
            "email=jane%40example.com&password=password123",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .oneshot(post_form(
            "/auth/signin",
            None,
            "email=jane%40example.com&password=newsecret1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_short_new_password_is_rejected() {
    let app = common::create_test_app();
    let session = common::signed_in_user(&app.backend, "jane@example.com");

    let response = app
        .router
        .oneshot(post_form(
            "/auth/password",
            Some(&common::session_cookie(&session)),
            "password=abc",
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_string(response).await;
    assert!(body.contains("Password should be at least 6 characters"));
}

#[tokio::test]
async fn test_password_change_requires_session() {
    let app = common::create_test_app();

    let response = app
        .router
        .oneshot(post_form("/auth/password", None, "password=newsecret1"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/signin");
}
