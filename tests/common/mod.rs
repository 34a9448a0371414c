// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request},
    response::Response,
};
use memory_keeper::config::Config;
use memory_keeper::db::collections;
use memory_keeper::models::Session;
use memory_keeper::routes::create_router;
use memory_keeper::services::MemoryBackend;
use memory_keeper::AppState;
use std::sync::Arc;

/// Test app wired to an in-memory provider.
#[allow(dead_code)]
pub struct TestApp {
    pub router: axum::Router,
    pub state: Arc<AppState>,
    pub backend: Arc<MemoryBackend>,
}

/// Create a test app with the default offline config.
#[allow(dead_code)]
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    let state = AppState::new(config, backend.clone());
    TestApp {
        router: create_router(state.clone()),
        state,
        backend,
    }
}

/// Test app running the offline provider, local authorize page included.
#[allow(dead_code)]
pub fn create_offline_app(config: Config) -> TestApp {
    let backend = Arc::new(MemoryBackend::new());
    let state = AppState::offline(config, backend.clone());
    TestApp {
        router: create_router(state.clone()),
        state,
        backend,
    }
}

/// Register a user and sign them in.
#[allow(dead_code)]
pub fn signed_in_user(backend: &MemoryBackend, email: &str) -> Session {
    let user = backend.add_user(email, Some("password123"));
    backend.issue_session(&user.id).unwrap()
}

/// Register a user with a complete profile and sign them in.
#[allow(dead_code)]
pub fn user_with_profile(backend: &MemoryBackend, email: &str, first_name: &str) -> Session {
    let session = signed_in_user(backend, email);
    backend.put_row(
        collections::PROFILES,
        serde_json::json!({
            "id": session.user.id,
            "first_name": first_name,
            "last_name": null,
            "username": null,
        }),
    );
    session
}

/// `Cookie` header value carrying a session.
#[allow(dead_code)]
pub fn session_cookie(session: &Session) -> String {
    format!(
        "mk_access_token={}; mk_refresh_token={}",
        session.access_token, session.refresh_token
    )
}

#[allow(dead_code)]
pub fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header(header::HOST, "localhost:3000");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub fn post_form(uri: &str, cookie: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::HOST, "localhost:3000")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[allow(dead_code)]
pub fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .expect("missing Location header")
        .to_str()
        .unwrap()
}

#[allow(dead_code)]
pub fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

#[allow(dead_code)]
pub fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

/// Value of a `name=value; ...` Set-Cookie header.
#[allow(dead_code)]
pub fn cookie_value(set_cookie: &str) -> String {
    set_cookie
        .split(';')
        .next()
        .and_then(|pair| pair.split_once('='))
        .map(|(_, value)| value.to_string())
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
