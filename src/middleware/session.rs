// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session cookies and the middleware that resolves them.

use crate::models::{Session, SessionTokens};
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;

pub const ACCESS_COOKIE: &str = "mk_access_token";
pub const REFRESH_COOKIE: &str = "mk_refresh_token";
/// PKCE verifier, only sent back to the callback.
pub const VERIFIER_COOKIE: &str = "mk_code_verifier";

pub const CALLBACK_PATH: &str = "/auth/callback";

const SESSION_COOKIE_DAYS: i64 = 30;
const VERIFIER_COOKIE_MINUTES: i64 = 10;

/// Session resolved for this request, if any.
#[derive(Debug, Clone, Default)]
pub struct CurrentSession(pub Option<Session>);

/// Read session tokens from the request cookies.
pub fn tokens_from_jar(jar: &CookieJar) -> SessionTokens {
    let value = |name: &str| {
        jar.get(name)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty())
    };
    SessionTokens {
        access_token: value(ACCESS_COOKIE),
        refresh_token: value(REFRESH_COOKIE),
    }
}

fn build_cookie(
    name: &'static str,
    value: String,
    path: &'static str,
    max_age: time::Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(path)
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(max_age)
        .build()
}

/// Store both session tokens.
pub fn set_session_cookies(jar: CookieJar, session: &Session, secure: bool) -> CookieJar {
    let max_age = time::Duration::days(SESSION_COOKIE_DAYS);
    jar.add(build_cookie(
        ACCESS_COOKIE,
        session.access_token.clone(),
        "/",
        max_age,
        secure,
    ))
    .add(build_cookie(
        REFRESH_COOKIE,
        session.refresh_token.clone(),
        "/",
        max_age,
        secure,
    ))
}

/// Expire both session tokens.
pub fn clear_session_cookies(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(build_cookie(
        ACCESS_COOKIE,
        String::new(),
        "/",
        time::Duration::ZERO,
        secure,
    ))
    .add(build_cookie(
        REFRESH_COOKIE,
        String::new(),
        "/",
        time::Duration::ZERO,
        secure,
    ))
}

pub fn set_verifier_cookie(jar: CookieJar, verifier: String, secure: bool) -> CookieJar {
    jar.add(build_cookie(
        VERIFIER_COOKIE,
        verifier,
        CALLBACK_PATH,
        time::Duration::minutes(VERIFIER_COOKIE_MINUTES),
        secure,
    ))
}

pub fn clear_verifier_cookie(jar: CookieJar, secure: bool) -> CookieJar {
    jar.add(build_cookie(
        VERIFIER_COOKIE,
        String::new(),
        CALLBACK_PATH,
        time::Duration::ZERO,
        secure,
    ))
}

/// Resolve the session from cookies and attach it as [`CurrentSession`].
///
/// Refreshed tokens are written back and unusable ones cleared, unless the
/// handler already set cookies of its own.
pub async fn load_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let tokens = tokens_from_jar(&jar);
    let secure = state.config.cookie_secure();

    let (session, cookie_update) = if tokens.is_empty() {
        (None, None)
    } else {
        match state.sessions.get_current_session(&tokens).await {
            Ok(Some(resolved)) => {
                let update = resolved
                    .refreshed
                    .then(|| set_session_cookies(CookieJar::new(), &resolved.session, secure));
                (Some(resolved.session), update)
            }
            Ok(None) => {
                tracing::debug!("Stale session cookies, clearing");
                (None, Some(clear_session_cookies(CookieJar::new(), secure)))
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to resolve session");
                (None, None)
            }
        }
    };

    request.extensions_mut().insert(CurrentSession(session));
    let response = next.run(request).await;

    match cookie_update {
        Some(update) if !response.headers().contains_key(header::SET_COOKIE) => {
            (update, response).into_response()
        }
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cookie_headers(jar: CookieJar) -> Vec<String> {
        jar.into_response()
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_tokens_from_jar_ignores_empty_values() {
        let jar = CookieJar::new()
            .add(Cookie::new(ACCESS_COOKIE, "at"))
            .add(Cookie::new(REFRESH_COOKIE, ""));
        let tokens = tokens_from_jar(&jar);
        assert_eq!(tokens.access_token.as_deref(), Some("at"));
        assert_eq!(tokens.refresh_token, None);
    }

    #[test]
    fn test_verifier_cookie_scoped_to_callback() {
        let headers = cookie_headers(set_verifier_cookie(CookieJar::new(), "v".into(), true));
        assert_eq!(headers.len(), 1);
        assert!(headers[0].starts_with("mk_code_verifier=v"));
        assert!(headers[0].contains("Path=/auth/callback"));
        assert!(headers[0].contains("HttpOnly"));
        assert!(headers[0].contains("Secure"));
        assert!(headers[0].contains("Max-Age=600"));
    }

    #[test]
    fn test_clear_session_cookies() {
        let headers = cookie_headers(clear_session_cookies(CookieJar::new(), false));
        assert_eq!(headers.len(), 2);
        for h in &headers {
            assert!(h.contains("Max-Age=0"));
            assert!(h.contains("Path=/"));
            assert!(!h.contains("Secure"));
        }
    }
}
