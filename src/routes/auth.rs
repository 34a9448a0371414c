// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Sign-in, OAuth callback and sign-out routes.

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Extension, Form, Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::net::IpAddr;
use std::sync::Arc;
use validator::Validate;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::middleware::session::{
    clear_session_cookies, clear_verifier_cookie, set_session_cookies, set_verifier_cookie,
    CurrentSession, CALLBACK_PATH, VERIFIER_COOKIE,
};
use crate::models::OAuthProvider;
use crate::services::pkce;
use crate::views::pages::{self, SigninPage};
use crate::AppState;

/// Where a password reset link lands once the code is exchanged.
const RECOVERY_NEXT: &str = "/signin";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signin", get(signin_page))
        .route("/auth/signin", post(password_signin))
        .route("/auth/signin/{provider}", get(provider_signin))
        .route("/auth/signup", post(sign_up))
        .route("/auth/recover", post(recover_password))
        .route("/auth/password", post(update_password))
        .route(CALLBACK_PATH, get(auth_callback))
        .route("/auth/signout", post(signout))
}

/// Scheme and host the browser used to reach us.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestOrigin {
    pub scheme: String,
    pub host: String,
}

impl RequestOrigin {
    /// Derive the origin from proxy headers, falling back to `Host`.
    ///
    /// Without `X-Forwarded-Proto`, loopback hosts are assumed to be plain
    /// http and everything else https.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let first = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let host = first("x-forwarded-host")
            .or_else(|| first(header::HOST.as_str()))
            .unwrap_or("localhost:3000")
            .to_string();

        let scheme = match first("x-forwarded-proto") {
            Some(proto) => proto.to_ascii_lowercase(),
            None if is_loopback_host(&host) => "http".to_string(),
            None => "https".to_string(),
        };

        Self { scheme, host }
    }

    pub fn is_loopback(&self) -> bool {
        is_loopback_host(&self.host)
    }

    pub fn url(&self) -> String {
        format!("{}://{}", self.scheme, self.host)
    }
}

/// Host without its port (and without IPv6 brackets).
fn hostname(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}

/// Whether a `Host` value names this machine.
pub fn is_loopback_host(host: &str) -> bool {
    let name = hostname(host).to_ascii_lowercase();
    if name == "localhost" || name.ends_with(".localhost") {
        return true;
    }
    name.parse::<IpAddr>()
        .map(|ip| ip.is_loopback() || ip.is_unspecified())
        .unwrap_or(false)
}

/// Where the callback sends the browser.
///
/// The request's own origin, except that a production deployment never
/// redirects to a loopback address; it uses the fixed production URL.
pub fn redirect_target(origin: &RequestOrigin, config: &Config) -> String {
    if config.production && origin.is_loopback() {
        tracing::warn!(
            host = %origin.host,
            "Production request resolved to a loopback origin, using production URL"
        );
        return config.production_url.clone();
    }
    origin.url()
}

/// URL the provider returns the browser to after an external step.
///
/// `REDIRECT_URL` wins over the request's own origin. `next` is carried
/// through to the callback.
fn callback_url(headers: &HeaderMap, config: &Config, next: Option<&str>) -> String {
    let base = match &config.redirect_url {
        Some(url) => url.clone(),
        None => format!(
            "{}{}",
            RequestOrigin::from_headers(headers).url(),
            CALLBACK_PATH
        ),
    };
    match next {
        Some(next) => {
            let separator = if base.contains('?') { '&' } else { '?' };
            format!("{}{}next={}", base, separator, urlencoding::encode(next))
        }
        None => base,
    }
}

/// A same-site path to continue to after the callback.
fn local_path(next: Option<&str>) -> Option<&str> {
    next.filter(|p| p.starts_with('/') && !p.starts_with("//") && !p.contains('\\'))
}

#[derive(Deserialize)]
pub struct SignInPageParams {
    #[serde(default)]
    error: Option<String>,
}

/// Sign-in page; shows who is signed in when there is a session.
async fn signin_page(
    Extension(current): Extension<CurrentSession>,
    Query(params): Query<SignInPageParams>,
) -> maud::Markup {
    let email = current
        .0
        .as_ref()
        .map(|s| s.user.email.clone().unwrap_or_else(|| s.user.id.clone()));
    pages::signin(&SigninPage {
        signed_in_as: email.as_deref(),
        error: params.error.as_deref(),
        ..Default::default()
    })
}

/// Start an external sign-in with a fresh PKCE verifier.
async fn provider_signin(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    let provider: OAuthProvider = provider.parse().map_err(AppError::BadRequest)?;

    let verifier = pkce::generate_verifier()?;
    let challenge = pkce::challenge_for(&verifier);

    let redirect_to = callback_url(&headers, &state.config, None);

    let url = state
        .sessions
        .authorize_url(provider, &redirect_to, &challenge);

    tracing::info!(%provider, redirect_to = %redirect_to, "Starting external sign-in");

    let jar = set_verifier_cookie(jar, verifier, state.config.cookie_secure());
    Ok((jar, Redirect::to(&url)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordSignInForm {
    #[validate(email)]
    #[serde(default)]
    email: String,
    #[validate(length(min = 1))]
    #[serde(default)]
    password: String,
}

const INVALID_SIGNIN_INPUT: &str = "Enter a valid email address and password";

/// Email and password sign-in.
async fn password_signin(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(form): Form<PasswordSignInForm>,
) -> Response {
    let email = form.email.trim().to_string();

    if form.validate().is_err() {
        return (
            StatusCode::BAD_REQUEST,
            pages::signin(&SigninPage {
                error: Some(INVALID_SIGNIN_INPUT),
                email: &email,
                ..Default::default()
            }),
        )
            .into_response();
    }

    match state
        .sessions
        .sign_in_with_password(&email, &form.password)
        .await
    {
        Ok(session) => {
            tracing::info!(user_id = %session.user_id(), "Password sign-in");
            let jar = set_session_cookies(jar, &session, state.config.cookie_secure());
            (jar, Redirect::to("/")).into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "Password sign-in rejected");
            (
                StatusCode::UNAUTHORIZED,
                pages::signin(&SigninPage {
                    error: Some(&e.user_message()),
                    email: &email,
                    ..Default::default()
                }),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignUpForm {
    #[validate(email)]
    #[serde(default)]
    email: String,
    #[validate(length(min = 6))]
    #[serde(default)]
    password: String,
}

const INVALID_SIGNUP_INPUT: &str =
    "Enter a valid email address and a password of at least 6 characters";
const CONFIRM_EMAIL_NOTICE: &str = "Check your email for the confirmation link";

/// Email and password sign-up.
///
/// Signs the new user in straight away unless the provider wants the
/// address confirmed; the confirmation link then completes through the
/// callback like an external sign-in.
async fn sign_up(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<SignUpForm>,
) -> Result<Response> {
    let email = form.email.trim().to_string();

    if form.validate().is_err() {
        return Ok((
            StatusCode::BAD_REQUEST,
            pages::signin(&SigninPage {
                error: Some(INVALID_SIGNUP_INPUT),
                email: &email,
                ..Default::default()
            }),
        )
            .into_response());
    }

    let secure = state.config.cookie_secure();
    let verifier = pkce::generate_verifier()?;
    let redirect_to = callback_url(&headers, &state.config, None);

    let response = match state
        .sessions
        .sign_up(&email, &form.password, &redirect_to, &pkce::challenge_for(&verifier))
        .await
    {
        Ok(Some(session)) => {
            tracing::info!(user_id = %session.user_id(), "Signed up");
            (set_session_cookies(jar, &session, secure), Redirect::to("/")).into_response()
        }
        Ok(None) => {
            tracing::info!("Sign-up awaiting email confirmation");
            (
                set_verifier_cookie(jar, verifier, secure),
                pages::signin(&SigninPage {
                    notice: Some(CONFIRM_EMAIL_NOTICE),
                    email: &email,
                    ..Default::default()
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::info!(error = %e, "Sign-up rejected");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                pages::signin(&SigninPage {
                    error: Some(&e.user_message()),
                    email: &email,
                    ..Default::default()
                }),
            )
                .into_response()
        }
    };
    Ok(response)
}

#[derive(Debug, Deserialize, Validate)]
pub struct RecoverForm {
    #[validate(email)]
    #[serde(default)]
    email: String,
}

const INVALID_EMAIL: &str = "Enter a valid email address";
const RESET_LINK_NOTICE: &str = "Check your email for the password reset link";

/// Mail a password reset link. The link signs the user in and lands on
/// the sign-in page, where the password can be changed.
async fn recover_password(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Form(form): Form<RecoverForm>,
) -> Result<Response> {
    let email = form.email.trim().to_string();

    if form.validate().is_err() {
        return Ok((
            StatusCode::BAD_REQUEST,
            pages::signin(&SigninPage {
                error: Some(INVALID_EMAIL),
                email: &email,
                ..Default::default()
            }),
        )
            .into_response());
    }

    let verifier = pkce::generate_verifier()?;
    let redirect_to = callback_url(&headers, &state.config, Some(RECOVERY_NEXT));

    let response = match state
        .sessions
        .recover_password(&email, &redirect_to, &pkce::challenge_for(&verifier))
        .await
    {
        Ok(()) => (
            set_verifier_cookie(jar, verifier, state.config.cookie_secure()),
            pages::signin(&SigninPage {
                notice: Some(RESET_LINK_NOTICE),
                email: &email,
                ..Default::default()
            }),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Password recovery request failed");
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                pages::signin(&SigninPage {
                    error: Some(&e.user_message()),
                    email: &email,
                    ..Default::default()
                }),
            )
                .into_response()
        }
    };
    Ok(response)
}

#[derive(Debug, Deserialize, Validate)]
pub struct PasswordForm {
    #[validate(length(min = 6))]
    #[serde(default)]
    password: String,
}

const INVALID_PASSWORD: &str = "Password should be at least 6 characters";
const PASSWORD_UPDATED: &str = "Your password has been updated";

/// Change the signed-in user's password.
async fn update_password(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Form(form): Form<PasswordForm>,
) -> Response {
    let Some(session) = current.0 else {
        return Redirect::to("/signin").into_response();
    };
    let email = session
        .user
        .email
        .clone()
        .unwrap_or_else(|| session.user.id.clone());

    let (status, error, notice) = if form.validate().is_err() {
        (StatusCode::BAD_REQUEST, Some(INVALID_PASSWORD.to_string()), None)
    } else {
        match state.sessions.update_password(&session, &form.password).await {
            Ok(_) => {
                tracing::info!(user_id = %session.user_id(), "Password updated");
                (StatusCode::OK, None, Some(PASSWORD_UPDATED))
            }
            Err(e) => {
                tracing::info!(error = %e, user_id = %session.user_id(), "Password update rejected");
                (StatusCode::UNPROCESSABLE_ENTITY, Some(e.user_message()), None)
            }
        }
    };

    (
        status,
        pages::signin(&SigninPage {
            signed_in_as: Some(&email),
            error: error.as_deref(),
            notice,
            ..Default::default()
        }),
    )
        .into_response()
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    next: Option<String>,
}

/// OAuth callback: exchange the code for a session, then always redirect.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let secure = state.config.cookie_secure();
    let origin = RequestOrigin::from_headers(&headers);
    let target = redirect_target(&origin, &state.config);

    let verifier = jar.get(VERIFIER_COOKIE).map(|c| c.value().to_string());
    let jar = clear_verifier_cookie(jar, secure);

    let failure = |code: &str| {
        let url = format!("{}/signin?error={}", target, urlencoding::encode(code));
        Redirect::to(&url)
    };

    if let Some(error) = params.error.as_deref() {
        tracing::warn!(
            error,
            description = params.error_description.as_deref().unwrap_or_default(),
            "OAuth provider returned an error"
        );
        return (jar, failure(error));
    }

    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return (jar, Redirect::to(&target));
    };

    let Some(verifier) = verifier else {
        tracing::warn!("OAuth callback without a code verifier");
        return (jar, failure("missing_code_verifier"));
    };

    match state
        .sessions
        .exchange_code_for_session(code, &verifier)
        .await
    {
        Ok(session) => {
            let destination = match local_path(params.next.as_deref()) {
                Some(path) => format!("{}{}", target, path),
                None => target,
            };
            tracing::info!(user_id = %session.user_id(), destination = %destination, "Code exchange complete");
            (set_session_cookies(jar, &session, secure), Redirect::to(&destination))
        }
        Err(e) => {
            tracing::warn!(error = %e, "Code exchange failed");
            (jar, failure("exchange_failed"))
        }
    }
}

/// Sign out. Local cookies are cleared even if the provider call fails.
async fn signout(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    if let Some(session) = current.0.as_ref() {
        match state.sessions.sign_out(session).await {
            Ok(()) => tracing::info!(user_id = %session.user_id(), "Signed out"),
            Err(e) => {
                tracing::warn!(error = %e, user_id = %session.user_id(), "Provider sign-out failed")
            }
        }
    }

    (
        clear_session_cookies(jar, state.config.cookie_secure()),
        Redirect::to("/signin"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_loopback_hosts() {
        for host in [
            "localhost",
            "localhost:3000",
            "127.0.0.1:8080",
            "127.1.2.3",
            "[::1]:3000",
            "0.0.0.0:3000",
            "app.localhost",
        ] {
            assert!(is_loopback_host(host), "{host}");
        }
        for host in ["example.com", "memory-keeper-wine.vercel.app", "10.0.0.5:3000"] {
            assert!(!is_loopback_host(host), "{host}");
        }
    }

    #[test]
    fn test_origin_from_host() {
        let origin = RequestOrigin::from_headers(&headers(&[("host", "localhost:3000")]));
        assert_eq!(origin.url(), "http://localhost:3000");

        let origin = RequestOrigin::from_headers(&headers(&[("host", "example.com")]));
        assert_eq!(origin.url(), "https://example.com");
    }

    #[test]
    fn test_origin_prefers_forwarded_headers() {
        let origin = RequestOrigin::from_headers(&headers(&[
            ("host", "10.0.0.5:8080"),
            ("x-forwarded-host", "memories.example.com"),
            ("x-forwarded-proto", "https, http"),
        ]));
        assert_eq!(origin.url(), "https://memories.example.com");
    }

    #[test]
    fn test_callback_url_carries_next() {
        let mut config = Config::test_default();
        let local = headers(&[("host", "localhost:3000")]);

        assert_eq!(
            callback_url(&local, &config, None),
            "http://localhost:3000/auth/callback"
        );
        assert_eq!(
            callback_url(&local, &config, Some("/signin")),
            "http://localhost:3000/auth/callback?next=%2Fsignin"
        );

        config.redirect_url = Some("https://memories.example.com/auth/callback?x=1".to_string());
        assert_eq!(
            callback_url(&local, &config, Some("/signin")),
            "https://memories.example.com/auth/callback?x=1&next=%2Fsignin"
        );
    }

    #[test]
    fn test_local_path_rejects_other_sites() {
        assert_eq!(local_path(Some("/signin")), Some("/signin"));
        assert_eq!(local_path(Some("//evil.example")), None);
        assert_eq!(local_path(Some("https://evil.example")), None);
        assert_eq!(local_path(Some("/\\evil.example")), None);
        assert_eq!(local_path(None), None);
    }

    #[test]
    fn test_redirect_target_overrides_loopback_in_production() {
        let mut config = Config::test_default();
        let local = RequestOrigin::from_headers(&headers(&[("host", "localhost:3000")]));

        assert_eq!(redirect_target(&local, &config), "http://localhost:3000");

        config.production = true;
        assert_eq!(
            redirect_target(&local, &config),
            "https://memory-keeper-wine.vercel.app"
        );

        let public = RequestOrigin::from_headers(&headers(&[("host", "example.com")]));
        assert_eq!(redirect_target(&public, &config), "https://example.com");
    }
}
