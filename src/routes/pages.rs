// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Guarded HTML pages: the dashboard and profile setup.
//!
//! The route guard is applied in routes/mod.rs; handlers here can rely on
//! the [`Viewer`] extension being present.

use crate::middleware::session::CurrentSession;
use crate::models::{Viewer, PLACEHOLDER_FIRST_NAME};
use crate::services::profile_setup::USERNAME_TAKEN;
use crate::services::{Availability, FormError, ProfileForm};
use crate::views::pages;
use crate::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Extension, Form, Router,
};
use std::sync::Arc;

pub fn dashboard_routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(dashboard))
}

pub fn profile_setup_routes() -> Router<Arc<AppState>> {
    Router::new().route("/profile-setup", get(profile_setup).post(submit_profile))
}

async fn dashboard(Extension(viewer): Extension<Viewer>) -> maud::Markup {
    pages::dashboard(&viewer)
}

/// Form prefilled from whatever partial profile exists.
fn initial_form(viewer: &Viewer) -> ProfileForm {
    ProfileForm {
        username: viewer.username.clone().unwrap_or_default(),
        first_name: viewer
            .first_name
            .clone()
            .filter(|name| name != PLACEHOLDER_FIRST_NAME)
            .unwrap_or_default(),
        last_name: viewer.last_name.clone().unwrap_or_default(),
        ..Default::default()
    }
}

async fn profile_setup(Extension(viewer): Extension<Viewer>) -> maud::Markup {
    pages::profile_setup(&initial_form(&viewer), None, Availability::Idle)
}

async fn submit_profile(
    State(state): State<Arc<AppState>>,
    Extension(current): Extension<CurrentSession>,
    Form(form): Form<ProfileForm>,
) -> Response {
    let Some(session) = current.0 else {
        return Redirect::to("/signin").into_response();
    };

    match state
        .profile_setup
        .submit(&session, &form, |_| Redirect::to("/"))
        .await
    {
        Ok(redirect) => redirect.into_response(),
        Err(e) => {
            tracing::debug!(error = %e, user_id = %session.user_id(), "Profile setup rejected");
            let availability = match &e {
                FormError::Invalid(message) if *message == USERNAME_TAKEN => Availability::Taken,
                _ => Availability::Idle,
            };
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                pages::profile_setup(&form, Some(&e.to_string()), availability),
            )
                .into_response()
        }
    }
}
