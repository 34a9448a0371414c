// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! HTTP route handlers.

pub mod api;
pub mod auth;
pub mod offline;
pub mod pages;

use crate::middleware::guard::{require_dashboard, require_profile_setup};
use crate::middleware::{load_session, require_session};
use crate::AppState;
use axum::{middleware, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub build_id: String,
}

/// Health check response
async fn health_check() -> Json<HealthResponse> {
    let build_id = option_env!("BUILD_ID").unwrap_or("unknown").to_string();
    Json(HealthResponse {
        status: "ok".to_string(),
        build_id,
    })
}

/// Build the complete router with all routes.
pub fn create_router(state: Arc<AppState>) -> Router {
    // Pages behind the route guard
    let guarded_pages = pages::dashboard_routes()
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_dashboard,
        ))
        .merge(pages::profile_setup_routes().route_layer(
            middleware::from_fn_with_state(state.clone(), require_profile_setup),
        ));

    // API routes need a session but never redirect
    let api_routes = api::routes().route_layer(middleware::from_fn(require_session));

    // Everything that looks at session cookies
    let session_routes = Router::new()
        .merge(auth::routes())
        .merge(guarded_pages)
        .merge(api_routes)
        .route_layer(middleware::from_fn_with_state(state.clone(), load_session));

    let mut router = Router::new()
        .route("/health", get(health_check))
        .nest_service("/assets", ServeDir::new(&state.config.assets_dir))
        .merge(session_routes);

    // Stand-in for the hosted authorize page
    if state.offline_provider.is_some() {
        router = router.merge(offline::routes());
    }

    router
        .layer(middleware::from_fn(
            crate::middleware::security::add_security_headers,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
