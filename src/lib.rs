// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Memory Keeper: a session-gated memories site.
//!
//! Users sign in through a hosted auth provider, complete a short profile
//! and then reach their memory dashboard. This crate is the web server:
//! provider access, the route guard, profile setup and the HTML pages.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;
pub mod views;

use config::Config;
use db::ProfileRepo;
use middleware::RouteGuard;
use services::{Backend, MemoryBackend, ProfileSetup, SessionClient};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub sessions: SessionClient,
    pub profiles: ProfileRepo,
    pub profile_setup: ProfileSetup,
    pub guard: Arc<RouteGuard>,
    /// In-memory provider when running offline; its authorize endpoint is
    /// served locally.
    pub offline_provider: Option<Arc<MemoryBackend>>,
}

impl AppState {
    /// Wire up services around a provider backend.
    ///
    /// Must be called inside a Tokio runtime; the route guard starts a
    /// listener task for session events.
    pub fn new(config: Config, backend: Arc<dyn Backend>) -> Arc<Self> {
        Self::build(config, backend, None)
    }

    /// Wire up services around the in-memory provider, adding the
    /// configured development account if there is one.
    pub fn offline(config: Config, provider: Arc<MemoryBackend>) -> Arc<Self> {
        if let Some((email, password)) = config.offline_user() {
            let user = provider.add_user(email, Some(password));
            tracing::info!(email, user_id = %user.id, "Seeded offline user");
        }
        Self::build(config, provider.clone(), Some(provider))
    }

    fn build(
        config: Config,
        backend: Arc<dyn Backend>,
        offline_provider: Option<Arc<MemoryBackend>>,
    ) -> Arc<Self> {
        let sessions = SessionClient::new(backend, config.supabase_jwt_secret.as_deref());
        let profiles = ProfileRepo::new(sessions.clone());
        let profile_setup = ProfileSetup::new(sessions.clone(), profiles.clone());
        let guard = RouteGuard::start(&sessions, profiles.clone());

        Arc::new(Self {
            config,
            sessions,
            profiles,
            profile_setup,
            guard,
            offline_provider,
        })
    }
}
