// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Route guard: decides whether a protected page renders or redirects.
//!
//! The decision depends only on whether there is a session and whether the
//! user's profile is complete. Complete profiles are cached per user for a
//! short time; the cache entry is dropped when the user signs out or their
//! metadata changes.

use crate::db::ProfileRepo;
use crate::middleware::session::CurrentSession;
use crate::models::{ProfileSummary, Session, Viewer};
use crate::services::{SessionClient, SessionEventKind};
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::broadcast::error::RecvError;

/// How long a complete profile is trusted without re-reading it.
pub const PROFILE_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProtectedPage {
    Dashboard,
    ProfileSetup,
}

impl ProtectedPage {
    /// Name used in the session events query string.
    pub fn as_str(self) -> &'static str {
        match self {
            ProtectedPage::Dashboard => "dashboard",
            ProtectedPage::ProfileSetup => "profile-setup",
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            ProtectedPage::Dashboard => "/",
            ProtectedPage::ProfileSetup => "/profile-setup",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum GuardDecision {
    SignIn,
    ProfileSetup,
    Home,
    Render(Viewer),
}

impl GuardDecision {
    /// Where to send the browser, or `None` to render.
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            GuardDecision::SignIn => Some("/signin"),
            GuardDecision::ProfileSetup => Some(ProtectedPage::ProfileSetup.path()),
            GuardDecision::Home => Some(ProtectedPage::Dashboard.path()),
            GuardDecision::Render(_) => None,
        }
    }
}

fn viewer_for(session: &Session, profile: Option<&ProfileSummary>) -> Viewer {
    Viewer {
        user_id: session.user.id.clone(),
        email: session.user.email.clone(),
        first_name: profile.and_then(|p| p.first_name.clone()),
        last_name: profile.and_then(|p| p.last_name.clone()),
        username: profile.and_then(|p| p.username.clone()),
    }
}

/// Pure guard decision.
///
/// No session always means sign-in. The dashboard needs a complete profile;
/// the setup page is only for users without one.
pub fn decide(
    page: ProtectedPage,
    session: Option<&Session>,
    profile: Option<&ProfileSummary>,
) -> GuardDecision {
    let Some(session) = session else {
        return GuardDecision::SignIn;
    };
    let complete = profile.is_some_and(ProfileSummary::is_complete);

    match (page, complete) {
        (ProtectedPage::Dashboard, false) => GuardDecision::ProfileSetup,
        (ProtectedPage::ProfileSetup, true) => GuardDecision::Home,
        _ => GuardDecision::Render(viewer_for(session, profile)),
    }
}

struct CachedProfile {
    profile: ProfileSummary,
    cached_at: Instant,
}

/// Shared guard with a per-user cache of complete profiles.
pub struct RouteGuard {
    profiles: ProfileRepo,
    cache: DashMap<String, CachedProfile>,
    ttl: Duration,
}

impl RouteGuard {
    /// Create the guard and start evicting on session events.
    pub fn start(sessions: &SessionClient, profiles: ProfileRepo) -> Arc<Self> {
        let guard = Arc::new(Self {
            profiles,
            cache: DashMap::new(),
            ttl: PROFILE_CACHE_TTL,
        });

        let mut events = sessions.subscribe();
        let weak: Weak<Self> = Arc::downgrade(&guard);
        tokio::spawn(async move {
            loop {
                let event = events.recv().await;
                let Some(guard) = weak.upgrade() else {
                    break;
                };
                match event {
                    Ok(event) => {
                        if matches!(
                            event.kind,
                            SessionEventKind::SignedOut | SessionEventKind::UserUpdated
                        ) {
                            guard.evict(&event.user_id);
                        }
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Guard missed session events, clearing cache");
                        guard.cache.clear();
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            tracing::debug!("Route guard listener stopped");
        });

        guard
    }

    pub fn evict(&self, user_id: &str) {
        self.cache.remove(user_id);
    }

    fn cached(&self, user_id: &str) -> Option<ProfileSummary> {
        let entry = self.cache.get(user_id)?;
        if entry.cached_at.elapsed() < self.ttl {
            return Some(entry.profile.clone());
        }
        drop(entry);
        self.cache.remove(user_id);
        None
    }

    /// Decide for `page`, reading the profile when it is not cached.
    ///
    /// A failed profile read is treated like a missing profile.
    pub async fn check(&self, page: ProtectedPage, session: Option<&Session>) -> GuardDecision {
        let Some(session) = session else {
            return GuardDecision::SignIn;
        };
        let user_id = session.user_id();

        if let Some(profile) = self.cached(user_id) {
            return decide(page, Some(session), Some(&profile));
        }

        let profile = match self.profiles.get_summary(session, user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, user_id, "Profile lookup failed in route guard");
                None
            }
        };

        if let Some(profile) = profile.as_ref().filter(|p| p.is_complete()) {
            self.cache.insert(
                user_id.to_string(),
                CachedProfile {
                    profile: profile.clone(),
                    cached_at: Instant::now(),
                },
            );
        }

        decide(page, Some(session), profile.as_ref())
    }
}

async fn guard_page(
    page: ProtectedPage,
    state: Arc<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let session = request
        .extensions()
        .get::<CurrentSession>()
        .and_then(|s| s.0.clone());

    match state.guard.check(page, session.as_ref()).await {
        GuardDecision::Render(viewer) => {
            request.extensions_mut().insert(viewer);
            next.run(request).await
        }
        decision => {
            let target = decision.redirect_target().unwrap_or("/signin");
            tracing::debug!(page = page.path(), target, "Route guard redirect");
            Redirect::to(target).into_response()
        }
    }
}

/// Only users with a complete profile reach the dashboard.
pub async fn require_dashboard(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard_page(ProtectedPage::Dashboard, state, request, next).await
}

/// Only signed-in users without a complete profile reach profile setup.
pub async fn require_profile_setup(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    guard_page(ProtectedPage::ProfileSetup, state, request, next).await
}
