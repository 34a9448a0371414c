// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for signed-in users.

use crate::error::Result;
use crate::middleware::guard::{GuardDecision, ProtectedPage};
use crate::models::{Profile, Session};
use crate::services::username::CHECK_DEBOUNCE;
use crate::services::{
    Availability, CheckOutcome, CheckOutcomes, SessionEventKind, SessionSubscription,
    UsernameChecker,
};
use crate::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{
        sse::{Event, KeepAlive, Sse},
        Response,
    },
    routing::get,
    Extension, Json, Router,
};
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// API routes (require a session).
/// The session middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route(
            "/api/profile/username-availability",
            get(username_availability),
        )
        .route("/api/profile/username-check/ws", get(username_check_ws))
        .route("/api/session/events", get(session_events))
}

// ─── User ────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
pub struct MeResponse {
    pub user_id: String,
    pub email: Option<String>,
    pub profile_complete: bool,
    /// Full profile row; `None` until the backend has created one
    pub profile: Option<Profile>,
}

async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
) -> Result<Json<MeResponse>> {
    let profile = state
        .profiles
        .get_profile(&session, session.user_id())
        .await?;

    Ok(Json(MeResponse {
        user_id: session.user.id.clone(),
        email: session.user.email.clone(),
        profile_complete: profile.as_ref().is_some_and(Profile::is_complete),
        profile,
    }))
}

// ─── Username availability ───────────────────────────────────

#[derive(Deserialize)]
pub struct AvailabilityParams {
    #[serde(default)]
    username: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AvailabilityResponse {
    pub username: String,
    pub availability: Availability,
}

async fn username_availability(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<AvailabilityParams>,
) -> Json<AvailabilityResponse> {
    let availability = state
        .profile_setup
        .availability(&session, &params.username)
        .await;
    Json(AvailabilityResponse {
        username: params.username.trim().to_string(),
        availability,
    })
}

/// Live username checks: each text frame is the field's current value,
/// each reply a [`CheckOutcome`].
async fn username_check_ws(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    ws: WebSocketUpgrade,
) -> Response {
    let (checker, outcomes) = UsernameChecker::new(state.profiles.clone(), session, CHECK_DEBOUNCE);
    ws.on_upgrade(move |socket| username_socket(socket, checker, outcomes))
}

async fn send_outcome(socket: &mut WebSocket, outcome: &CheckOutcome) -> bool {
    let Ok(json) = serde_json::to_string(outcome) else {
        return false;
    };
    socket.send(Message::Text(json.into())).await.is_ok()
}

async fn username_socket(
    mut socket: WebSocket,
    mut checker: UsernameChecker,
    mut outcomes: CheckOutcomes,
) {
    loop {
        tokio::select! {
            message = socket.recv() => match message {
                Some(Ok(Message::Text(text))) => {
                    let outcome = checker.input(text.as_str());
                    if !send_outcome(&mut socket, &outcome).await {
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(error = %e, "Username check socket error");
                    break;
                }
            },
            Some(outcome) = outcomes.next() => {
                if !send_outcome(&mut socket, &outcome).await {
                    break;
                }
            }
        }
    }
    tracing::debug!("Username check socket closed");
}

// ─── Session events ──────────────────────────────────────────

fn default_page() -> ProtectedPage {
    ProtectedPage::Dashboard
}

#[derive(Deserialize)]
pub struct SessionEventsParams {
    #[serde(default = "default_page")]
    page: ProtectedPage,
}

/// Fresh guard decision after a session change.
#[derive(Debug, Serialize)]
pub struct GuardUpdate {
    pub event: SessionEventKind,
    pub redirect: Option<&'static str>,
}

struct EventsState {
    subscription: SessionSubscription,
    app: Arc<AppState>,
    session: Session,
    page: ProtectedPage,
    finished: bool,
}

impl EventsState {
    /// Wait for the next event about this user and re-run the guard.
    async fn next_update(&mut self) -> Option<GuardUpdate> {
        loop {
            let event = match self.subscription.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!(missed, "Session event stream lagged");
                    continue;
                }
                Err(RecvError::Closed) => return None,
            };

            if event.user_id != self.session.user_id() {
                continue;
            }

            let decision = match event.kind {
                SessionEventKind::SignedOut => GuardDecision::SignIn,
                // New tokens do not change what the user may see
                SessionEventKind::TokenRefreshed => continue,
                SessionEventKind::SignedIn | SessionEventKind::UserUpdated => {
                    self.app.guard.check(self.page, Some(&self.session)).await
                }
            };

            return Some(GuardUpdate {
                event: event.kind,
                redirect: decision.redirect_target(),
            });
        }
    }
}

async fn session_events(
    State(state): State<Arc<AppState>>,
    Extension(session): Extension<Session>,
    Query(params): Query<SessionEventsParams>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let events = EventsState {
        subscription: state.sessions.subscribe(),
        app: state,
        session,
        page: params.page,
        finished: false,
    };

    let stream = stream::unfold(events, |mut events| async move {
        if events.finished {
            return None;
        }
        let update = events.next_update().await?;
        // A redirect ends the stream; the page is going away
        events.finished = update.redirect.is_some();
        let event = match Event::default().json_data(&update) {
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode guard update");
                Event::default().comment("encode error")
            }
        };
        Some((Ok(event), events))
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
