// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Middleware modules (sessions, route guard, security headers).

pub mod auth;
pub mod guard;
pub mod security;
pub mod session;

pub use auth::require_session;
pub use guard::{GuardDecision, ProtectedPage, RouteGuard};
pub use session::{load_session, CurrentSession};
