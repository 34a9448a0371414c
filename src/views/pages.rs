// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Page bodies.

use crate::middleware::ProtectedPage;
use crate::models::{OAuthProvider, Viewer};
use crate::services::{Availability, ProfileForm};
use crate::views::layout::{auth_layout, main_layout};
use maud::{html, Markup, PreEscaped};

/// Follows redirects pushed by the session event stream.
const SESSION_EVENTS_SCRIPT: &str = r#"
(function () {
  if (!window.EventSource) return;
  var page = document.currentScript.dataset.page;
  var events = new EventSource('/api/session/events?page=' + encodeURIComponent(page));
  events.onmessage = function (e) {
    var decision = JSON.parse(e.data);
    if (decision.redirect) {
      events.close();
      window.location.assign(decision.redirect);
    }
  };
})();
"#;

/// Live username check over a WebSocket, and submit-button state.
const PROFILE_FORM_SCRIPT: &str = r#"
(function () {
  var form = document.getElementById('profile-form');
  var input = document.getElementById('username');
  var status = document.getElementById('username-status');
  var submit = document.getElementById('profile-submit');
  var latest = 0;
  var taken = submit.disabled;
  var messages = {
    too_short: ['Username must be at least 3 characters', 'hint'],
    checking: ['Checking availability...', 'hint'],
    available: ['✓ Username available', 'hint ok'],
    taken: ['✗ Username already taken', 'hint bad']
  };

  function show(availability) {
    var m = messages[availability];
    status.textContent = m ? m[0] : '';
    status.className = m ? m[1] : 'hint';
    taken = availability === 'taken';
    submit.disabled = taken;
  }

  var scheme = window.location.protocol === 'https:' ? 'wss' : 'ws';
  var socket = new WebSocket(scheme + '://' + window.location.host + '/api/profile/username-check/ws');
  socket.onmessage = function (e) {
    var outcome = JSON.parse(e.data);
    if (outcome.seq < latest) return;
    latest = outcome.seq;
    show(outcome.availability);
  };
  input.addEventListener('input', function () {
    if (socket.readyState === WebSocket.OPEN) socket.send(input.value);
  });
  form.addEventListener('submit', function (e) {
    if (taken) { e.preventDefault(); return; }
    submit.disabled = true;
    submit.textContent = 'Setting up...';
  });
})();
"#;

/// Keeps a protected page in step with session changes made elsewhere.
fn session_events(page: ProtectedPage) -> Markup {
    html! {
        script data-page=(page.as_str()) { (PreEscaped(SESSION_EVENTS_SCRIPT)) }
    }
}

fn error_box(error: Option<&str>) -> Markup {
    html! {
        @if let Some(message) = error {
            div class="error" role="alert" { (message) }
        }
    }
}

/// What the sign-in page shows around its forms.
#[derive(Debug, Default)]
pub struct SigninPage<'a> {
    /// Email of the signed-in user; switches to the signed-in view
    pub signed_in_as: Option<&'a str>,
    pub error: Option<&'a str>,
    pub notice: Option<&'a str>,
    /// Prefill for the email fields
    pub email: &'a str,
}

fn notice_box(notice: Option<&str>) -> Markup {
    html! {
        @if let Some(message) = notice {
            div class="notice" role="status" { (message) }
        }
    }
}

fn email_field(id: &str, email: &str) -> Markup {
    html! {
        div class="field" {
            label for=(id) { "Email address" }
            input id=(id) name="email" type="email" value=(email) required;
        }
    }
}

fn password_field(id: &str, label: &str, autocomplete: &str) -> Markup {
    html! {
        div class="field" {
            label for=(id) { (label) }
            input id=(id) name="password" type="password" autocomplete=(autocomplete) required;
        }
    }
}

/// Sign-in page.
pub fn signin(page: &SigninPage<'_>) -> Markup {
    let content = match page.signed_in_as {
        Some(email) => html! {
            div class="card" {
                h1 { "Welcome Back!" }
                p { "You are logged in as: " (email) }
                (error_box(page.error))
                (notice_box(page.notice))
                form method="post" action="/auth/password" {
                    (password_field("new-password", "New password", "new-password"))
                    button class="button" type="submit" { "Update password" }
                }
                form method="post" action="/auth/signout" {
                    button class="button danger" type="submit" { "Sign Out" }
                }
            }
        },
        None => html! {
            div class="card" {
                h1 { "Welcome Back" }
                p class="hint" { "Sign in to your account" }
                (error_box(page.error))
                (notice_box(page.notice))
                p {
                    @for provider in OAuthProvider::ALL {
                        a class="button" href={ "/auth/signin/" (provider.as_str()) } {
                            "Sign in with " (provider.label())
                        }
                        " "
                    }
                }
                form method="post" action="/auth/signin" {
                    (email_field("email", page.email))
                    (password_field("password", "Password", "current-password"))
                    button class="button" type="submit" { "Sign in" }
                }
                details {
                    summary { "Forgot your password?" }
                    form method="post" action="/auth/recover" {
                        (email_field("recover-email", page.email))
                        button class="button" type="submit" { "Send reset instructions" }
                    }
                }
                details {
                    summary { "Don't have an account? Sign up" }
                    form method="post" action="/auth/signup" {
                        (email_field("signup-email", page.email))
                        (password_field("signup-password", "Create a password", "new-password"))
                        button class="button" type="submit" { "Sign up" }
                    }
                }
                p class="hint" { "Need help? " a href="#" { "Contact support" } }
            }
        },
    };
    auth_layout("Sign in", content)
}

pub fn dashboard(viewer: &Viewer) -> Markup {
    main_layout(
        "",
        html! {
            div {
                h1 { "Welcome to Your Memory Dashboard" }
                p { "Hello, " (viewer.display_name()) "." }
                @if let Some(username) = viewer.username.as_deref().filter(|u| !u.is_empty()) {
                    p class="hint" { "@" (username) }
                }
                form method="post" action="/auth/signout" {
                    button class="button danger" type="submit" { "Logout" }
                }
                p { "View and manage your memories here" }
                div class="dashboard-summary" {
                    h2 { "Recent Memories" }
                }
            }
            (session_events(ProtectedPage::Dashboard))
        },
    )
}

fn availability_hint(availability: Availability) -> Markup {
    let (text, class) = match availability {
        Availability::TooShort => ("Username must be at least 3 characters", "hint"),
        Availability::Checking => ("Checking availability...", "hint"),
        Availability::Available => ("✓ Username available", "hint ok"),
        Availability::Taken => ("✗ Username already taken", "hint bad"),
        Availability::Idle | Availability::Unknown => ("", "hint"),
    };
    html! {
        p id="username-status" class=(class) aria-live="polite" { (text) }
    }
}

/// Profile setup page, re-rendered with the submitted values on error.
pub fn profile_setup(form: &ProfileForm, error: Option<&str>, availability: Availability) -> Markup {
    main_layout(
        "Complete Your Profile",
        html! {
            h1 { "Complete Your Profile" }
            div class="card" {
                form id="profile-form" method="post" action="/profile-setup" {
                    div class="field" {
                        label for="username" { "Username (optional)" }
                        input id="username" name="username" type="text" value=(form.username)
                            placeholder="Choose a unique username" minlength="3" autocomplete="off";
                        (availability_hint(availability))
                    }
                    div class="field" {
                        label for="first_name" { "First Name *" }
                        input id="first_name" name="first_name" type="text" value=(form.first_name)
                            placeholder="Your first name" required;
                    }
                    div class="field" {
                        label for="last_name" { "Last Name" }
                        input id="last_name" name="last_name" type="text" value=(form.last_name)
                            placeholder="Your last name";
                    }
                    div class="field" {
                        label for="age" { "Age" }
                        input id="age" name="age" type="number" value=(form.age)
                            placeholder="Your age" min="1" max="120";
                    }
                    div class="field" {
                        label for="birthday" { "Birthday" }
                        input id="birthday" name="birthday" type="date" value=(form.birthday);
                    }
                    (error_box(error))
                    button id="profile-submit" class="button" type="submit"
                        disabled[availability.is_taken()] { "Complete Profile" }
                }
            }
            script { (PreEscaped(PROFILE_FORM_SCRIPT)) }
            (session_events(ProtectedPage::ProfileSetup))
        },
    )
}
