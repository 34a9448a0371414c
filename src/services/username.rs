// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Username availability checks.
//!
//! [`check_username`] is a single lookup. [`UsernameChecker`] sits in front
//! of it for live typing: checks fire only after the input has been quiet
//! for the debounce delay, and every input is tagged with a sequence number
//! so a late result for an older input is never reported.

use crate::db::ProfileRepo;
use crate::models::Session;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shortest username worth checking.
pub const MIN_USERNAME_LEN: usize = 3;

/// Quiet period after the last keystroke before a check runs.
pub const CHECK_DEBOUNCE: Duration = Duration::from_millis(500);

/// What is known about a username.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Nothing entered
    Idle,
    /// Too short to check
    TooShort,
    /// A check is scheduled or running
    Checking,
    Available,
    Taken,
    /// The lookup failed; the user is not blocked
    Unknown,
}

impl Availability {
    pub fn is_taken(self) -> bool {
        self == Availability::Taken
    }
}

/// Length as the user perceives it.
pub fn username_len(username: &str) -> usize {
    username.chars().count()
}

/// State that needs no lookup: empty or too short.
fn local_availability(username: &str) -> Option<Availability> {
    if username.is_empty() {
        Some(Availability::Idle)
    } else if username_len(username) < MIN_USERNAME_LEN {
        Some(Availability::TooShort)
    } else {
        None
    }
}

/// Look up whether `username` is free for the session's user.
///
/// The user's own current username counts as available. Lookup failures
/// are logged and reported as [`Availability::Unknown`].
pub async fn check_username(repo: &ProfileRepo, session: &Session, username: &str) -> Availability {
    let username = username.trim();
    if let Some(availability) = local_availability(username) {
        return availability;
    }

    match repo.username_owner(session, username).await {
        Ok(None) => Availability::Available,
        Ok(Some(owner)) if owner == session.user_id() => Availability::Available,
        Ok(Some(_)) => Availability::Taken,
        Err(e) => {
            tracing::warn!(error = %e, username, "Error checking username");
            Availability::Unknown
        }
    }
}

/// Result of one input to a [`UsernameChecker`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckOutcome {
    pub seq: u64,
    pub username: String,
    pub availability: Availability,
}

/// Debounced checker fed with successive values of a username field.
pub struct UsernameChecker {
    repo: ProfileRepo,
    session: Session,
    delay: Duration,
    latest: Arc<AtomicU64>,
    pending: Option<JoinHandle<()>>,
    tx: mpsc::UnboundedSender<CheckOutcome>,
}

/// Receiving side of a [`UsernameChecker`]; yields only current results.
pub struct CheckOutcomes {
    latest: Arc<AtomicU64>,
    rx: mpsc::UnboundedReceiver<CheckOutcome>,
}

impl UsernameChecker {
    pub fn new(repo: ProfileRepo, session: Session, delay: Duration) -> (Self, CheckOutcomes) {
        let latest = Arc::new(AtomicU64::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                repo,
                session,
                delay,
                latest: latest.clone(),
                pending: None,
                tx,
            },
            CheckOutcomes { latest, rx },
        )
    }

    /// Record a new field value.
    ///
    /// Cancels any pending check. Returns the immediate state: `Idle` or
    /// `TooShort` (final, no lookup) or `Checking` (a result will follow on
    /// [`CheckOutcomes::next`] unless superseded).
    pub fn input(&mut self, username: &str) -> CheckOutcome {
        let seq = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }

        let username = username.trim().to_string();
        if let Some(availability) = local_availability(&username) {
            return CheckOutcome {
                seq,
                username,
                availability,
            };
        }

        let repo = self.repo.clone();
        let session = self.session.clone();
        let delay = self.delay;
        let tx = self.tx.clone();
        let name = username.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let availability = check_username(&repo, &session, &name).await;
            let _ = tx.send(CheckOutcome {
                seq,
                username: name,
                availability,
            });
        }));

        CheckOutcome {
            seq,
            username,
            availability: Availability::Checking,
        }
    }
}

impl Drop for UsernameChecker {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl CheckOutcomes {
    /// Next result belonging to the most recent input.
    ///
    /// Returns `None` once the checker is dropped.
    pub async fn next(&mut self) -> Option<CheckOutcome> {
        while let Some(outcome) = self.rx.recv().await {
            if outcome.seq == self.latest.load(Ordering::SeqCst) {
                return Some(outcome);
            }
            tracing::debug!(seq = outcome.seq, "Discarding stale username check");
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_availability() {
        assert_eq!(local_availability(""), Some(Availability::Idle));
        assert_eq!(local_availability("ab"), Some(Availability::TooShort));
        // Counted in characters, not bytes
        assert_eq!(local_availability("éé"), Some(Availability::TooShort));
        assert_eq!(local_availability("abc"), None);
    }

    #[tokio::test]
    async fn test_stale_outcomes_are_discarded() {
        let latest = Arc::new(AtomicU64::new(2));
        let (tx, rx) = mpsc::unbounded_channel();
        let mut outcomes = CheckOutcomes {
            latest: latest.clone(),
            rx,
        };

        tx.send(CheckOutcome {
            seq: 1,
            username: "alice".to_string(),
            availability: Availability::Taken,
        })
        .unwrap();
        tx.send(CheckOutcome {
            seq: 2,
            username: "alicia".to_string(),
            availability: Availability::Available,
        })
        .unwrap();
        drop(tx);

        let outcome = outcomes.next().await.unwrap();
        assert_eq!(outcome.username, "alicia");
        assert_eq!(outcome.availability, Availability::Available);
        assert!(outcomes.next().await.is_none());
    }
}
