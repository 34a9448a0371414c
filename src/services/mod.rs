// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - auth provider access and business logic.

pub mod backend;
pub mod memory;
pub mod pkce;
pub mod profile_setup;
pub mod session;
pub mod supabase;
pub mod username;

pub use backend::Backend;
pub use memory::MemoryBackend;
pub use profile_setup::{FormError, ProfileForm, ProfileSetup};
pub use session::{
    ResolvedSession, SessionClient, SessionEvent, SessionEventKind, SessionSubscription,
};
pub use supabase::SupabaseClient;
pub use username::{Availability, CheckOutcome, CheckOutcomes, UsernameChecker};
