// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer (hosted REST collections).

pub mod profiles;

pub use profiles::ProfileRepo;

/// Collection names as constants.
pub mod collections {
    /// One row per auth user, keyed by user id
    pub const PROFILES: &str = "profiles";
}
