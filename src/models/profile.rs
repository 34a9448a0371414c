// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile model for storage and page rendering.

use serde::{Deserialize, Serialize};

/// First name written into freshly created profile rows by the backend.
/// A profile still carrying it has not been set up by its owner.
pub const PLACEHOLDER_FIRST_NAME: &str = "New User";

/// Full profile row in the `profiles` collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Auth user id (also the row key)
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub birthday: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

impl Profile {
    pub fn is_complete(&self) -> bool {
        has_real_first_name(self.first_name.as_deref())
    }
}

fn has_real_first_name(first_name: Option<&str>) -> bool {
    match first_name.map(str::trim) {
        Some(name) => !name.is_empty() && name != PLACEHOLDER_FIRST_NAME,
        None => false,
    }
}

/// The subset of a profile the route guard selects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileSummary {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl ProfileSummary {
    /// Columns to request for a summary.
    pub const COLUMNS: &'static str = "first_name,last_name,username";

    /// A profile is complete once it has a real first name.
    pub fn is_complete(&self) -> bool {
        has_real_first_name(self.first_name.as_deref())
    }
}

/// Row written by profile setup. Every optional column is serialized,
/// so an empty field explicitly clears the stored value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileRecord {
    pub id: String,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub age: Option<u8>,
    pub birthday: Option<String>,
    pub updated_at: String,
}

/// Merged session and profile view handed to protected pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewer {
    pub user_id: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Viewer {
    /// Name to greet the user with.
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or_default();
        match self.last_name.as_deref().filter(|l| !l.is_empty()) {
            Some(last) => format!("{} {}", first, last),
            None => first.to_string(),
        }
    }
}
