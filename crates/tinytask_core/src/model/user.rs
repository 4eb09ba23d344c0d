//! User domain record.
//!
//! # Responsibility
//! - Define the stored user row and its insert draft.
//!
//! # Invariants
//! - `name` never exceeds [`USER_NAME_MAX_CHARS`] characters.
//! - A draft created without an explicit name uses [`DEFAULT_USER_NAME`],
//!   matching the schema-level column default.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{check_text, RecordId, ValidationError};

/// Column limit shared with the `users.name` schema contract.
pub const USER_NAME_MAX_CHARS: usize = 100;

/// Name applied when a draft is created without one.
pub const DEFAULT_USER_NAME: &str = "default_name";

/// Stable alias for user primary keys in signatures.
pub type UserId = RecordId;

/// Stored user row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Database-assigned primary key.
    pub id: UserId,
    pub name: String,
    /// Insert time in epoch milliseconds.
    pub created_on: i64,
    /// Last successful write in epoch milliseconds.
    pub updated_on: i64,
    /// Optimistic-concurrency token; rotates on every successful update.
    pub version: Uuid,
}

impl User {
    /// Validates the mutable fields before an update reaches SQL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("name", &self.name, USER_NAME_MAX_CHARS, false)
    }
}

/// Insert draft for a user row.
///
/// Audit columns (`id`, timestamps, `version`) are assigned by the
/// repository on insert and are deliberately absent here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: String,
}

impl NewUser {
    /// Creates a draft with an explicit name.
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Validates the draft before an insert reaches SQL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("name", &self.name, USER_NAME_MAX_CHARS, false)
    }
}

impl Default for NewUser {
    fn default() -> Self {
        Self {
            name: DEFAULT_USER_NAME.to_string(),
        }
    }
}
