//! Domain records for the TinyTask core.
//!
//! # Responsibility
//! - Define the canonical `User`/`Task` records and their insert drafts.
//! - Keep the shared audit-column contract in one place.
//!
//! # Invariants
//! - Every stored record carries `id`, `created_on`, `updated_on` and a
//!   `version` token.
//! - `version` changes if and only if the row changed since it was read.
//! - Text fields are validated against their column limits before any SQL
//!   mutation.

pub mod task;
pub mod user;

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Database-assigned integer primary key shared by all stored records.
pub type RecordId = i64;

/// Validation failure raised before a record reaches SQL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A text field exceeds its column limit (counted in characters).
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
    /// A required text field is empty.
    FieldEmpty { field: &'static str },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldTooLong { field, len, max } => {
                write!(f, "field `{field}` is {len} characters long, limit is {max}")
            }
            Self::FieldEmpty { field } => write!(f, "field `{field}` must not be empty"),
        }
    }
}

impl Error for ValidationError {}

/// Checks one text field against the shared column contract.
///
/// Length is counted in characters, not bytes, so multi-byte names are not
/// rejected early.
pub(crate) fn check_text(
    field: &'static str,
    value: &str,
    max: usize,
    required: bool,
) -> Result<(), ValidationError> {
    if required && value.is_empty() {
        return Err(ValidationError::FieldEmpty { field });
    }

    let len = value.chars().count();
    if len > max {
        return Err(ValidationError::FieldTooLong { field, len, max });
    }

    Ok(())
}
