//! Task domain record.
//!
//! # Responsibility
//! - Define the stored task row, its insert draft, and the user link.
//!
//! # Invariants
//! - `task_uid` is a stable secondary identifier, generated once per draft
//!   and never changed after insert.
//! - `task_name` is required and never exceeds [`TASK_NAME_MAX_CHARS`].
//! - `user_id`, when set, references an existing user; the row disappears
//!   with that user (FK `ON DELETE CASCADE`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::UserId;
use super::{check_text, RecordId, ValidationError};

/// Column limit shared with the `tasks.task_name` schema contract.
pub const TASK_NAME_MAX_CHARS: usize = 100;

/// Stable alias for task primary keys in signatures.
pub type TaskId = RecordId;

/// Stored task row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Database-assigned primary key.
    pub id: TaskId,
    /// Public secondary identifier, unique across tasks.
    pub task_uid: Uuid,
    pub task_name: String,
    /// Owning user, or `None` for unassigned tasks.
    pub user_id: Option<UserId>,
    /// Insert time in epoch milliseconds.
    pub created_on: i64,
    /// Last successful write in epoch milliseconds.
    pub updated_on: i64,
    /// Optimistic-concurrency token; rotates on every successful update.
    pub version: Uuid,
}

impl Task {
    /// Validates the mutable fields before an update reaches SQL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("task_name", &self.task_name, TASK_NAME_MAX_CHARS, true)
    }
}

/// Insert draft for a task row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Generated on draft creation; kept stable for the row's lifetime.
    pub task_uid: Uuid,
    pub task_name: String,
    pub user_id: Option<UserId>,
}

impl NewTask {
    /// Creates an unassigned draft with a fresh `task_uid`.
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_uid: Uuid::new_v4(),
            task_name: task_name.into(),
            user_id: None,
        }
    }

    /// Links the draft to an owning user.
    pub fn assigned_to(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Validates the draft before an insert reaches SQL.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_text("task_name", &self.task_name, TASK_NAME_MAX_CHARS, true)
    }
}
