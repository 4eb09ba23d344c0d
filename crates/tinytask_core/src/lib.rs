//! Core domain logic for TinyTask.
//! This crate is the single source of truth for business invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod report;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::task::{NewTask, Task, TaskId};
pub use model::user::{NewUser, User, UserId};
pub use model::ValidationError;
pub use repo::filter::{MatchKind, TextFilter};
pub use repo::task_repo::{
    SqliteTaskRepository, TaskBrief, TaskQuery, TaskRepository, TaskWithUser,
};
pub use repo::user_repo::{SqliteUserRepository, UserQuery, UserRepository};
pub use repo::{RepoError, RepoResult};
pub use report::{user_role_report, ReportError, ReportResult, RoleLevel, UserRoleRow};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
