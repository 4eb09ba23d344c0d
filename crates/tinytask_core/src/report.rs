//! SQL-side role report over users.
//!
//! # Responsibility
//! - Classify users into role levels inside one SELECT.
//! - Aggregate the result to JSON in the database and decode it to
//!   typed rows.
//!
//! # Invariants
//! - Exactly one statement runs per report call.
//! - Rows come back sorted by user id regardless of aggregation order.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

use crate::db::DbError;
use crate::model::user::UserId;

/// The user name classified as [`RoleLevel::Admin`].
pub const ADMIN_USER_NAME: &str = "admin";

/// Result type for report APIs.
pub type ReportResult<T> = Result<T, ReportError>;

/// Report-layer error for DB interaction and payload decoding.
#[derive(Debug)]
pub enum ReportError {
    Db(DbError),
    /// The JSON aggregate did not decode into report rows.
    Decode(serde_json::Error),
}

impl Display for ReportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Decode(err) => write!(f, "invalid report payload: {err}"),
        }
    }
}

impl Error for ReportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Decode(err) => Some(err),
        }
    }
}

impl From<DbError> for ReportError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ReportError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for ReportError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

/// Role label assigned to each user by the report query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleLevel {
    Admin,
    Member,
}

/// One decoded report row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRoleRow {
    pub id: UserId,
    pub level: RoleLevel,
}

/// Labels every user `admin` or `member` in SQL and returns the decoded
/// rows sorted by id. An empty `users` table yields an empty list.
pub fn user_role_report(conn: &Connection) -> ReportResult<Vec<UserRoleRow>> {
    let payload: String = conn.query_row(
        "SELECT json_group_array(
            json_object(
                'id', id,
                'level', CASE WHEN name = ?1 THEN 'admin' ELSE 'member' END
            )
         )
         FROM users;",
        params![ADMIN_USER_NAME],
        |row| row.get(0),
    )?;

    let mut rows: Vec<UserRoleRow> = serde_json::from_str(&payload)?;
    rows.sort_by_key(|row| row.id);
    Ok(rows)
}
