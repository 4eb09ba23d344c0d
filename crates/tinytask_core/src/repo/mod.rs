//! Repository layer: thin, stable CRUD wrappers over stored rows.
//!
//! # Responsibility
//! - Define per-entity data access contracts and SQLite implementations.
//! - Keep SQL text and row decoding inside this module tree.
//!
//! # Invariants
//! - Write paths validate records before running SQL.
//! - Read paths reject persisted rows that fail the same validation.
//! - Every successful update refreshes `updated_on` and rotates `version`.
//! - A guarded update that changes zero rows resolves to `VersionConflict`
//!   when the row still exists and `NotFound` otherwise.

pub mod filter;
pub mod task_repo;
pub mod user_repo;

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::{RecordId, ValidationError};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors shared by the user and task repositories.
///
/// Both repositories operate on the same two interlinked tables, so they
/// share one error type instead of mirroring it per module.
#[derive(Debug)]
pub enum RepoError {
    /// A record failed validation before any SQL ran.
    Validation(ValidationError),
    /// Underlying SQLite or bootstrap error.
    Db(DbError),
    /// The addressed row does not exist.
    NotFound { entity: &'static str, id: RecordId },
    /// The row changed since the caller read it; the guarded write was
    /// refused.
    VersionConflict {
        entity: &'static str,
        id: RecordId,
        read_version: Uuid,
    },
    /// Connection schema is not at the version this binary migrates to.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from an expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be decoded into a valid record.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::VersionConflict {
                entity,
                id,
                read_version,
            } => write!(
                f,
                "stale write on {entity} {id}: row changed since version {read_version} was read"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "repository requires column `{column}` in table `{table}`")
            }
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Epoch milliseconds for audit columns. Clamps to 0 if the clock reports a
/// pre-epoch time.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}

/// Decodes a stored UUID column, naming the source on failure.
pub(crate) fn parse_uuid(value: &str, context: &str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid value `{value}` in {context}")))
}

/// Rejects a decoded row whose text no longer satisfies domain rules.
pub(crate) fn validate_stored_row(
    table: &'static str,
    id: RecordId,
    outcome: Result<(), ValidationError>,
) -> RepoResult<()> {
    outcome.map_err(|err| RepoError::InvalidData(format!("rejected row {id} in {table}: {err}")))
}

/// Verifies the connection is migrated and carries the expected table shape.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let expected = latest_version();
    let actual: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual != expected {
        return Err(RepoError::UninitializedConnection {
            expected_version: expected,
            actual_version: actual,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }

    for &column in columns {
        if !table_has_column(conn, table, column)? {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
