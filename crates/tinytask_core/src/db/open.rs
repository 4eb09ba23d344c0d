//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure the pragmas core behavior relies on.
//! - Run schema migrations before handing out a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`; cascade deletes depend
//!   on it.
//! - File databases run in WAL journal mode so concurrent writers queue on
//!   the write lock instead of failing fast.
//! - Returned connections have all migrations applied.

use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, Instant};

use log::{error, info};
use rusqlite::Connection;

use super::migrations::apply_migrations;
use super::DbResult;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
enum OpenMode {
    File,
    Memory,
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File => f.write_str("file"),
            Self::Memory => f.write_str("memory"),
        }
    }
}

/// Opens a SQLite database file and applies all pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    timed_open(|| Connection::open(path), OpenMode::File)
}

/// Opens a private in-memory SQLite database and applies all pending
/// migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db_in_memory() -> DbResult<Connection> {
    timed_open(Connection::open_in_memory, OpenMode::Memory)
}

// The timer and the start event must cover the open itself, so the
// connection is produced inside here, not by the caller.
fn timed_open(
    open: impl FnOnce() -> rusqlite::Result<Connection>,
    mode: OpenMode,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn) {
        Ok(journal) => {
            info!(
                "event=db_open module=db status=ok mode={mode} journal={journal} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={err}",
                started_at.elapsed().as_millis()
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection) -> DbResult<String> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    // In-memory databases report `memory` here; WAL only sticks for files.
    let journal: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
    apply_migrations(conn)?;
    Ok(journal)
}
