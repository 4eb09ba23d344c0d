//! User repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide the stable CRUD surface over `users` rows.
//! - Own the optimistic compare-and-swap update semantics.
//!
//! # Invariants
//! - Writes validate the record first; timestamps and `version` are bound
//!   explicitly, never left to column defaults.
//! - `update_user` writes only when the stored `version` equals the one the
//!   caller read, and rotates it on success.
//! - Read ordering is deterministic: `id ASC`.

use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use uuid::Uuid;

use crate::model::user::{NewUser, User, UserId};
use crate::repo::filter::TextFilter;
use crate::repo::{
    ensure_connection_ready, now_epoch_ms, parse_uuid, validate_stored_row, RepoError, RepoResult,
};

const USER_COLUMNS: &[&str] = &["id", "name", "created_on", "updated_on", "version"];

const USER_SELECT_SQL: &str = "SELECT
    id,
    name,
    created_on,
    updated_on,
    version
FROM users";

/// Filter options for user queries.
#[derive(Debug, Clone, Default)]
pub struct UserQuery {
    /// Optional match over `users.name`.
    pub name: Option<TextFilter>,
}

impl UserQuery {
    /// Query matching one exact name, the most common script filter.
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(TextFilter::exact(name)),
        }
    }
}

/// Repository interface for user rows.
pub trait UserRepository {
    /// Inserts a draft and returns the stored row, including its new id.
    fn create_user(&self, draft: &NewUser) -> RepoResult<User>;
    /// Loads one user by primary key.
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    /// Loads the user with the lowest id.
    fn first_user(&self) -> RepoResult<Option<User>>;
    /// Loads the first user matching the query, by ascending id.
    fn find_user(&self, query: &UserQuery) -> RepoResult<Option<User>>;
    /// Lists users matching the query, ordered by id.
    fn list_users(&self, query: &UserQuery) -> RepoResult<Vec<User>>;
    /// Projects only the `name` column for matching users, ordered by id.
    fn list_user_names(&self, query: &UserQuery) -> RepoResult<Vec<String>>;
    /// Counts users matching the query.
    fn count_users(&self, query: &UserQuery) -> RepoResult<u64>;
    /// Returns whether any user matches the query.
    fn user_exists(&self, query: &UserQuery) -> RepoResult<bool>;
    /// Writes the record back, guarded by the version the caller read.
    ///
    /// Returns the new row state: `updated_on` refreshed and `version`
    /// rotated. Fails with `VersionConflict` when the stored row moved on,
    /// `NotFound` when it no longer exists.
    fn update_user(&self, user: &User) -> RepoResult<User>;
    /// Hard-deletes one user; linked tasks disappear via FK cascade.
    fn delete_user(&self, id: UserId) -> RepoResult<()>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository over a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "users", USER_COLUMNS)?;
        Ok(Self { conn })
    }

    fn resolve_stale_write(&self, user: &User) -> RepoError {
        match user_row_exists(self.conn, user.id) {
            Ok(true) => {
                debug!(
                    "event=user_update module=repo status=conflict id={} read_version={}",
                    user.id, user.version
                );
                RepoError::VersionConflict {
                    entity: "user",
                    id: user.id,
                    read_version: user.version,
                }
            }
            Ok(false) => RepoError::NotFound {
                entity: "user",
                id: user.id,
            },
            Err(err) => err,
        }
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn create_user(&self, draft: &NewUser) -> RepoResult<User> {
        draft.validate()?;

        let now = now_epoch_ms();
        let version = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO users (name, created_on, updated_on, version)
             VALUES (?1, ?2, ?2, ?3);",
            params![draft.name.as_str(), now, version.to_string()],
        )?;

        Ok(User {
            id: self.conn.last_insert_rowid(),
            name: draft.name.clone(),
            created_on: now,
            updated_on: now,
            version,
        })
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }

        Ok(None)
    }

    fn first_user(&self) -> RepoResult<Option<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC LIMIT 1;"))?;
        let mut rows = stmt.query([])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }

        Ok(None)
    }

    fn find_user(&self, query: &UserQuery) -> RepoResult<Option<User>> {
        let (sql, binds) = build_user_sql(USER_SELECT_SQL, query, " ORDER BY id ASC LIMIT 1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_user_row(row)?));
        }

        Ok(None)
    }

    fn list_users(&self, query: &UserQuery) -> RepoResult<Vec<User>> {
        let (sql, binds) = build_user_sql(USER_SELECT_SQL, query, " ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }

        Ok(users)
    }

    fn list_user_names(&self, query: &UserQuery) -> RepoResult<Vec<String>> {
        let (sql, binds) = build_user_sql("SELECT name FROM users", query, " ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut names = Vec::new();
        while let Some(row) = rows.next()? {
            names.push(row.get("name")?);
        }

        Ok(names)
    }

    fn count_users(&self, query: &UserQuery) -> RepoResult<u64> {
        let (sql, binds) = build_user_sql("SELECT COUNT(*) FROM users", query, "");
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn user_exists(&self, query: &UserQuery) -> RepoResult<bool> {
        let (inner, binds) = build_user_sql("SELECT 1 FROM users", query, "");
        let sql = format!("SELECT EXISTS({inner});");
        let exists: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(exists == 1)
    }

    fn update_user(&self, user: &User) -> RepoResult<User> {
        user.validate()?;

        let now = now_epoch_ms();
        let next_version = Uuid::new_v4();
        let changed = self.conn.execute(
            "UPDATE users
             SET
                name = ?1,
                created_on = ?2,
                updated_on = ?3,
                version = ?4
             WHERE id = ?5
               AND version = ?6;",
            params![
                user.name.as_str(),
                user.created_on,
                now,
                next_version.to_string(),
                user.id,
                user.version.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(self.resolve_stale_write(user));
        }

        Ok(User {
            updated_on: now,
            version: next_version,
            ..user.clone()
        })
    }

    fn delete_user(&self, id: UserId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM users WHERE id = ?1;", params![id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "user", id });
        }

        Ok(())
    }
}

fn build_user_sql(select: &str, query: &UserQuery, tail: &str) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE 1 = 1");
    let mut binds: Vec<Value> = Vec::new();

    if let Some(filter) = query.name.as_ref() {
        filter.push_predicate("name", &mut sql, &mut binds);
    }

    sql.push_str(tail);
    (sql, binds)
}

fn user_row_exists(conn: &Connection, id: UserId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let version_text: String = row.get("version")?;
    let user = User {
        id: row.get("id")?,
        name: row.get("name")?,
        created_on: row.get("created_on")?,
        updated_on: row.get("updated_on")?,
        version: parse_uuid(&version_text, "users.version")?,
    };
    validate_stored_row("users", user.id, user.validate())?;

    Ok(user)
}
