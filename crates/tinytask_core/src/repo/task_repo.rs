//! Task repository contract and SQLite implementation.
//!
//! # Responsibility
//! - CRUD over `tasks` rows, including bulk delete by filter.
//! - Join reads against `users`: full related rows and the aliased
//!   newest-user brief projection.
//!
//! # Invariants
//! - Same write contract as users: validate first, bind timestamps and
//!   `version` explicitly, guard updates on the read version.
//! - The related-user name filter is an `EXISTS` subquery in single-table
//!   statements and a join predicate in join reads.
//! - Read ordering is deterministic: `id ASC` (briefs: newest user first).

use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::task::{NewTask, Task, TaskId};
use crate::model::user::{User, UserId};
use crate::repo::filter::TextFilter;
use crate::repo::{
    ensure_connection_ready, now_epoch_ms, parse_uuid, validate_stored_row, RepoError, RepoResult,
};

const TASK_COLUMNS: &[&str] = &[
    "id",
    "task_uid",
    "task_name",
    "user_id",
    "created_on",
    "updated_on",
    "version",
];

const USER_JOIN_COLUMNS: &[&str] = &["id", "name", "created_on", "updated_on", "version"];

const TASK_SELECT_SQL: &str = "SELECT
    id,
    task_uid,
    task_name,
    user_id,
    created_on,
    updated_on,
    version
FROM tasks";

const TASK_JOIN_SELECT_SQL: &str = "SELECT
    tasks.id AS task_id,
    tasks.task_uid AS task_uid,
    tasks.task_name AS task_name,
    tasks.user_id AS task_user_id,
    tasks.created_on AS task_created_on,
    tasks.updated_on AS task_updated_on,
    tasks.version AS task_version,
    users.id AS user_id,
    users.name AS user_name,
    users.created_on AS user_created_on,
    users.updated_on AS user_updated_on,
    users.version AS user_version
FROM tasks
LEFT JOIN users ON users.id = tasks.user_id";

/// Filter options for task queries.
#[derive(Debug, Clone, Default)]
pub struct TaskQuery {
    /// Optional match over `tasks.task_name`.
    pub task_name: Option<TextFilter>,
    /// Restrict to tasks assigned to one user id.
    pub user_id: Option<UserId>,
    /// Optional match over the assigned user's name.
    pub user_name: Option<TextFilter>,
}

impl TaskQuery {
    /// Query matching one exact task name.
    pub fn by_name(task_name: impl Into<String>) -> Self {
        Self {
            task_name: Some(TextFilter::exact(task_name)),
            ..Self::default()
        }
    }

    /// Query matching every task assigned to `user_id`.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            ..Self::default()
        }
    }
}

/// Task row joined with its assigned user, when any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWithUser {
    pub task: Task,
    pub user: Option<User>,
}

/// Aliased join projection: the newest matching user and one of their tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskBrief {
    pub user_id: UserId,
    pub user_name: String,
    pub task_id: TaskId,
    pub task_name: String,
}

/// Repository interface for task rows.
pub trait TaskRepository {
    /// Inserts a draft and returns the stored row, including its new id.
    ///
    /// A `user_id` pointing at no stored user fails the FK check and
    /// surfaces as a `Db` error.
    fn create_task(&self, draft: &NewTask) -> RepoResult<Task>;
    /// Loads one task by primary key.
    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>>;
    /// Loads the first task matching the query, by ascending id.
    fn find_task(&self, query: &TaskQuery) -> RepoResult<Option<Task>>;
    /// Lists tasks matching the query, ordered by id.
    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>>;
    /// Counts tasks matching the query.
    fn count_tasks(&self, query: &TaskQuery) -> RepoResult<u64>;
    /// Writes the record back, guarded by the version the caller read.
    fn update_task(&self, task: &Task) -> RepoResult<Task>;
    /// Hard-deletes one task; `NotFound` when nothing matched.
    fn delete_task(&self, id: TaskId) -> RepoResult<()>;
    /// Deletes every task matching the query; returns how many went away.
    /// An empty query clears the table.
    fn delete_tasks(&self, query: &TaskQuery) -> RepoResult<u64>;
    /// Lists tasks with their assigned user rows attached, ordered by
    /// task id. Unassigned tasks carry `user: None` unless the query
    /// filters on the user side.
    fn list_tasks_with_users(&self, query: &TaskQuery) -> RepoResult<Vec<TaskWithUser>>;
    /// Joins tasks to users matching `user_name` and returns the brief for
    /// the most recently created such user, or `None` without a match.
    fn latest_task_brief(&self, user_name: &TextFilter) -> RepoResult<Option<TaskBrief>>;
}

/// SQLite-backed task repository.
pub struct SqliteTaskRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTaskRepository<'conn> {
    /// Constructs a repository over a migrated connection.
    ///
    /// Checks both tables the repository touches: `tasks` for every
    /// operation, `users` for the join reads.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "tasks", TASK_COLUMNS)?;
        ensure_connection_ready(conn, "users", USER_JOIN_COLUMNS)?;
        Ok(Self { conn })
    }

    fn resolve_stale_write(&self, task: &Task) -> RepoError {
        match task_row_exists(self.conn, task.id) {
            Ok(true) => {
                debug!(
                    "event=task_update module=repo status=conflict id={} read_version={}",
                    task.id, task.version
                );
                RepoError::VersionConflict {
                    entity: "task",
                    id: task.id,
                    read_version: task.version,
                }
            }
            Ok(false) => RepoError::NotFound {
                entity: "task",
                id: task.id,
            },
            Err(err) => err,
        }
    }
}

impl TaskRepository for SqliteTaskRepository<'_> {
    fn create_task(&self, draft: &NewTask) -> RepoResult<Task> {
        draft.validate()?;

        let now = now_epoch_ms();
        let version = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO tasks (task_uid, task_name, user_id, created_on, updated_on, version)
             VALUES (?1, ?2, ?3, ?4, ?4, ?5);",
            params![
                draft.task_uid.to_string(),
                draft.task_name.as_str(),
                draft.user_id,
                now,
                version.to_string(),
            ],
        )?;

        Ok(Task {
            id: self.conn.last_insert_rowid(),
            task_uid: draft.task_uid,
            task_name: draft.task_name.clone(),
            user_id: draft.user_id,
            created_on: now,
            updated_on: now,
            version,
        })
    }

    fn get_task(&self, id: TaskId) -> RepoResult<Option<Task>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TASK_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query(params![id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn find_task(&self, query: &TaskQuery) -> RepoResult<Option<Task>> {
        let (sql, binds) = build_task_sql(TASK_SELECT_SQL, query, " ORDER BY id ASC LIMIT 1");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_task_row(row)?));
        }

        Ok(None)
    }

    fn list_tasks(&self, query: &TaskQuery) -> RepoResult<Vec<Task>> {
        let (sql, binds) = build_task_sql(TASK_SELECT_SQL, query, " ORDER BY id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut tasks = Vec::new();
        while let Some(row) = rows.next()? {
            tasks.push(parse_task_row(row)?);
        }

        Ok(tasks)
    }

    fn count_tasks(&self, query: &TaskQuery) -> RepoResult<u64> {
        let (sql, binds) = build_task_sql("SELECT COUNT(*) FROM tasks", query, "");
        let count: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn update_task(&self, task: &Task) -> RepoResult<Task> {
        task.validate()?;

        let now = now_epoch_ms();
        let next_version = Uuid::new_v4();
        let changed = self.conn.execute(
            "UPDATE tasks
             SET
                task_uid = ?1,
                task_name = ?2,
                user_id = ?3,
                created_on = ?4,
                updated_on = ?5,
                version = ?6
             WHERE id = ?7
               AND version = ?8;",
            params![
                task.task_uid.to_string(),
                task.task_name.as_str(),
                task.user_id,
                task.created_on,
                now,
                next_version.to_string(),
                task.id,
                task.version.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(self.resolve_stale_write(task));
        }

        Ok(Task {
            updated_on: now,
            version: next_version,
            ..task.clone()
        })
    }

    fn delete_task(&self, id: TaskId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM tasks WHERE id = ?1;", params![id])?;
        if changed == 0 {
            return Err(RepoError::NotFound { entity: "task", id });
        }

        Ok(())
    }

    fn delete_tasks(&self, query: &TaskQuery) -> RepoResult<u64> {
        let (sql, binds) = build_task_sql("DELETE FROM tasks", query, "");
        let changed = self.conn.execute(&sql, params_from_iter(binds))?;
        Ok(changed as u64)
    }

    fn list_tasks_with_users(&self, query: &TaskQuery) -> RepoResult<Vec<TaskWithUser>> {
        let mut sql = format!("{TASK_JOIN_SELECT_SQL} WHERE 1 = 1");
        let mut binds: Vec<Value> = Vec::new();

        if let Some(filter) = query.task_name.as_ref() {
            filter.push_predicate("tasks.task_name", &mut sql, &mut binds);
        }
        if let Some(user_id) = query.user_id {
            sql.push_str(" AND tasks.user_id = ?");
            binds.push(Value::Integer(user_id));
        }
        if let Some(filter) = query.user_name.as_ref() {
            // Predicate over the joined side drops unassigned tasks, the
            // behavior callers filtering on the relation expect.
            filter.push_predicate("users.name", &mut sql, &mut binds);
        }
        sql.push_str(" ORDER BY tasks.id ASC");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut joined = Vec::new();
        while let Some(row) = rows.next()? {
            joined.push(parse_task_join_row(row)?);
        }

        Ok(joined)
    }

    fn latest_task_brief(&self, user_name: &TextFilter) -> RepoResult<Option<TaskBrief>> {
        let mut sql = String::from(
            "SELECT
                users.id AS user_id,
                users.name AS user_name,
                tasks.id AS task_id,
                tasks.task_name AS task_name
             FROM tasks
             INNER JOIN users ON users.id = tasks.user_id
             WHERE 1 = 1",
        );
        let mut binds: Vec<Value> = Vec::new();
        user_name.push_predicate("users.name", &mut sql, &mut binds);
        sql.push_str(" ORDER BY users.created_on DESC, tasks.id DESC LIMIT 1;");

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        if let Some(row) = rows.next()? {
            return Ok(Some(TaskBrief {
                user_id: row.get("user_id")?,
                user_name: row.get("user_name")?,
                task_id: row.get("task_id")?,
                task_name: row.get("task_name")?,
            }));
        }

        Ok(None)
    }
}

fn build_task_sql(select: &str, query: &TaskQuery, tail: &str) -> (String, Vec<Value>) {
    let mut sql = format!("{select} WHERE 1 = 1");
    let mut binds: Vec<Value> = Vec::new();

    if let Some(filter) = query.task_name.as_ref() {
        filter.push_predicate("task_name", &mut sql, &mut binds);
    }
    if let Some(user_id) = query.user_id {
        sql.push_str(" AND user_id = ?");
        binds.push(Value::Integer(user_id));
    }
    if let Some(filter) = query.user_name.as_ref() {
        sql.push_str(
            " AND EXISTS (
                SELECT 1
                FROM users u
                WHERE u.id = tasks.user_id",
        );
        filter.push_predicate("u.name", &mut sql, &mut binds);
        sql.push_str(
            "
            )",
        );
    }

    sql.push_str(tail);
    (sql, binds)
}

fn task_row_exists(conn: &Connection, id: TaskId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM tasks WHERE id = ?1);",
        params![id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let uid_text: String = row.get("task_uid")?;
    let version_text: String = row.get("version")?;
    let task = Task {
        id: row.get("id")?,
        task_uid: parse_uuid(&uid_text, "tasks.task_uid")?,
        task_name: row.get("task_name")?,
        user_id: row.get("user_id")?,
        created_on: row.get("created_on")?,
        updated_on: row.get("updated_on")?,
        version: parse_uuid(&version_text, "tasks.version")?,
    };
    validate_stored_row("tasks", task.id, task.validate())?;

    Ok(task)
}

fn parse_task_join_row(row: &Row<'_>) -> RepoResult<TaskWithUser> {
    let uid_text: String = row.get("task_uid")?;
    let task_version: String = row.get("task_version")?;
    let task = Task {
        id: row.get("task_id")?,
        task_uid: parse_uuid(&uid_text, "tasks.task_uid")?,
        task_name: row.get("task_name")?,
        user_id: row.get("task_user_id")?,
        created_on: row.get("task_created_on")?,
        updated_on: row.get("task_updated_on")?,
        version: parse_uuid(&task_version, "tasks.version")?,
    };

    validate_stored_row("tasks", task.id, task.validate())?;

    let joined_id: Option<UserId> = row.get("user_id")?;
    let user = match joined_id {
        Some(id) => {
            let user_version: String = row.get("user_version")?;
            let user = User {
                id,
                name: row.get("user_name")?,
                created_on: row.get("user_created_on")?,
                updated_on: row.get("user_updated_on")?,
                version: parse_uuid(&user_version, "users.version")?,
            };
            validate_stored_row("users", user.id, user.validate())?;
            Some(user)
        }
        None => None,
    };

    Ok(TaskWithUser { task, user })
}
