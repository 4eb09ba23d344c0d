//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tinytask_core` wiring end to
//!   end: logging, migrations, and both repositories.
//! - Keep output deterministic for quick local sanity checks.

use std::error::Error;

use log::info;
use tinytask_core::{
    default_log_level, init_logging, NewTask, NewUser, SqliteTaskRepository,
    SqliteUserRepository, TaskRepository, UserRepository,
};

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        let mut source = err.source();
        while let Some(cause) = source {
            eprintln!("caused by: {cause}");
            source = cause.source();
        }
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    init_logging(default_log_level())?;

    // In-memory database: the smoke run must leave nothing behind.
    let conn = tinytask_core::open_db_in_memory()?;
    let users = SqliteUserRepository::try_new(&conn)?;
    let tasks = SqliteTaskRepository::try_new(&conn)?;

    let user = users.create_user(&NewUser::named("smoke"))?;
    let task = tasks.create_task(&NewTask::new("smoke task").assigned_to(user.id))?;

    println!("tinytask_core version={}", tinytask_core::core_version());
    println!("user id={} name={}", user.id, user.name);
    println!(
        "task id={} task_name={} user_id={}",
        task.id, task.task_name, user.id
    );

    info!("event=smoke module=cli status=ok user_id={} task_id={}", user.id, task.id);
    Ok(())
}
