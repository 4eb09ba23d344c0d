use std::sync::{Arc, Barrier};
use std::thread;

use tinytask_core::db::{open_db, open_db_in_memory};
use tinytask_core::{
    NewTask, NewUser, RepoError, SqliteTaskRepository, SqliteUserRepository, TaskRepository,
    UserRepository,
};

const CONTENDERS: usize = 30;

#[test]
fn concurrent_guarded_updates_allow_exactly_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");

    // One shared snapshot: every contender holds the same read version.
    let snapshot = {
        let conn = open_db(&path).unwrap();
        let users = SqliteUserRepository::try_new(&conn).unwrap();
        users.create_user(&NewUser::named("contended")).unwrap()
    };

    let barrier = Arc::new(Barrier::new(CONTENDERS));
    let mut handles = Vec::with_capacity(CONTENDERS);
    for contender in 0..CONTENDERS {
        let barrier = Arc::clone(&barrier);
        let path = path.clone();
        let mut candidate = snapshot.clone();
        handles.push(thread::spawn(move || {
            candidate.name = format!("winner_{contender}");
            let conn = open_db(&path).unwrap();
            let users = SqliteUserRepository::try_new(&conn).unwrap();
            barrier.wait();
            users.update_user(&candidate).map(|updated| updated.name)
        }));
    }

    let mut winner_names = Vec::new();
    let mut conflicts = 0;
    for handle in handles {
        match handle.join().unwrap() {
            Ok(name) => winner_names.push(name),
            Err(RepoError::VersionConflict {
                entity: "user",
                id,
                read_version,
            }) => {
                assert_eq!(id, snapshot.id);
                assert_eq!(read_version, snapshot.version);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(winner_names.len(), 1, "exactly one guarded write may win");
    assert_eq!(conflicts, CONTENDERS - 1);

    let conn = open_db(&path).unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let stored = users.get_user(snapshot.id).unwrap().unwrap();
    assert_eq!(stored.name, winner_names[0]);
    assert_ne!(stored.version, snapshot.version);
}

#[test]
fn second_writer_with_stale_snapshot_gets_conflict() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();

    let created = users.create_user(&NewUser::named("original")).unwrap();
    let first = users.get_user(created.id).unwrap().unwrap();
    let second = users.get_user(created.id).unwrap().unwrap();

    let mut first_edit = first;
    first_edit.name = "first writer".to_string();
    let updated = users.update_user(&first_edit).unwrap();

    let mut second_edit = second;
    second_edit.name = "second writer".to_string();
    let err = users.update_user(&second_edit).unwrap_err();
    assert!(matches!(
        err,
        RepoError::VersionConflict {
            entity: "user",
            ..
        }
    ));

    let stored = users.get_user(created.id).unwrap().unwrap();
    assert_eq!(stored.name, "first writer");
    assert_eq!(stored.version, updated.version);
}

#[test]
fn winner_can_chain_updates_through_returned_state() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();

    let created = users.create_user(&NewUser::named("step 0")).unwrap();

    let mut current = created.clone();
    for step in 1..=3 {
        current.name = format!("step {step}");
        current = users.update_user(&current).unwrap();
    }

    let stored = users.get_user(created.id).unwrap().unwrap();
    assert_eq!(stored.name, "step 3");
    assert_eq!(stored.version, current.version);
    assert_ne!(stored.version, created.version);
}

#[test]
fn tasks_share_the_same_guarded_write_contract() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let created = tasks.create_task(&NewTask::new("contended task")).unwrap();
    let stale = created.clone();

    let mut fresh_edit = created.clone();
    fresh_edit.task_name = "renamed once".to_string();
    tasks.update_task(&fresh_edit).unwrap();

    let mut stale_edit = stale;
    stale_edit.task_name = "renamed twice".to_string();
    let err = tasks.update_task(&stale_edit).unwrap_err();
    assert!(matches!(
        err,
        RepoError::VersionConflict {
            entity: "task",
            ..
        }
    ));

    let stored = tasks.get_task(created.id).unwrap().unwrap();
    assert_eq!(stored.task_name, "renamed once");
}
