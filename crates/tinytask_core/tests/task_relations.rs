use tinytask_core::db::open_db_in_memory;
use tinytask_core::{
    NewTask, NewUser, RepoError, SqliteTaskRepository, SqliteUserRepository, TaskBrief,
    TaskQuery, TaskRepository, TextFilter, UserRepository,
};

#[test]
fn create_linked_task_and_read_back() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let owner = users.create_user(&NewUser::named("owner")).unwrap();
    let draft = NewTask::new("linked work").assigned_to(owner.id);
    let created = tasks.create_task(&draft).unwrap();

    assert_eq!(created.task_uid, draft.task_uid);
    assert_eq!(created.user_id, Some(owner.id));
    assert!(!created.version.is_nil());

    let loaded = tasks.get_task(created.id).unwrap().unwrap();
    assert_eq!(loaded, created);
}

#[test]
fn task_for_missing_user_fails_foreign_key_check() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let err = tasks
        .create_task(&NewTask::new("orphan").assigned_to(999))
        .unwrap_err();
    assert!(matches!(err, RepoError::Db(_)));
}

#[test]
fn join_read_attaches_users_and_keeps_unassigned_rows() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let owner = users.create_user(&NewUser::named("owner")).unwrap();
    let assigned = tasks
        .create_task(&NewTask::new("assigned").assigned_to(owner.id))
        .unwrap();
    let floating = tasks.create_task(&NewTask::new("floating")).unwrap();

    let joined = tasks.list_tasks_with_users(&TaskQuery::default()).unwrap();
    assert_eq!(joined.len(), 2);

    assert_eq!(joined[0].task, assigned);
    assert_eq!(joined[0].user.as_ref().unwrap(), &owner);

    assert_eq!(joined[1].task, floating);
    assert!(joined[1].user.is_none());
}

#[test]
fn user_name_filter_selects_only_that_users_tasks() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let alice = users.create_user(&NewUser::named("alice")).unwrap();
    let bob = users.create_user(&NewUser::named("bob")).unwrap();
    let for_alice = tasks
        .create_task(&NewTask::new("alice task").assigned_to(alice.id))
        .unwrap();
    tasks
        .create_task(&NewTask::new("bob task").assigned_to(bob.id))
        .unwrap();
    tasks.create_task(&NewTask::new("floating")).unwrap();

    let query = TaskQuery {
        user_name: Some(TextFilter::exact("alice")),
        ..TaskQuery::default()
    };

    let listed = tasks.list_tasks(&query).unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id, for_alice.id);
    assert_eq!(tasks.count_tasks(&query).unwrap(), 1);

    // Same predicate over the join read drops the unassigned row too.
    let joined = tasks.list_tasks_with_users(&query).unwrap();
    assert_eq!(joined.len(), 1);
    assert_eq!(joined[0].user.as_ref().unwrap().id, alice.id);
}

#[test]
fn delete_task_removes_row_then_reports_not_found() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let task = tasks.create_task(&NewTask::new("disposable")).unwrap();
    tasks.delete_task(task.id).unwrap();
    assert!(tasks.get_task(task.id).unwrap().is_none());

    let err = tasks.delete_task(task.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "task", .. }));
}

#[test]
fn find_task_by_exact_name_returns_first_match_or_none() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let query = TaskQuery::by_name("test_task");
    assert!(tasks.find_task(&query).unwrap().is_none());

    let first = tasks.create_task(&NewTask::new("test_task")).unwrap();
    tasks.create_task(&NewTask::new("test_task")).unwrap();

    let found = tasks.find_task(&query).unwrap().unwrap();
    assert_eq!(found.id, first.id);
}

#[test]
fn deleting_user_cascades_to_their_tasks() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let owner = users.create_user(&NewUser::named("leaving")).unwrap();
    tasks
        .create_task(&NewTask::new("goes away").assigned_to(owner.id))
        .unwrap();
    tasks
        .create_task(&NewTask::new("also goes").assigned_to(owner.id))
        .unwrap();
    let floating = tasks.create_task(&NewTask::new("stays")).unwrap();

    users.delete_user(owner.id).unwrap();

    let remaining = tasks.list_tasks(&TaskQuery::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, floating.id);
}

#[test]
fn update_can_reassign_task_to_another_user() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let alice = users.create_user(&NewUser::named("alice")).unwrap();
    let bob = users.create_user(&NewUser::named("bob")).unwrap();
    let created = tasks
        .create_task(&NewTask::new("handover").assigned_to(alice.id))
        .unwrap();

    let mut edit = created.clone();
    edit.user_id = Some(bob.id);
    let updated = tasks.update_task(&edit).unwrap();

    assert_eq!(updated.user_id, Some(bob.id));
    assert_ne!(updated.version, created.version);

    let stored = tasks.get_task(created.id).unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[test]
fn renaming_each_task_of_a_user_is_visible_to_filters() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let owner = users.create_user(&NewUser::named("busy")).unwrap();
    tasks
        .create_task(&NewTask::new("test_task").assigned_to(owner.id))
        .unwrap();
    tasks
        .create_task(&NewTask::new("test_task2").assigned_to(owner.id))
        .unwrap();

    for (index, task) in tasks
        .list_tasks(&TaskQuery::for_user(owner.id))
        .unwrap()
        .into_iter()
        .enumerate()
    {
        let mut edit = task;
        edit.task_name = format!("update_task{index}");
        tasks.update_task(&edit).unwrap();
    }

    let query = TaskQuery {
        task_name: Some(TextFilter::contains("update_task")),
        ..TaskQuery::default()
    };
    assert_eq!(tasks.count_tasks(&query).unwrap(), 2);
}

#[test]
fn bulk_delete_removes_matching_tasks_and_reports_count() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    tasks.create_task(&NewTask::new("chore: dishes")).unwrap();
    tasks.create_task(&NewTask::new("chore: laundry")).unwrap();
    let keeper = tasks.create_task(&NewTask::new("project work")).unwrap();

    let query = TaskQuery {
        task_name: Some(TextFilter::starts_with("chore:")),
        ..TaskQuery::default()
    };
    let removed = tasks.delete_tasks(&query).unwrap();
    assert_eq!(removed, 2);

    let remaining = tasks.list_tasks(&TaskQuery::default()).unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, keeper.id);

    // No matches deletes nothing.
    assert_eq!(tasks.delete_tasks(&query).unwrap(), 0);
}

#[test]
fn bulk_delete_with_empty_query_clears_the_table() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    for name in ["one", "two", "three"] {
        tasks.create_task(&NewTask::new(name)).unwrap();
    }

    let removed = tasks.delete_tasks(&TaskQuery::default()).unwrap();
    assert_eq!(removed, 3);
    assert_eq!(tasks.count_tasks(&TaskQuery::default()).unwrap(), 0);
}

#[test]
fn blanked_stored_task_name_is_rejected_on_read() {
    let conn = open_db_in_memory().unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let created = tasks.create_task(&NewTask::new("legible")).unwrap();
    conn.execute("UPDATE tasks SET task_name = '' WHERE id = ?1;", [created.id])
        .unwrap();

    let err = tasks.get_task(created.id).unwrap_err();
    assert!(matches!(err, RepoError::InvalidData(_)));
}

#[test]
fn latest_task_brief_picks_the_newest_matching_user() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let older = users.create_user(&NewUser::named("user_older")).unwrap();
    let newer = users.create_user(&NewUser::named("user_newer")).unwrap();
    tasks
        .create_task(&NewTask::new("old work").assigned_to(older.id))
        .unwrap();
    let newest_task = tasks
        .create_task(&NewTask::new("new work").assigned_to(newer.id))
        .unwrap();

    // Inserts can land in the same millisecond; separate them explicitly.
    conn.execute(
        "UPDATE users SET created_on = created_on + 1000 WHERE id = ?1;",
        [newer.id],
    )
    .unwrap();

    let brief = tasks
        .latest_task_brief(&TextFilter::starts_with("user_"))
        .unwrap()
        .unwrap();
    assert_eq!(
        brief,
        TaskBrief {
            user_id: newer.id,
            user_name: "user_newer".to_string(),
            task_id: newest_task.id,
            task_name: "new work".to_string(),
        }
    );
}

#[test]
fn latest_task_brief_without_match_returns_none() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();
    let tasks = SqliteTaskRepository::try_new(&conn).unwrap();

    let owner = users.create_user(&NewUser::named("present")).unwrap();
    tasks
        .create_task(&NewTask::new("work").assigned_to(owner.id))
        .unwrap();

    let brief = tasks
        .latest_task_brief(&TextFilter::exact("absent"))
        .unwrap();
    assert!(brief.is_none());
}
