use rusqlite::Connection;
use tally_core::db::open_db_in_memory;
use tally_core::{
    CounterRepository, CounterScope, CounterService, CounterType, CounterValidationError,
    RepoError, SqliteCounterRepository,
};

fn seed(conn: &Connection) {
    let repo = SqliteCounterRepository::try_new(conn).unwrap();
    let scope = |title: &str, key: &str| CounterScope::new().title(title).key(key);

    repo.increase(&scope("downloads", "linux"), 10).unwrap();
    repo.increase(&scope("downloads", "macos"), 4).unwrap();
    repo.increment(&scope("downloads", "windows")).unwrap();
    repo.increase(&scope("views", "linux"), 2).unwrap();
    repo.increase(&scope("downloads", "linux").isolate("tenant", 1), 8)
        .unwrap();
    repo.increase(&scope("downloads", "linux_50%"), 6).unwrap();
}

fn keys(records: &[tally_core::CounterRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.counter.key.as_str())
        .collect()
}

#[test]
fn get_returns_rows_newest_first() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let rows = repo
        .get(&CounterScope::new().title("downloads"))
        .unwrap();
    assert_eq!(keys(&rows), vec!["linux_50%", "linux", "windows", "macos", "linux"]);
    assert!(rows.iter().all(|record| record.joined.is_empty()));
}

#[test]
fn reads_without_isolation_span_all_isolations() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let all = CounterScope::new().title("downloads").key("linux");
    assert_eq!(repo.count(&all).unwrap(), 2);

    let isolated = all.clone().isolate("tenant", 1);
    let rows = repo.get(&isolated).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].counter.value, 8);

    let other_tenant = all.isolate("tenant", 2);
    assert!(repo.find(&other_tenant).unwrap().is_none());
}

#[test]
fn find_returns_newest_match() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let newest = repo
        .find(&CounterScope::new().key("linux"))
        .unwrap()
        .unwrap();
    assert_eq!(newest.isolation_id, Some(1));
    assert_eq!(newest.value, 8);

    assert!(repo
        .find(&CounterScope::new().title("missing"))
        .unwrap()
        .is_none());
}

#[test]
fn in_keys_filters_by_key_set() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let scope = CounterScope::new()
        .title("downloads")
        .in_keys(["macos"])
        .stats_by_keys(["windows", "bsd"]);
    let rows = repo.get(&scope).unwrap();
    assert_eq!(keys(&rows), vec!["windows", "macos"]);

    let empty = CounterScope::new().in_keys(Vec::<String>::new());
    assert_eq!(repo.count(&empty).unwrap(), 0);
}

#[test]
fn in_keys_respects_isolation_scope() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();
    repo.increase(
        &CounterScope::new()
            .isolate("tenant", 1)
            .title("downloads")
            .key("macos"),
        2,
    )
    .unwrap();

    let scope = CounterScope::new()
        .isolate("tenant", 1)
        .title("downloads")
        .in_keys(["linux", "macos"]);
    let rows = repo.get(&scope).unwrap();

    assert_eq!(keys(&rows), vec!["macos", "linux"]);
    assert!(rows
        .iter()
        .all(|record| record.counter.isolation_id == Some(1)));
    assert_eq!(rows[0].counter.value, 2);
    assert_eq!(rows[1].counter.value, 8);

    let other_tenant = CounterScope::new()
        .isolate("tenant", 2)
        .title("downloads")
        .in_keys(["linux", "macos"]);
    assert!(repo.get(&other_tenant).unwrap().is_empty());
}

#[test]
fn contains_matches_literal_substrings() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let scope = CounterScope::new().title("downloads").contains("inu");
    assert_eq!(repo.count(&scope).unwrap(), 3);

    let percent = CounterScope::new().contains("50%");
    let rows = repo.get(&percent).unwrap();
    assert_eq!(keys(&rows), vec!["linux_50%"]);

    let underscore = CounterScope::new().contains("x_");
    assert_eq!(repo.count(&underscore).unwrap(), 1);
}

#[test]
fn of_type_and_in_titles_filter_rows() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let countable = CounterScope::new().of_type(CounterType::Countable);
    let rows = repo.get(&countable).unwrap();
    assert_eq!(keys(&rows), vec!["windows"]);

    let titles = CounterScope::new()
        .in_titles(["views", "unknown"])
        .key("linux");
    let rows = repo.get(&titles).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].counter.title, "views");
}

#[test]
fn join_projects_columns_from_joined_table() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    conn.execute_batch(
        "CREATE TABLE platforms (slug TEXT PRIMARY KEY, label TEXT NOT NULL, tier INTEGER);
         INSERT INTO platforms (slug, label, tier) VALUES ('linux', 'Linux', 1);
         INSERT INTO platforms (slug, label, tier) VALUES ('macos', 'macOS', NULL);",
    )
    .unwrap();
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let scope = CounterScope::new()
        .title("downloads")
        .join("platforms", "slug", ["platforms.label", "tier"])
        .unwrap();
    let rows = repo.get(&scope).unwrap();

    assert_eq!(keys(&rows), vec!["linux", "macos", "linux"]);
    assert_eq!(rows[0].joined["platforms.label"], serde_json::json!("Linux"));
    assert_eq!(rows[0].joined["tier"], serde_json::json!(1));
    assert_eq!(rows[1].joined["tier"], serde_json::Value::Null);

    assert_eq!(repo.count(&scope).unwrap(), 3);
}

#[test]
fn remove_by_join_only_touches_counters() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    conn.execute_batch(
        "CREATE TABLE platforms (slug TEXT PRIMARY KEY);
         INSERT INTO platforms (slug) VALUES ('macos');",
    )
    .unwrap();
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let scope = CounterScope::new()
        .join("platforms", "slug", Vec::<String>::new())
        .unwrap();
    assert_eq!(repo.remove(&scope).unwrap(), 1);

    let platforms: i64 = conn
        .query_row("SELECT COUNT(*) FROM platforms;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(platforms, 1);
    assert_eq!(repo.count(&CounterScope::new().key("macos")).unwrap(), 0);
}

#[test]
fn paginate_reports_page_metadata() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();
    let scope = CounterScope::new().title("downloads");

    let first = repo.paginate(&scope, 1, 2).unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.per_page, 2);
    assert_eq!(first.current_page, 1);
    assert_eq!(first.last_page, 3);
    assert_eq!(keys(&first.items), vec!["linux_50%", "linux"]);

    let last = repo.paginate(&scope, 3, 2).unwrap();
    assert_eq!(keys(&last.items), vec!["linux"]);

    let beyond = repo.paginate(&scope, 9, 2).unwrap();
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total, 5);

    let empty = repo
        .paginate(&CounterScope::new().title("nothing"), 1, 10)
        .unwrap();
    assert_eq!(empty.total, 0);
    assert_eq!(empty.last_page, 1);
}

#[test]
fn paginate_rejects_zero_page_or_size() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let err = repo.paginate(&CounterScope::new(), 0, 10).unwrap_err();
    assert_eq!(
        err.as_validation(),
        Some(&CounterValidationError::InvalidPagination {
            page: 0,
            per_page: 10
        })
    );
    assert!(repo.paginate(&CounterScope::new(), 1, 0).is_err());
}

#[test]
fn service_paginate_uses_default_page_size() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let service =
        CounterService::new(SqliteCounterRepository::try_new(&conn).unwrap()).with_default_per_page(4);

    let page = service.paginate(&CounterScope::new(), 1, None).unwrap();
    assert_eq!(page.per_page, 4);
    assert_eq!(page.items.len(), 4);
    assert_eq!(page.last_page, 2);

    let page = service.paginate(&CounterScope::new(), 1, Some(6)).unwrap();
    assert_eq!(page.items.len(), 6);
    assert_eq!(page.last_page, 1);
}

#[test]
fn remove_deletes_every_matching_row() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let removed = repo
        .remove(&CounterScope::new().title("downloads").key("linux"))
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(repo.count(&CounterScope::new()).unwrap(), 4);

    let removed = repo
        .remove(&CounterScope::new().title("downloads").key("bsd"))
        .unwrap();
    assert_eq!(removed, 0);
}

#[test]
fn remove_without_filters_is_rejected() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let err = repo.remove(&CounterScope::new()).unwrap_err();
    assert_eq!(
        err.as_validation(),
        Some(&CounterValidationError::UnscopedRemove)
    );
    assert_eq!(repo.count(&CounterScope::new()).unwrap(), 6);
}

#[test]
fn remove_by_id_deletes_one_row_or_reports_missing() {
    let conn = open_db_in_memory().unwrap();
    seed(&conn);
    let repo = SqliteCounterRepository::try_new(&conn).unwrap();

    let target = repo
        .find(&CounterScope::new().title("views"))
        .unwrap()
        .unwrap();
    repo.remove_by_id(target.id).unwrap();
    assert!(repo
        .find(&CounterScope::new().title("views"))
        .unwrap()
        .is_none());

    let err = repo.remove_by_id(target.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == target.id));
}
