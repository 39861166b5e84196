//! Sweep tests against a throwaway server

use chrono::{DateTime, TimeDelta, Utc};

use crate::{
    DatabaseName,
    gc::{self, GcError, GcPolicy},
    test_utils::TempServer,
};

fn aged(now: DateTime<Utc>, minutes: i64, suffix: &str) -> DatabaseName {
    DatabaseName::format(now - TimeDelta::minutes(minutes), suffix)
}

/// Databases created 10, 5 and 1 minute(s) before `now`, oldest first
async fn create_aged_fixtures(server: &TempServer, now: DateTime<Utc>) -> [DatabaseName; 3] {
    let fixtures = [
        aged(now, 10, "qwertyuiop_it_collect"),
        aged(now, 5, "asdfghjkla_it_collect"),
        aged(now, 1, "zxcvbnmqwe_it_collect"),
    ];
    for name in &fixtures {
        server.create_database(name).await;
    }
    fixtures
}

#[tokio::test]
async fn list_expired_with_three_minute_retention_returns_older_databases_only() {
    //* Given
    let server = TempServer::start().await;
    let now = Utc::now();
    let [ten_min, five_min, _one_min] = create_aged_fixtures(&server, now).await;

    // Not following the naming convention, even though it sorts before the boundary
    server.create_database("pgtest").await;
    server.create_database("app_20200101000000").await;

    let mut conn = server.connect().await;

    //* When
    let result = gc::list_expired(&mut conn, &GcPolicy::default(), now).await;

    //* Then
    let expired = result.expect("listing expired databases should succeed");
    assert_eq!(expired, vec![ten_min, five_min]);
}

#[tokio::test]
async fn collect_with_default_policy_drops_expired_databases_in_background() {
    //* Given
    let server = TempServer::start().await;
    let now = Utc::now();
    let [ten_min, five_min, one_min] = create_aged_fixtures(&server, now).await;

    let mut conn = server.connect().await;

    //* When
    let result = gc::collect(&mut conn, server.admin_url(), &GcPolicy::default(), now).await;

    //* Then
    let scheduled = result.expect("collect should succeed");
    assert_eq!(scheduled, vec![ten_min.clone(), five_min.clone()]);

    assert!(
        server.wait_until_dropped(&ten_min).await,
        "oldest database should eventually be dropped"
    );
    assert!(
        server.wait_until_dropped(&five_min).await,
        "second oldest database should eventually be dropped"
    );
    assert!(
        server.database_exists(&one_min).await,
        "database younger than the retention should be kept"
    );
}

#[tokio::test]
async fn collect_with_drop_limit_schedules_oldest_first() {
    //* Given
    let server = TempServer::start().await;
    let now = Utc::now();
    let [ten_min, five_min, _one_min] = create_aged_fixtures(&server, now).await;

    let policy = GcPolicy {
        max_drops: 1,
        ..Default::default()
    };
    let mut conn = server.connect().await;

    //* When
    let result = gc::collect(&mut conn, server.admin_url(), &policy, now).await;

    //* Then
    let scheduled = result.expect("collect should succeed");
    assert_eq!(scheduled, vec![ten_min.clone()]);

    assert!(
        server.wait_until_dropped(&ten_min).await,
        "oldest database should eventually be dropped"
    );
    assert!(
        server.database_exists(&five_min).await,
        "expired database past the drop limit should be left for the next sweep"
    );
}

#[tokio::test]
async fn collect_with_nothing_expired_schedules_nothing() {
    //* Given
    let server = TempServer::start().await;
    let now = Utc::now();
    let young = aged(now, 1, "abcdefghij");
    server.create_database(&young).await;

    let mut conn = server.connect().await;

    //* When
    let result = gc::collect(&mut conn, server.admin_url(), &GcPolicy::default(), now).await;

    //* Then
    let scheduled = result.expect("collect should succeed");
    assert!(scheduled.is_empty(), "nothing should be scheduled: {scheduled:?}");
    assert!(server.database_exists(&young).await);
}

#[tokio::test]
async fn list_returns_every_test_database_oldest_first() {
    //* Given
    let server = TempServer::start().await;
    let now = Utc::now();
    let fixtures = create_aged_fixtures(&server, now).await;
    server.create_database("unrelated").await;

    let mut conn = server.connect().await;

    //* When
    let result = gc::list(&mut conn).await;

    //* Then
    let listed = result.expect("listing databases should succeed");
    assert_eq!(listed, fixtures.to_vec());
}

#[tokio::test]
async fn drop_database_with_missing_database_fails() {
    //* Given
    let server = TempServer::start().await;
    let missing = aged(Utc::now(), 10, "nonexisten");

    let mut conn = server.connect().await;

    //* When
    let result = gc::drop_database(&mut conn, &missing).await;

    //* Then
    let err = result.expect_err("dropping a missing database should fail");
    assert!(
        matches!(&err, GcError::Drop { name, .. } if *name == missing),
        "unexpected error: {err:?}"
    );
}

#[tokio::test]
async fn collect_with_broken_connection_fails_to_enumerate() {
    //* Given
    let server = TempServer::start().await;
    let now = Utc::now();
    let [ten_min, ..] = create_aged_fixtures(&server, now).await;

    let mut conn = server.connect().await;
    server.terminate_backend(&mut conn).await;

    //* When
    let result = gc::collect(&mut conn, server.admin_url(), &GcPolicy::default(), now).await;

    //* Then
    let err = result.expect_err("collect on a dead connection should fail");
    assert!(
        matches!(err, GcError::Enumerate(_)),
        "unexpected error: {err:?}"
    );
    assert!(
        server.database_exists(&ten_min).await,
        "nothing should be dropped when enumeration fails"
    );
}
