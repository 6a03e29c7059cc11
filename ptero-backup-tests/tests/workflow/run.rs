//! Run-level behaviour: zero-quota skips, the retry pass, notification and
//! exit status.

use std::time::Duration;
use test_utils::{
    backup, list_page, server, Method, MockReply, RunStatus, ServerOutcome, TestHarness,
    SERVERS_URL,
};

fn failed_ids(status: &RunStatus) -> Vec<String> {
    status
        .summary()
        .map(|s| s.failed_ids.iter().cloned().collect())
        .unwrap_or_default()
}

#[test]
fn test_zero_quota_server_is_skipped() {
    let harness = TestHarness::new().with_servers(vec![
        server("s1", "Lobby", 2),
        server("s2", "Archive", 0),
        server("s3", "Survival", 5),
    ]);
    harness.create_succeeds("s1", "b-s1");
    harness.create_succeeds("s3", "b-s3");

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert_eq!(harness.creates("s1"), 1);
    assert_eq!(harness.creates("s2"), 0);
    assert_eq!(harness.creates("s3"), 1);

    let RunStatus::Completed { results, .. } = status else {
        panic!("expected a completed run");
    };
    assert_eq!(results.len(), 3);
    assert!(results.iter().all(|r| r.outcome == ServerOutcome::Success));
    assert!(harness.notifier.get_sent().is_empty());
}

#[test]
fn test_failed_create_recovers_in_retry_pass() {
    let harness = TestHarness::new().with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_fails("s1", 500);
    harness.create_succeeds("s1", "b-new");

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert!(status.summary().unwrap().all_succeeded);
    assert_eq!(harness.creates("s1"), 2);
    assert!(harness.notifier.get_sent().is_empty());
}

#[test]
fn test_persistent_failure_notifies_once() {
    let harness = TestHarness::new().with_servers(vec![
        server("s1", "Lobby", 3),
        server("s2", "Survival", 3),
    ]);
    harness.create_fails("s1", 500);
    harness.create_succeeds("s2", "b-s2");

    let status = harness.run();

    assert_eq!(status.exit_code(), 1);
    assert_eq!(failed_ids(&status), vec!["s1".to_string()]);
    assert_eq!(harness.creates("s1"), 2);
    assert_eq!(harness.creates("s2"), 1);

    let sent = harness.notifier.get_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, harness.notification_config().subject);
    assert!(sent[0].body.starts_with(&harness.notification_config().body));
    assert!(sent[0].body.contains("s1"));
    assert!(!sent[0].body.contains("s2"));
}

#[test]
fn test_client_error_fails_server_without_request_retries() {
    let harness = TestHarness::new()
        .with_retry(5)
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_fails("s1", 403);

    let status = harness.run();

    assert_eq!(status.exit_code(), 1);
    // One attempt per pass
    assert_eq!(harness.creates("s1"), 2);
}

#[test]
fn test_listing_failure_is_fatal() {
    let harness = TestHarness::new().with_retry(3);
    harness.reply(Method::Get, SERVERS_URL, MockReply::NetworkError("connection refused".into()));

    let status = harness.run();

    assert_eq!(status.exit_code(), 2);
    assert!(matches!(status, RunStatus::Fatal { .. }));
    assert_eq!(harness.count(Method::Get, SERVERS_URL), 3);
    assert_eq!(harness.transport.count_method(Method::Post), 0);
    assert_eq!(harness.notifier.get_sent().len(), 1);
}

#[test]
fn test_paginated_server_listing() {
    let harness = TestHarness::new();
    harness.reply(
        Method::Get,
        SERVERS_URL,
        MockReply::ok(list_page(vec![server("s1", "Lobby", 1)], 1, 2)),
    );
    harness.reply(
        Method::Get,
        &format!("{}?page=2", SERVERS_URL),
        MockReply::ok(list_page(vec![server("s2", "Survival", 1)], 2, 2)),
    );
    harness.create_succeeds("s1", "b-s1");
    harness.create_succeeds("s2", "b-s2");

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert_eq!(harness.creates("s1"), 1);
    assert_eq!(harness.creates("s2"), 1);
}

#[test]
fn test_throttle_delays_between_servers() {
    let harness = TestHarness::new().with_servers(vec![
        server("s1", "Lobby", 1),
        server("s2", "Survival", 1),
    ]);
    harness.create_succeeds("s1", "b-s1");
    harness.create_fails("s2", 500);

    harness.run();

    // s1 success, s2 failure, s2 retry failure
    assert_eq!(
        harness.sleeper.get_sleeps(),
        vec![
            Duration::from_secs(3),
            Duration::from_secs(30),
            Duration::from_secs(30)
        ]
    );
}

#[test]
fn test_request_backoff_is_recorded() {
    let harness = TestHarness::new()
        .with_retry(3)
        .with_servers(vec![server("s1", "Lobby", 1)]);
    harness.create_fails("s1", 502);
    harness.create_fails("s1", 502);
    harness.create_succeeds("s1", "b-s1");

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert_eq!(harness.creates("s1"), 3);
    assert_eq!(
        harness.sleeper.get_sleeps(),
        vec![
            Duration::from_secs(1),
            Duration::from_secs(2),
            Duration::from_secs(3)
        ]
    );
}

#[test]
fn test_existing_backups_untouched_without_rotation() {
    let harness = TestHarness::new().with_servers(vec![server("s1", "Lobby", 1)]);
    harness.backups("s1", vec![backup("old", 0)]);
    harness.create_succeeds("s1", "b-s1");

    harness.run();

    assert_eq!(harness.count(Method::Get, &TestHarness::backups_url("s1")), 0);
    assert!(harness.deleted("s1").is_empty());
}
