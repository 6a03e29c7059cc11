//! Rotation before creation

use test_utils::{
    backup, locked_backup, server, Advisory, Method, MockReply, RunStatus, ServerOutcome,
    TestHarness,
};

fn only_result(status: RunStatus) -> test_utils::ServerResult {
    match status {
        RunStatus::Completed { mut results, .. } => {
            assert_eq!(results.len(), 1);
            results.remove(0)
        }
        RunStatus::Fatal { reason } => panic!("unexpected fatal run: {}", reason),
    }
}

#[test]
fn test_at_quota_deletes_oldest_then_creates() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Lobby", 3)]);
    // Listed newest first; rotation must still pick the oldest
    harness.backups("s1", vec![backup("b3", 3), backup("b1", 1), backup("b2", 2)]);
    harness.delete_succeeds("s1", "b1");
    harness.create_succeeds("s1", "b-new");

    let result = only_result(harness.run());

    assert_eq!(result.outcome, ServerOutcome::Success);
    assert!(result.advisories.is_empty());
    assert_eq!(harness.deleted("s1"), vec!["b1".to_string()]);
    assert_eq!(harness.creates("s1"), 1);
}

#[test]
fn test_below_quota_deletes_nothing() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.backups("s1", vec![backup("b1", 1)]);
    harness.create_succeeds("s1", "b-new");

    harness.run();

    assert!(harness.deleted("s1").is_empty());
    assert_eq!(harness.creates("s1"), 1);
}

#[test]
fn test_locked_backups_are_skipped() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.backups(
        "s1",
        vec![
            locked_backup("b1", 1),
            backup("b2", 2),
            backup("b3", 3),
            backup("b4", 4),
        ],
    );
    harness.delete_succeeds("s1", "b2");
    harness.delete_succeeds("s1", "b3");
    harness.create_succeeds("s1", "b-new");

    let result = only_result(harness.run());

    assert_eq!(result.outcome, ServerOutcome::Success);
    assert_eq!(harness.deleted("s1"), vec!["b2".to_string(), "b3".to_string()]);
}

#[test]
fn test_shortfall_is_advisory() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Lobby", 2)]);
    harness.backups("s1", vec![locked_backup("b1", 1), locked_backup("b2", 2)]);
    harness.create_succeeds("s1", "b-new");

    let status = harness.run();
    assert_eq!(status.exit_code(), 0);

    let result = only_result(status);
    assert_eq!(result.outcome, ServerOutcome::Success);
    assert_eq!(result.advisories, vec![Advisory::PolicyShortfall { shortfall: 1 }]);
    assert!(harness.deleted("s1").is_empty());
    assert_eq!(harness.creates("s1"), 1);
}

#[test]
fn test_partial_delete_failure_still_creates() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Lobby", 2)]);
    harness.backups("s1", vec![backup("b1", 1), backup("b2", 2), backup("b3", 3)]);
    harness.reply(
        Method::Delete,
        &TestHarness::backup_url("s1", "b1"),
        MockReply::error(500, "storage unavailable"),
    );
    harness.delete_succeeds("s1", "b2");
    harness.create_succeeds("s1", "b-new");

    let status = harness.run();
    assert_eq!(status.exit_code(), 0);

    let result = only_result(status);
    assert_eq!(result.outcome, ServerOutcome::Success);
    assert_eq!(result.advisories.len(), 1);
    assert!(matches!(
        result.advisories[0],
        Advisory::DeleteFailed { ref uuid, .. } if uuid == "b1"
    ));
    assert_eq!(harness.deleted("s1"), vec!["b1".to_string(), "b2".to_string()]);
    assert_eq!(harness.creates("s1"), 1);
}

#[test]
fn test_zero_quota_deletes_all_unlocked_without_creating() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Archive", 0)]);
    harness.backups(
        "s1",
        vec![backup("b1", 1), locked_backup("b2", 2), backup("b3", 3)],
    );
    harness.delete_succeeds("s1", "b1");
    harness.delete_succeeds("s1", "b3");

    let result = only_result(harness.run());

    assert_eq!(result.outcome, ServerOutcome::Success);
    assert_eq!(result.advisories, vec![Advisory::PolicyShortfall { shortfall: 1 }]);
    assert_eq!(harness.deleted("s1"), vec!["b1".to_string(), "b3".to_string()]);
    assert_eq!(harness.creates("s1"), 0);
}

#[test]
fn test_listing_failure_fails_server_and_retry_only_creates() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.reply(
        Method::Get,
        &TestHarness::backups_url("s1"),
        MockReply::error(500, "database error"),
    );
    harness.create_succeeds("s1", "b-new");

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert_eq!(harness.count(Method::Get, &TestHarness::backups_url("s1")), 1);
    assert_eq!(harness.creates("s1"), 1);
}

#[test]
fn test_zero_quota_listing_failure_never_creates_on_retry() {
    let harness = TestHarness::new()
        .with_rotation()
        .with_servers(vec![server("s1", "Archive", 0)]);
    harness.reply(
        Method::Get,
        &TestHarness::backups_url("s1"),
        MockReply::error(500, "database error"),
    );
    harness.create_succeeds("s1", "b-new");

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert_eq!(harness.creates("s1"), 0);
    assert_eq!(only_result(status).outcome, ServerOutcome::Success);
}
