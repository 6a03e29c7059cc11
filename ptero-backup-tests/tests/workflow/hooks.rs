//! Completion polling and post-backup hooks

use std::time::Duration;
use test_utils::{
    backup_completed, backup_in_progress, server, Advisory, HookCall, Method, MockHookRunner,
    MockReply, RunStatus, ServerOutcome, TestHarness,
};

fn detail_url() -> String {
    TestHarness::backup_url("s1", "b-new")
}

#[test]
fn test_hook_runs_after_completion() {
    let hook = MockHookRunner::new();
    let harness = TestHarness::new()
        .with_hook(hook.clone())
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_succeeds("s1", "b-new");
    harness.reply(Method::Get, &detail_url(), MockReply::ok(backup_in_progress("b-new")));
    harness.reply(Method::Get, &detail_url(), MockReply::ok(backup_completed("b-new")));

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert_eq!(harness.count(Method::Get, &detail_url()), 2);
    assert_eq!(
        hook.get_calls(),
        vec![HookCall {
            server_id: "s1".to_string(),
            backup_id: "b-new".to_string(),
        }]
    );
    // Two polls, then the create interval
    assert_eq!(
        harness.sleeper.get_sleeps(),
        vec![
            Duration::from_secs(10),
            Duration::from_secs(10),
            Duration::from_secs(3)
        ]
    );
}

#[test]
fn test_no_polling_without_hook() {
    let harness = TestHarness::new().with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_succeeds("s1", "b-new");

    harness.run();

    assert_eq!(harness.count(Method::Get, &detail_url()), 0);
}

#[test]
fn test_hook_failure_is_advisory() {
    let hook = MockHookRunner::new().with_exit_code(3);
    let harness = TestHarness::new()
        .with_hook(hook.clone())
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_succeeds("s1", "b-new");
    harness.reply(Method::Get, &detail_url(), MockReply::ok(backup_completed("b-new")));

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    assert!(harness.notifier.get_sent().is_empty());
    assert_eq!(hook.get_calls().len(), 1);

    let RunStatus::Completed { results, .. } = status else {
        panic!("expected a completed run");
    };
    assert_eq!(results[0].outcome, ServerOutcome::Success);
    assert!(matches!(
        results[0].advisories[..],
        [Advisory::HookFailure { ref backup_id, .. }] if backup_id == "b-new"
    ));
}

#[test]
fn test_hook_spawn_error_is_advisory() {
    let hook = MockHookRunner::new().with_spawn_error("permission denied");
    let harness = TestHarness::new()
        .with_hook(hook)
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_succeeds("s1", "b-new");
    harness.reply(Method::Get, &detail_url(), MockReply::ok(backup_completed("b-new")));

    let status = harness.run();

    assert_eq!(status.exit_code(), 0);
    let RunStatus::Completed { results, .. } = status else {
        panic!("expected a completed run");
    };
    assert!(results[0].advisories[0].to_string().contains("permission denied"));
}

#[test]
fn test_poll_timeout_fails_server() {
    let hook = MockHookRunner::new();
    let harness = TestHarness::new()
        .with_hook(hook.clone())
        .with_poll_timeout(Duration::from_secs(30))
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_succeeds("s1", "b-new");
    harness.reply(Method::Get, &detail_url(), MockReply::ok(backup_in_progress("b-new")));

    let status = harness.run();

    assert_eq!(status.exit_code(), 1);
    // Three polls per pass, two passes
    assert_eq!(harness.count(Method::Get, &detail_url()), 6);
    assert_eq!(harness.creates("s1"), 2);
    assert!(hook.get_calls().is_empty());
    assert_eq!(harness.notifier.get_sent().len(), 1);
}

#[test]
fn test_poll_error_fails_server() {
    let harness = TestHarness::new()
        .with_hook(MockHookRunner::new())
        .with_servers(vec![server("s1", "Lobby", 3)]);
    harness.create_succeeds("s1", "b-new");
    harness.reply(Method::Get, &detail_url(), MockReply::error(404, "backup not found"));

    let status = harness.run();

    assert_eq!(status.exit_code(), 1);
    let RunStatus::Completed { results, .. } = status else {
        panic!("expected a completed run");
    };
    assert!(matches!(
        results[0].outcome,
        ServerOutcome::Failed { ref reason } if reason.contains("backup not found")
    ));
}
