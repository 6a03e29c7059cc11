//! Test harness wiring a [`BackupManager`] to mocks
//!
//! Sleeps are recorded rather than performed, so the harness uses the real
//! default intervals and tests can assert on them.

use ptero_backup::api::{PagedApiClient, PanelApi, RetryPolicy};
use ptero_backup::config::{ApiConfig, BackupSettings, NotificationConfig};
use ptero_backup::managers::backup::{BackupManager, WorkflowSettings};
use ptero_backup::managers::notification::mock::RecordingNotifier;
use ptero_backup::managers::report::{RunReport, RunStatus};
use ptero_backup::utils::hook::mock::MockHookRunner;
use ptero_backup::utils::hook::HookRunner;
use ptero_backup::utils::http::mock::{MockReply, MockTransport};
use ptero_backup::utils::http::Method;
use ptero_backup::utils::sleeper::mock::RecordingSleeper;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::fixtures::list;

pub const SERVERS_URL: &str = "https://panel.test/api/client";
pub const BACKUPS_URL: &str = "https://panel.test/api/client/servers";

pub struct TestHarness {
    pub transport: MockTransport,
    pub sleeper: RecordingSleeper,
    pub notifier: RecordingNotifier,
    pub hook: Option<MockHookRunner>,
    pub settings: WorkflowSettings,
    pub retry: RetryPolicy,
}

impl TestHarness {
    /// Rotation off, no hook, one attempt per request
    pub fn new() -> Self {
        Self {
            transport: MockTransport::new(),
            sleeper: RecordingSleeper::new(),
            notifier: RecordingNotifier::new(),
            hook: None,
            settings: WorkflowSettings::from(&BackupSettings::default()),
            retry: RetryPolicy::new(1, 1.0),
        }
    }

    pub fn with_rotation(mut self) -> Self {
        self.settings.rotate = true;
        self
    }

    pub fn with_hook(mut self, hook: MockHookRunner) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.settings.poll_timeout = Some(timeout);
        self
    }

    pub fn with_retry(mut self, max_attempts: u32) -> Self {
        self.retry = RetryPolicy::new(max_attempts, 1.0);
        self
    }

    /// Serve a single-page server listing
    pub fn with_servers(self, servers: Vec<Value>) -> Self {
        self.transport.push(Method::Get, SERVERS_URL, MockReply::ok(list(servers)));
        self
    }

    pub fn backups_url(server_id: &str) -> String {
        format!("{}/{}/backups", BACKUPS_URL, server_id)
    }

    pub fn backup_url(server_id: &str, uuid: &str) -> String {
        format!("{}/{}/backups/{}", BACKUPS_URL, server_id, uuid)
    }

    pub fn reply(&self, method: Method, url: &str, reply: MockReply) {
        self.transport.push(method, url, reply);
    }

    /// Serve a single-page backup listing for a server
    pub fn backups(&self, server_id: &str, backups: Vec<Value>) {
        self.reply(Method::Get, &Self::backups_url(server_id), MockReply::ok(list(backups)));
    }

    pub fn create_succeeds(&self, server_id: &str, uuid: &str) {
        self.reply(
            Method::Post,
            &Self::backups_url(server_id),
            MockReply::ok(json!({
                "object": "backup",
                "attributes": {
                    "uuid": uuid,
                    "name": "Backup",
                    "created_at": "2024-03-02T00:00:00+00:00",
                    "completed_at": null,
                    "is_locked": false
                }
            })),
        );
    }

    pub fn create_fails(&self, server_id: &str, status: u16) {
        self.reply(
            Method::Post,
            &Self::backups_url(server_id),
            MockReply::error(status, "backup creation failed"),
        );
    }

    pub fn delete_succeeds(&self, server_id: &str, uuid: &str) {
        self.reply(Method::Delete, &Self::backup_url(server_id, uuid), MockReply::no_content());
    }

    pub fn notification_config(&self) -> NotificationConfig {
        NotificationConfig {
            enabled: true,
            webhook_url: "https://hooks.test/webhook".to_string(),
            ..NotificationConfig::default()
        }
    }

    pub fn manager(&self) -> BackupManager {
        let api_config = ApiConfig {
            servers_url: SERVERS_URL.to_string(),
            backups_url: BACKUPS_URL.to_string(),
            api_key: "ptlc_test_key".to_string(),
            max_retries: self.retry.max_attempts,
            retry_backoff_factor: self.retry.backoff_factor,
            request_timeout_seconds: 30,
        };
        let client = PagedApiClient::new(
            Arc::new(self.transport.clone()),
            Arc::new(self.sleeper.clone()),
            self.retry,
        );
        let hook = self
            .hook
            .clone()
            .map(|h| Arc::new(h) as Arc<dyn HookRunner>);

        BackupManager::new(
            PanelApi::new(client, &api_config),
            self.settings.clone(),
            hook,
            Arc::new(self.sleeper.clone()),
        )
    }

    pub fn report(&self) -> RunReport {
        RunReport::new(Some(Arc::new(self.notifier.clone())), &self.notification_config())
    }

    pub fn run(&self) -> RunStatus {
        self.manager().run(&self.report())
    }

    pub fn count(&self, method: Method, url: &str) -> usize {
        self.transport
            .get_calls()
            .iter()
            .filter(|c| c.method == method && c.url == url)
            .count()
    }

    pub fn creates(&self, server_id: &str) -> usize {
        self.count(Method::Post, &Self::backups_url(server_id))
    }

    pub fn deleted(&self, server_id: &str) -> Vec<String> {
        let prefix = format!("{}/", Self::backups_url(server_id));
        self.transport
            .get_calls()
            .iter()
            .filter(|c| c.method == Method::Delete)
            .filter_map(|c| c.url.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
