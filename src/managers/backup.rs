//! Backup manager - orchestrates rotation, creation, completion polling and
//! post-backup hooks across every server, one server at a time.

use crate::api::{sort_by_age, ApiError, PagedApiClient, PanelApi, Server};
use crate::config::{expand_tilde, BackupSettings, Config};
use crate::managers::report::{Advisory, RunReport, RunStatus, ServerOutcome, ServerResult};
use crate::managers::rotation::{self, RetentionDecision};
use crate::utils::hook::{HookRunner, ScriptHookRunner};
use crate::utils::http::ReqwestTransport;
use crate::utils::sleeper::{Sleeper, ThreadSleeper};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

/// Timing and behaviour knobs for the per-server workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub rotate: bool,
    pub poll_interval: Duration,
    /// `None` waits for completion indefinitely
    pub poll_timeout: Option<Duration>,
    pub create_interval: Duration,
    pub failure_interval: Duration,
    pub delete_interval: Duration,
}

impl From<&BackupSettings> for WorkflowSettings {
    fn from(settings: &BackupSettings) -> Self {
        Self {
            rotate: settings.rotate,
            poll_interval: Duration::from_secs(settings.poll_interval_seconds),
            poll_timeout: settings.poll_timeout_seconds.map(Duration::from_secs),
            create_interval: Duration::from_secs(settings.create_interval_seconds),
            failure_interval: Duration::from_secs(settings.failure_interval_seconds),
            delete_interval: Duration::from_secs(settings.delete_interval_seconds),
        }
    }
}

/// Per-server workflow states
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Idle,
    Rotating,
    Creating,
    Polling,
    Hooked,
    Done,
    Failed(String),
}

fn transition(state: &mut WorkflowState, next: WorkflowState) {
    debug!(from = ?state, to = ?next, "Workflow transition");
    *state = next;
}

/// What rotation did for one server
#[derive(Debug, Clone, Default)]
pub struct RotationReport {
    pub deleted: Vec<String>,
    pub shortfall: u32,
    pub delete_failures: Vec<Advisory>,
}

impl RotationReport {
    pub fn is_partial_failure(&self) -> bool {
        !self.delete_failures.is_empty()
    }

    fn into_advisories(self) -> Vec<Advisory> {
        let mut advisories = Vec::new();
        if self.shortfall > 0 {
            advisories.push(Advisory::PolicyShortfall {
                shortfall: self.shortfall,
            });
        }
        advisories.extend(self.delete_failures);
        advisories
    }
}

/// What rotation would do to one server's current backups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    /// Backups the server holds right now
    pub existing: usize,
    pub decision: RetentionDecision,
}

/// Dry-run result for one server
#[derive(Debug)]
pub struct ServerPlan {
    pub server: Server,
    pub rotation: std::result::Result<RotationPlan, ApiError>,
}

pub struct BackupManager {
    api: PanelApi,
    settings: WorkflowSettings,
    hook: Option<Arc<dyn HookRunner>>,
    sleeper: Arc<dyn Sleeper>,
}

impl BackupManager {
    pub fn new(
        api: PanelApi,
        settings: WorkflowSettings,
        hook: Option<Arc<dyn HookRunner>>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            api,
            settings,
            hook,
            sleeper,
        }
    }

    /// Wire the real transport, sleeper and hook script from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.api.api_key, config.api.request_timeout())?;
        let sleeper: Arc<dyn Sleeper> = Arc::new(ThreadSleeper);
        let client = PagedApiClient::from_config(&config.api, Arc::new(transport), sleeper.clone());
        let api = PanelApi::new(client, &config.api);

        let hook = config.backup.post_backup_script.as_ref().map(|script| {
            let runner = ScriptHookRunner::new(
                expand_tilde(script),
                config.backup.hook_timeout_seconds.map(Duration::from_secs),
            );
            Arc::new(runner) as Arc<dyn HookRunner>
        });

        Ok(Self::new(api, WorkflowSettings::from(&config.backup), hook, sleeper))
    }

    pub fn api(&self) -> &PanelApi {
        &self.api
    }

    /// Run the whole pipeline and report the outcome
    pub fn run(&self, report: &RunReport) -> RunStatus {
        info!("Starting backup run");

        let servers = match self.api.list_servers() {
            Ok(servers) => servers,
            Err(e) => return report.fatal(format!("could not list servers: {}", e)),
        };

        if servers.is_empty() {
            warn!("No servers visible to the API key");
        }

        report.finish(self.process_servers(&servers))
    }

    /// First pass over every server, then one create-only retry pass over
    /// the servers that failed.
    pub fn process_servers(&self, servers: &[Server]) -> Vec<ServerResult> {
        info!("Processing {} servers", servers.len());

        let mut results = Vec::with_capacity(servers.len());
        let mut failed = Vec::new();

        for (index, server) in servers.iter().enumerate() {
            let result = self.process_server(server);
            if !result.outcome.is_success() {
                failed.push(index);
            }
            results.push(result);
        }

        if failed.is_empty() {
            return results;
        }

        info!("Retrying backup creation for {} failed server(s)", failed.len());

        for index in failed {
            let server = &servers[index];
            let retry = self.retry_server(server);

            let first = &mut results[index];
            first.outcome = retry.outcome;
            first.advisories.extend(retry.advisories);
        }

        results
    }

    /// Rotate (when enabled), then create a backup for one server
    pub fn process_server(&self, server: &Server) -> ServerResult {
        let span = info_span!("server", id = %server.id, name = %server.name);
        let _enter = span.enter();

        let mut state = WorkflowState::Idle;
        let mut advisories = Vec::new();

        if self.settings.rotate {
            transition(&mut state, WorkflowState::Rotating);
            match self.rotate(server) {
                Ok(report) => {
                    if report.is_partial_failure() {
                        warn!(
                            deleted = report.deleted.len(),
                            failed = report.delete_failures.len(),
                            "Rotation partially failed, continuing with backup creation"
                        );
                    }
                    advisories.extend(report.into_advisories());
                }
                Err(e) => {
                    let reason = format!("failed to list backups: {}", e);
                    error!("{}", reason);
                    transition(&mut state, WorkflowState::Failed(reason.clone()));
                    return ServerResult {
                        server_id: server.id.clone(),
                        outcome: ServerOutcome::Failed { reason },
                        advisories,
                    };
                }
            }
        }

        if server.backup_limit == 0 {
            info!("Backups disabled for server (quota 0), skipping creation");
            transition(&mut state, WorkflowState::Done);
            let mut result = ServerResult::success(&server.id);
            result.advisories = advisories;
            return result;
        }

        let mut result = self.create_backup(server, &mut state);
        advisories.append(&mut result.advisories);
        result.advisories = advisories;
        result
    }

    /// Create-only attempt used by the retry pass
    pub fn retry_server(&self, server: &Server) -> ServerResult {
        let span = info_span!("retry", id = %server.id, name = %server.name);
        let _enter = span.enter();

        let mut state = WorkflowState::Idle;
        if server.backup_limit == 0 {
            info!("Backups disabled for server (quota 0), nothing to retry");
            transition(&mut state, WorkflowState::Done);
            return ServerResult::success(&server.id);
        }

        info!("Retrying backup creation");
        self.create_backup(server, &mut state)
    }

    /// Delete the backups chosen by the rotation policy
    pub fn rotate(&self, server: &Server) -> std::result::Result<RotationReport, ApiError> {
        let mut backups = self.api.list_backups(&server.id)?;
        sort_by_age(&mut backups);

        let decision = rotation::decide(&backups, server.backup_limit);
        info!(
            existing = backups.len(),
            quota = server.backup_limit,
            to_delete = decision.to_delete.len(),
            shortfall = decision.shortfall,
            "Rotation decision"
        );

        if decision.shortfall > 0 {
            warn!(
                shortfall = decision.shortfall,
                "Quota cannot be fully enforced because of locked backups"
            );
        }

        let mut report = RotationReport {
            shortfall: decision.shortfall,
            ..RotationReport::default()
        };

        for backup in &decision.to_delete {
            match self.api.delete_backup(&server.id, &backup.uuid) {
                Ok(()) => {
                    info!(backup = %backup.uuid, name = %backup.name, "Deleted backup");
                    report.deleted.push(backup.uuid.clone());
                }
                Err(e) => {
                    error!(backup = %backup.uuid, error = %e, "Failed to delete backup");
                    report.delete_failures.push(Advisory::DeleteFailed {
                        uuid: backup.uuid.clone(),
                        reason: e.to_string(),
                    });
                }
            }
            self.sleeper.sleep(self.settings.delete_interval);
        }

        Ok(report)
    }

    /// Creating -> Polling -> Hooked -> Done, throttled by the create or
    /// failure interval afterwards
    fn create_backup(&self, server: &Server, state: &mut WorkflowState) -> ServerResult {
        transition(state, WorkflowState::Creating);

        let backup = match self.api.create_backup(&server.id) {
            Ok(backup) => backup,
            Err(e) => return self.fail(server, state, format!("failed to create backup: {}", e)),
        };

        info!(backup = %backup.uuid, "Backup created");

        let mut result = ServerResult::success(&server.id);

        if let Some(ref hook) = self.hook {
            transition(state, WorkflowState::Polling);
            if let Err(reason) = self.wait_for_completion(server, &backup.uuid) {
                return self.fail(server, state, reason);
            }

            transition(state, WorkflowState::Hooked);
            if let Some(advisory) = self.run_hook(hook.as_ref(), server, &backup.uuid) {
                result.advisories.push(advisory);
            }
        }

        transition(state, WorkflowState::Done);
        self.sleeper.sleep(self.settings.create_interval);
        result
    }

    fn fail(&self, server: &Server, state: &mut WorkflowState, reason: String) -> ServerResult {
        error!("{}", reason);
        transition(state, WorkflowState::Failed(reason.clone()));
        self.sleeper.sleep(self.settings.failure_interval);
        ServerResult::failed(&server.id, reason)
    }

    /// Poll the backup until the panel reports it completed
    fn wait_for_completion(&self, server: &Server, uuid: &str) -> std::result::Result<(), String> {
        let mut waited = Duration::ZERO;

        loop {
            self.sleeper.sleep(self.settings.poll_interval);
            waited += self.settings.poll_interval;

            match self.api.get_backup(&server.id, uuid) {
                Ok(backup) if backup.is_completed() => {
                    info!(backup = uuid, waited_secs = waited.as_secs(), "Backup completed");
                    return Ok(());
                }
                Ok(_) => debug!(backup = uuid, waited_secs = waited.as_secs(), "Backup still in progress"),
                Err(e) => return Err(format!("failed to poll backup {}: {}", uuid, e)),
            }

            if let Some(timeout) = self.settings.poll_timeout {
                if waited >= timeout {
                    return Err(format!(
                        "backup {} did not complete within {}s",
                        uuid,
                        timeout.as_secs()
                    ));
                }
            }
        }
    }

    /// Run the hook; failures are advisory only
    fn run_hook(&self, hook: &dyn HookRunner, server: &Server, backup_id: &str) -> Option<Advisory> {
        match hook.run(&server.id, backup_id) {
            Ok(0) => {
                info!(backup = backup_id, "Post-backup hook succeeded");
                None
            }
            Ok(code) => {
                error!(backup = backup_id, exit_code = code, "Post-backup hook exited with non-zero status");
                Some(Advisory::HookFailure {
                    backup_id: backup_id.to_string(),
                    detail: format!("exit status {}", code),
                })
            }
            Err(e) => {
                error!(backup = backup_id, error = %e, "Post-backup hook could not be run");
                Some(Advisory::HookFailure {
                    backup_id: backup_id.to_string(),
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Rotation decisions for every server without changing anything
    pub fn plan(&self) -> std::result::Result<Vec<ServerPlan>, ApiError> {
        let servers = self.api.list_servers()?;

        Ok(servers
            .into_iter()
            .map(|server| {
                let rotation = self.api.list_backups(&server.id).map(|mut backups| {
                    sort_by_age(&mut backups);
                    RotationPlan {
                        existing: backups.len(),
                        decision: rotation::decide(&backups, server.backup_limit),
                    }
                });
                ServerPlan { server, rotation }
            })
            .collect())
    }
}
