//! Run outcome aggregation and failure reporting

use crate::config::NotificationConfig;
use crate::managers::notification::Notifier;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Final state of one server in a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerOutcome {
    Success,
    Failed { reason: String },
}

impl ServerOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ServerOutcome::Success)
    }
}

/// Non-fatal conditions recorded against a server
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Advisory {
    #[error("{shortfall} backup(s) over quota could not be deleted because they are locked")]
    PolicyShortfall { shortfall: u32 },

    #[error("failed to delete backup {uuid}: {reason}")]
    DeleteFailed { uuid: String, reason: String },

    #[error("post-backup hook for backup {backup_id} failed: {detail}")]
    HookFailure { backup_id: String, detail: String },
}

/// Outcome of one server together with its advisories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerResult {
    pub server_id: String,
    pub outcome: ServerOutcome,
    pub advisories: Vec<Advisory>,
}

impl ServerResult {
    pub fn success(server_id: &str) -> Self {
        Self {
            server_id: server_id.to_string(),
            outcome: ServerOutcome::Success,
            advisories: Vec::new(),
        }
    }

    pub fn failed(server_id: &str, reason: impl Into<String>) -> Self {
        Self {
            server_id: server_id.to_string(),
            outcome: ServerOutcome::Failed {
                reason: reason.into(),
            },
            advisories: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub failed_ids: BTreeSet<String>,
    pub all_succeeded: bool,
}

pub fn summarize(results: &[ServerResult]) -> RunSummary {
    let failed_ids: BTreeSet<String> = results
        .iter()
        .filter(|r| !r.outcome.is_success())
        .map(|r| r.server_id.clone())
        .collect();

    RunSummary {
        all_succeeded: failed_ids.is_empty(),
        failed_ids,
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Completed {
        results: Vec<ServerResult>,
        summary: RunSummary,
    },
    /// The run could not start processing servers
    Fatal { reason: String },
}

impl RunStatus {
    /// Process exit code: 0 success, 1 server failures, 2 fatal
    pub fn exit_code(&self) -> u8 {
        match self {
            RunStatus::Completed { summary, .. } if summary.all_succeeded => 0,
            RunStatus::Completed { .. } => 1,
            RunStatus::Fatal { .. } => 2,
        }
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        match self {
            RunStatus::Completed { summary, .. } => Some(summary),
            RunStatus::Fatal { .. } => None,
        }
    }
}

/// Turns results into a [`RunStatus`] and sends at most one notification
pub struct RunReport {
    notifier: Option<Arc<dyn Notifier>>,
    subject: String,
    body: String,
}

impl RunReport {
    pub fn new(notifier: Option<Arc<dyn Notifier>>, config: &NotificationConfig) -> Self {
        Self {
            notifier,
            subject: config.subject.clone(),
            body: config.body.clone(),
        }
    }

    /// Summarize a completed run, notifying once if anything failed
    pub fn finish(&self, results: Vec<ServerResult>) -> RunStatus {
        let summary = summarize(&results);
        let advisories: usize = results.iter().map(|r| r.advisories.len()).sum();

        if summary.all_succeeded {
            info!(
                servers = results.len(),
                advisories, "All server backups completed successfully"
            );
        } else {
            let failed: Vec<&str> = summary.failed_ids.iter().map(String::as_str).collect();
            error!(
                servers = results.len(),
                failed = failed.len(),
                advisories,
                "Backups failed for servers: {}",
                failed.join(", ")
            );
            self.send(&failure_details(&results));
        }

        RunStatus::Completed { results, summary }
    }

    /// Record a fatal pre-loop error, notifying once
    pub fn fatal(&self, reason: impl Into<String>) -> RunStatus {
        let reason = reason.into();
        error!("Backup run aborted: {}", reason);
        self.send(&format!("Backup run aborted: {}", reason));
        RunStatus::Fatal { reason }
    }

    fn send(&self, details: &str) {
        let Some(ref notifier) = self.notifier else {
            return;
        };
        let body = format!("{}\n\n{}", self.body.trim_end(), details);
        if let Err(e) = notifier.notify(&self.subject, &body) {
            warn!("Failed to send failure notification: {}", e);
        }
    }
}

fn failure_details(results: &[ServerResult]) -> String {
    results
        .iter()
        .filter_map(|r| match r.outcome {
            ServerOutcome::Failed { ref reason } => Some(format!("{}: {}", r.server_id, reason)),
            ServerOutcome::Success => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}
