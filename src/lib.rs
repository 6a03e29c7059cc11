//! Ptero Backup Library
//!
//! Backup lifecycle automation for servers managed through a Pterodactyl-style
//! panel API: rotation under quota, creation, completion polling and
//! post-backup hooks, with a single failure notification per run.

pub mod api;
pub mod config;
pub mod managers;
pub mod utils;

// Re-export commonly used types
pub use api::{ApiError, Backup, PagedApiClient, PanelApi, Server};
pub use config::{load_config, parse_config, validate_config, Config};
pub use managers::backup::{BackupManager, WorkflowSettings, WorkflowState};
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::notification::{Notifier, WebhookNotifier};
pub use managers::report::{RunReport, RunStatus, ServerOutcome, ServerResult};
pub use managers::rotation::{decide, RetentionDecision};
