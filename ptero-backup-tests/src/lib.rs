//! Test utilities for ptero-backup
//!
//! Shared fixtures for panel JSON, a config builder and a harness that wires
//! [`ptero_backup::BackupManager`] to the crate's mock transport, sleeper,
//! hook runner and notifier.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{TestHarness, server};
//!
//! #[test]
//! fn my_test() {
//!     let harness = TestHarness::new().with_servers(vec![server("s1", "Survival", 3)]);
//!     harness.create_succeeds("s1", "b-new");
//!     let status = harness.run();
//!     assert_eq!(status.exit_code(), 0);
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod harness;

pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use harness::{TestHarness, BACKUPS_URL, SERVERS_URL};

// Re-export types from the main crate for convenience
pub use ptero_backup::api::{ApiError, Backup, PagedApiClient, PanelApi, RetryPolicy, Server};
pub use ptero_backup::config::{ApiConfig, BackupSettings, Config, NotificationConfig};
pub use ptero_backup::managers::backup::{BackupManager, WorkflowSettings};
pub use ptero_backup::managers::report::{Advisory, RunReport, RunStatus, ServerOutcome, ServerResult};

// Re-export mock implementations from the main crate
pub use ptero_backup::managers::notification::mock::{RecordingNotifier, SentNotification};
pub use ptero_backup::utils::hook::mock::{HookCall, MockHookRunner};
pub use ptero_backup::utils::http::mock::{MockReply, MockTransport};
pub use ptero_backup::utils::http::{Method, TransportError};
pub use ptero_backup::utils::sleeper::mock::RecordingSleeper;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
