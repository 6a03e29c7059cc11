//! Post-backup hook abstraction
//!
//! The hook is an external executable invoked with two positional arguments:
//! the server identifier and the backup uuid. Its exit status is advisory.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// Abstraction for running the post-backup hook, enabling mocking in tests
pub trait HookRunner: Send + Sync {
    /// Run the hook and return its exit code
    fn run(&self, server_id: &str, backup_id: &str) -> Result<i32>;
}

/// Runs a script from disk
#[derive(Debug, Clone)]
pub struct ScriptHookRunner {
    script: PathBuf,
    timeout: Option<Duration>,
}

impl ScriptHookRunner {
    pub fn new(script: PathBuf, timeout: Option<Duration>) -> Self {
        Self { script, timeout }
    }
}

impl HookRunner for ScriptHookRunner {
    fn run(&self, server_id: &str, backup_id: &str) -> Result<i32> {
        info!(
            script = %self.script.display(),
            server = server_id,
            backup = backup_id,
            "Running post-backup hook"
        );

        let output = super::command::run_command(&self.script, &[server_id, backup_id], self.timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                warn!("Hook stderr: {}", stderr.trim_end());
            }
        }

        // A signal-terminated child has no code; report it as a generic failure
        Ok(output.status.code().unwrap_or(-1))
    }
}

/// Mock hook runner for testing
/// Available for use in external test crates
#[allow(dead_code)]
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Recorded hook invocation
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct HookCall {
        pub server_id: String,
        pub backup_id: String,
    }

    #[derive(Clone, Default)]
    pub struct MockHookRunner {
        pub calls: Arc<Mutex<Vec<HookCall>>>,
        exit_code: Arc<Mutex<i32>>,
        spawn_error: Arc<Mutex<Option<String>>>,
    }

    impl MockHookRunner {
        pub fn new() -> Self {
            Self::default()
        }

        /// Configure the exit code returned by every run
        pub fn with_exit_code(self, code: i32) -> Self {
            *self.exit_code.lock().unwrap() = code;
            self
        }

        /// Configure the hook to fail before producing an exit code
        pub fn with_spawn_error(self, message: &str) -> Self {
            *self.spawn_error.lock().unwrap() = Some(message.to_string());
            self
        }

        pub fn get_calls(&self) -> Vec<HookCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl HookRunner for MockHookRunner {
        fn run(&self, server_id: &str, backup_id: &str) -> Result<i32> {
            self.calls.lock().unwrap().push(HookCall {
                server_id: server_id.to_string(),
                backup_id: backup_id.to_string(),
            });
            if let Some(ref message) = *self.spawn_error.lock().unwrap() {
                anyhow::bail!("{}", message);
            }
            Ok(*self.exit_code.lock().unwrap())
        }
    }
}
