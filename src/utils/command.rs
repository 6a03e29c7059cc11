//! Utilities for running external commands with optional timeouts

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use tracing::debug;

/// Run a program and collect its output, without judging the exit status.
///
/// With a timeout the child is driven on a throwaway current-thread tokio
/// runtime and killed when the deadline passes.
pub fn run_command(
    program: &Path,
    args: &[&str],
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    debug!("Running command: {} {}", program.display(), args.join(" "));

    let output = if let Some(timeout_duration) = timeout {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build runtime for command timeout")?;

        runtime.block_on(async {
            let mut command = tokio::process::Command::from(cmd);
            command.kill_on_drop(true);
            let result = tokio::time::timeout(timeout_duration, command.output()).await;

            match result {
                Ok(output) => output.context(format!("Failed to execute {}", program.display())),
                Err(_) => Err(anyhow::anyhow!("Command timed out after {:?}", timeout_duration)),
            }
        })?
    } else {
        cmd.output()
            .context(format!("Failed to execute {}", program.display()))?
    };

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim_end());
    }

    Ok(output)
}
