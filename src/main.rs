use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ptero_backup::config::{self, Config, NotificationChannel};
use ptero_backup::managers::backup::{BackupManager, RotationPlan, ServerPlan};
use ptero_backup::managers::logging::{self, LoggingConfig};
use ptero_backup::managers::notification::{self, Notifier};
use ptero_backup::managers::report::{RunReport, RunStatus, ServerOutcome};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;

/// Exit status for errors that stop the run before any server is processed
const FATAL_EXIT: u8 = 2;

#[derive(Parser)]
#[command(name = "ptero-backup")]
#[command(about = "Backup rotation and creation for Pterodactyl panel servers", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "/etc/ptero-backup/config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rotate and create backups for every server (default)
    Run,

    /// Show which backups rotation would delete, without changing anything
    Plan,

    /// List servers and their backup quotas
    Servers,

    /// Validate configuration file
    Validate,
}

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    match execute(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(FATAL_EXIT)
        }
    }
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let command = cli.command.unwrap_or(Commands::Run);

    let config = match config::parse_config(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            logging::init_console_logging();
            return Err(e).with_context(|| format!("Failed to load {}", cli.config.display()));
        }
    };

    if let Commands::Validate = command {
        return handle_validate(&config);
    }

    let notifier: Option<Arc<dyn Notifier>> = match notification::from_config(&config.notifications) {
        Ok(notifier) => notifier.map(Arc::from),
        Err(e) => {
            eprintln!("Warning: notifications unavailable: {}", e);
            None
        }
    };
    let report = RunReport::new(notifier, &config.notifications);

    if let Err(e) = config::validate_config(&config) {
        logging::init_console_logging();
        let status = report.fatal(format!("invalid configuration: {}", e));
        return Ok(ExitCode::from(status.exit_code()));
    }

    let _log_guard = logging::init_logging(&LoggingConfig::from_settings(&config.logging))?;

    let manager = match BackupManager::from_config(&config) {
        Ok(manager) => manager,
        Err(e) => {
            let status = report.fatal(format!("failed to initialise API client: {:#}", e));
            return Ok(ExitCode::from(status.exit_code()));
        }
    };

    match command {
        Commands::Run => handle_run(&manager, &report),
        Commands::Plan => handle_plan(&manager),
        Commands::Servers => handle_servers(&manager),
        Commands::Validate => handle_validate(&config),
    }
}

fn handle_validate(config: &Config) -> Result<ExitCode> {
    match config::validate_config(config) {
        Ok(()) => {
            println!("✓ Configuration is valid");
            println!("  Servers endpoint: {}", config.api.servers_url);
            println!("  Backups endpoint: {}", config.api.backups_url);
            println!("  Rotation: {}", if config.backup.rotate { "enabled" } else { "disabled" });
            match config.backup.post_backup_script {
                Some(ref script) => println!("  Post-backup hook: {}", script.display()),
                None => println!("  Post-backup hook: none"),
            }
            match (config.notifications.enabled, &config.notifications.email) {
                (false, _) => println!("  Notifications: disabled"),
                (true, Some(email)) if config.notifications.channel == NotificationChannel::Email => {
                    println!(
                        "  Notifications: email to {} via {}:{}",
                        notification::anonymize_email(&email.to_email),
                        email.smtp_server,
                        email.smtp_port
                    )
                }
                (true, _) => println!("  Notifications: webhook"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("✗ Configuration is invalid: {}", e);
            Ok(ExitCode::from(FATAL_EXIT))
        }
    }
}

fn handle_run(manager: &BackupManager, report: &RunReport) -> Result<ExitCode> {
    let status = manager.run(report);

    match status {
        RunStatus::Completed { ref results, ref summary } => {
            for result in results {
                match result.outcome {
                    ServerOutcome::Success => println!("✓ {}", result.server_id),
                    ServerOutcome::Failed { ref reason } => println!("✗ {}: {}", result.server_id, reason),
                }
                for advisory in &result.advisories {
                    println!("    ! {}", advisory);
                }
            }
            if summary.all_succeeded {
                println!("\nAll {} server(s) backed up successfully", results.len());
            } else {
                println!(
                    "\n{} of {} server(s) failed",
                    summary.failed_ids.len(),
                    results.len()
                );
            }
        }
        RunStatus::Fatal { ref reason } => {
            error!("Run aborted: {}", reason);
            eprintln!("✗ Run aborted: {}", reason);
        }
    }

    Ok(ExitCode::from(status.exit_code()))
}

fn handle_plan(manager: &BackupManager) -> Result<ExitCode> {
    let plans = manager.plan().context("Failed to list servers")?;
    let mut errors = 0;

    for ServerPlan { server, rotation } in plans {
        println!("{} ({}) quota {}", server.name, server.id, server.backup_limit);
        match rotation {
            Ok(RotationPlan { existing, decision }) => {
                println!("  Existing backups: {}", existing);
                if decision.is_noop() {
                    println!("  Nothing to delete");
                }
                for backup in &decision.to_delete {
                    println!(
                        "  Would delete: {} {} ({})",
                        backup.uuid,
                        backup.name,
                        backup.created_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
                if decision.shortfall > 0 {
                    println!("  Blocked by locked backups: {}", decision.shortfall);
                }
                if server.backup_limit == 0 {
                    println!("  Backups disabled, no new backup would be created");
                }
            }
            Err(e) => {
                errors += 1;
                println!("  ✗ Could not list backups: {}", e);
            }
        }
    }

    Ok(if errors == 0 { ExitCode::SUCCESS } else { ExitCode::from(1) })
}

fn handle_servers(manager: &BackupManager) -> Result<ExitCode> {
    let servers = manager.api().list_servers().context("Failed to list servers")?;

    println!("{:<12} {:<32} {:>6}", "ID", "NAME", "QUOTA");
    for server in &servers {
        println!("{:<12} {:<32} {:>6}", server.id, server.name, server.backup_limit);
    }
    println!("\n{} server(s)", servers.len());

    Ok(ExitCode::SUCCESS)
}
