use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub api: ApiConfig,
    #[serde(default)]
    pub backup: BackupSettings,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Remote panel API settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// Endpoint listing every server visible to the API key
    pub servers_url: String,

    /// Base URL for per-server backup endpoints (`{backups_url}/{server}/backups`)
    pub backups_url: String,

    /// Bearer token. May be left empty and supplied through `PTERO_API_KEY`.
    #[serde(default)]
    pub api_key: String,

    /// Attempts per logical request before giving up
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Seconds multiplied by 2^(attempt-1) between attempts; 0 means 1
    #[serde(default = "default_backoff_factor")]
    pub retry_backoff_factor: f64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Backup workflow settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackupSettings {
    /// Delete old backups before creating a new one
    #[serde(default)]
    pub rotate: bool,

    /// Script run after each completed backup with `<server> <backup>` arguments
    #[serde(default)]
    pub post_backup_script: Option<PathBuf>,

    #[serde(default)]
    pub hook_timeout_seconds: Option<u64>,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_seconds: u64,

    /// Upper bound on the completion wait. Absent means wait indefinitely.
    #[serde(default)]
    pub poll_timeout_seconds: Option<u64>,

    #[serde(default = "default_create_interval")]
    pub create_interval_seconds: u64,

    #[serde(default = "default_failure_interval")]
    pub failure_interval_seconds: u64,

    #[serde(default = "default_delete_interval")]
    pub delete_interval_seconds: u64,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            rotate: false,
            post_backup_script: None,
            hook_timeout_seconds: None,
            poll_interval_seconds: default_poll_interval(),
            poll_timeout_seconds: None,
            create_interval_seconds: default_create_interval(),
            failure_interval_seconds: default_failure_interval(),
            delete_interval_seconds: default_delete_interval(),
        }
    }
}

/// Where failure notifications are delivered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannel {
    /// Discord-compatible webhook
    #[default]
    Webhook,
    /// Plain-text email over SMTP with STARTTLS
    Email,
}

/// Notification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotificationConfig {
    #[serde(default = "default_notifications_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub channel: NotificationChannel,

    #[serde(default)]
    pub webhook_url: String,

    #[serde(default = "default_subject")]
    pub subject: String,

    #[serde(default = "default_body")]
    pub body: String,

    /// Required when `channel = "email"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<EmailSettings>,
}

/// SMTP settings for the email channel
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub smtp_server: String,

    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    #[serde(default)]
    pub from_email: String,

    /// Login password for `from_email`; empty skips authentication.
    /// `PTERO_SMTP_PASSWORD` takes precedence.
    #[serde(default)]
    pub from_password: String,

    #[serde(default)]
    pub to_email: String,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            enabled: default_notifications_enabled(),
            channel: NotificationChannel::default(),
            webhook_url: String::new(),
            subject: default_subject(),
            body: default_body(),
            email: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingSettings {
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
        }
    }
}

// Default value functions

fn default_max_retries() -> u32 { 5 }
fn default_backoff_factor() -> f64 { 1.0 }
fn default_request_timeout() -> u64 { 30 }
fn default_poll_interval() -> u64 { 10 }
fn default_create_interval() -> u64 { 3 }
fn default_failure_interval() -> u64 { 30 }
fn default_delete_interval() -> u64 { 1 }
fn default_notifications_enabled() -> bool { true }
fn default_subject() -> String { "Server backup failure".to_string() }
fn default_body() -> String { "One or more server backups failed.".to_string() }
fn default_smtp_port() -> u16 { 587 }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 15 }
