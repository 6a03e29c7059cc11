//! Fluent API for building test configurations
//!
//! Defaults point at a fake panel, log into the builder's temp directory and
//! disable notifications.

use ptero_backup::config::{
    ApiConfig, BackupSettings, Config, EmailSettings, LoggingSettings, NotificationChannel,
    NotificationConfig,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use crate::harness::{BACKUPS_URL, SERVERS_URL};

pub struct ConfigBuilder {
    temp_dir: TempDir,
    api: ApiConfig,
    backup: BackupSettings,
    notifications: NotificationConfig,
    logging: LoggingSettings,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let log_directory = temp_dir.path().join("logs");
        fs::create_dir_all(&log_directory).expect("Failed to create log_directory");

        Self {
            api: ApiConfig {
                servers_url: SERVERS_URL.to_string(),
                backups_url: BACKUPS_URL.to_string(),
                api_key: "ptlc_test_key".to_string(),
                max_retries: 5,
                retry_backoff_factor: 1.0,
                request_timeout_seconds: 30,
            },
            backup: BackupSettings::default(),
            notifications: NotificationConfig {
                enabled: false,
                ..NotificationConfig::default()
            },
            logging: LoggingSettings {
                log_directory,
                log_level: "debug".to_string(),
                log_max_files: 5,
            },
            temp_dir,
        }
    }

    pub fn api_key(mut self, key: &str) -> Self {
        self.api.api_key = key.to_string();
        self
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.api.max_retries = max_retries;
        self
    }

    pub fn rotate(mut self, rotate: bool) -> Self {
        self.backup.rotate = rotate;
        self
    }

    /// Write an executable hook script into the temp dir and use it
    pub fn hook_script(mut self, body: &str) -> Self {
        let path = self.temp_dir.path().join("post-backup.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).expect("Failed to write hook script");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
                .expect("Failed to make hook script executable");
        }
        self.backup.post_backup_script = Some(path);
        self
    }

    pub fn webhook(mut self, url: &str) -> Self {
        self.notifications.enabled = true;
        self.notifications.webhook_url = url.to_string();
        self
    }

    /// Send notifications by email through `smtp_server` to `to_email`
    pub fn email(mut self, smtp_server: &str, to_email: &str) -> Self {
        self.notifications.enabled = true;
        self.notifications.channel = NotificationChannel::Email;
        self.notifications.email = Some(EmailSettings {
            smtp_server: smtp_server.to_string(),
            smtp_port: 587,
            from_email: "backups@panel.test".to_string(),
            from_password: String::new(),
            to_email: to_email.to_string(),
        });
        self
    }

    pub fn build(self) -> Config {
        self.persist().0
    }

    /// Build the config, keeping the temp dir alive for the caller
    pub fn persist(self) -> (Config, TempDir) {
        let config = Config {
            api: self.api,
            backup: self.backup,
            notifications: self.notifications,
            logging: self.logging,
        };
        (config, self.temp_dir)
    }

    /// Serialize the config to `config.toml` in the temp dir
    pub fn write(self) -> (PathBuf, TempDir) {
        let (config, temp_dir) = self.persist();
        let path = temp_dir.path().join("config.toml");
        let contents = toml::to_string_pretty(&config).expect("Failed to serialize config");
        fs::write(&path, contents).expect("Failed to write config");
        (path, temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
