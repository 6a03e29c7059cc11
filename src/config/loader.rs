use super::types::*;
use reqwest::Url;
use std::fs;
use std::path::Path;

/// Environment variable that overrides `api.api_key`
pub const API_KEY_ENV: &str = "PTERO_API_KEY";

/// Environment variable that overrides `notifications.email.from_password`
pub const SMTP_PASSWORD_ENV: &str = "PTERO_SMTP_PASSWORD";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("{0} is required but was not set")]
    MissingValue(&'static str),

    #[error("Invalid URL for {field}: {url}")]
    InvalidUrl { field: &'static str, url: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let config = parse_config(path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Read the TOML file and apply environment overrides without validating.
///
/// Kept separate from [`load_config`] so the caller can still build a
/// notifier from a config that fails validation.
pub fn parse_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    let mut config: Config = toml::from_str(&contents)?;
    apply_env_overrides(&mut config);
    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(key) = std::env::var(API_KEY_ENV) {
        if !key.trim().is_empty() {
            config.api.api_key = key.trim().to_string();
        }
    }

    if let Some(ref mut email) = config.notifications.email {
        if let Ok(password) = std::env::var(SMTP_PASSWORD_ENV) {
            if !password.is_empty() {
                email.from_password = password;
            }
        }
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_api(&config.api)?;
    validate_backup(&config.backup)?;

    validate_notifications(&config.notifications)?;

    Ok(())
}

fn validate_notifications(notifications: &NotificationConfig) -> Result<()> {
    if !notifications.enabled {
        return Ok(());
    }

    match notifications.channel {
        NotificationChannel::Webhook => {
            let url = &notifications.webhook_url;
            if url.trim().is_empty() {
                return Err(ConfigError::MissingValue("notifications.webhook_url"));
            }
            if Url::parse(url).is_err() {
                return Err(ConfigError::InvalidUrl {
                    field: "notifications.webhook_url",
                    url: url.clone(),
                });
            }
        }
        NotificationChannel::Email => {
            let email = notifications
                .email
                .as_ref()
                .ok_or(ConfigError::MissingValue("notifications.email"))?;
            validate_email(email)?;
        }
    }

    Ok(())
}

fn validate_email(email: &EmailSettings) -> Result<()> {
    let required = [
        ("notifications.email.smtp_server", &email.smtp_server),
        ("notifications.email.from_email", &email.from_email),
        ("notifications.email.to_email", &email.to_email),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingValue(field));
        }
    }

    if email.smtp_port == 0 {
        return Err(ConfigError::ValidationError(
            "notifications.email.smtp_port must be greater than zero".to_string(),
        ));
    }

    for (field, address) in [
        ("notifications.email.from_email", &email.from_email),
        ("notifications.email.to_email", &email.to_email),
    ] {
        if address.trim().parse::<lettre::Address>().is_err() {
            return Err(ConfigError::ValidationError(format!(
                "{} is not a valid email address: {}",
                field, address
            )));
        }
    }

    Ok(())
}

fn validate_api(api: &ApiConfig) -> Result<()> {
    if api.api_key.trim().is_empty() {
        return Err(ConfigError::MissingValue("api.api_key"));
    }

    for (field, url) in [("api.servers_url", &api.servers_url), ("api.backups_url", &api.backups_url)] {
        if url.trim().is_empty() {
            return Err(ConfigError::MissingValue(field));
        }
        if Url::parse(url).is_err() {
            return Err(ConfigError::InvalidUrl {
                field,
                url: url.clone(),
            });
        }
    }

    if api.max_retries == 0 {
        return Err(ConfigError::ValidationError(
            "api.max_retries must be at least 1".to_string(),
        ));
    }

    if !api.retry_backoff_factor.is_finite() || api.retry_backoff_factor < 0.0 {
        return Err(ConfigError::ValidationError(format!(
            "api.retry_backoff_factor must be a non-negative number, got {}",
            api.retry_backoff_factor
        )));
    }

    Ok(())
}

fn validate_backup(backup: &BackupSettings) -> Result<()> {
    if backup.poll_interval_seconds == 0 {
        return Err(ConfigError::ValidationError(
            "backup.poll_interval_seconds must be greater than zero".to_string(),
        ));
    }

    if let Some(ref script) = backup.post_backup_script {
        let script = super::expand_tilde(script);
        if !script.exists() {
            return Err(ConfigError::ValidationError(format!(
                "Post-backup script does not exist: {:?}",
                script
            )));
        }
    }

    Ok(())
}
