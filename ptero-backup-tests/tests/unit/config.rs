//! Configuration loading through the builder

use ptero_backup::config::{
    load_config, parse_config, ConfigError, NotificationChannel, API_KEY_ENV, SMTP_PASSWORD_ENV,
};
use serial_test::serial;
use test_utils::ConfigBuilder;

#[test]
#[serial]
fn test_builder_config_round_trips_through_toml() {
    std::env::remove_var(API_KEY_ENV);
    let (path, _temp_dir) = ConfigBuilder::new().rotate(true).max_retries(3).write();

    let config = load_config(&path).unwrap();

    assert!(config.backup.rotate);
    assert_eq!(config.api.max_retries, 3);
    assert_eq!(config.api.api_key, "ptlc_test_key");
}

#[test]
#[serial]
fn test_env_key_fills_missing_key() {
    let (path, _temp_dir) = ConfigBuilder::new().api_key("").write();

    std::env::remove_var(API_KEY_ENV);
    assert!(matches!(
        load_config(&path),
        Err(ConfigError::MissingValue("api.api_key"))
    ));

    std::env::set_var(API_KEY_ENV, "ptlc_from_env");
    let config = load_config(&path);
    std::env::remove_var(API_KEY_ENV);

    assert_eq!(config.unwrap().api.api_key, "ptlc_from_env");
}

#[test]
#[serial]
fn test_parse_does_not_validate() {
    std::env::remove_var(API_KEY_ENV);
    let (path, _temp_dir) = ConfigBuilder::new().api_key("").webhook("https://hooks.test/x").write();

    let config = parse_config(&path).unwrap();

    assert!(config.api.api_key.is_empty());
    assert!(config.notifications.enabled);
}

#[test]
fn test_missing_hook_script_is_rejected() {
    let (mut config, _temp_dir) = ConfigBuilder::new().hook_script("exit 0").persist();
    config.backup.post_backup_script = Some("/nonexistent/hook.sh".into());

    assert!(ptero_backup::config::validate_config(&config).is_err());
}

#[test]
#[serial]
fn test_email_channel_round_trips_with_env_password() {
    std::env::remove_var(API_KEY_ENV);
    let (path, _temp_dir) = ConfigBuilder::new().email("smtp.panel.test", "ops@panel.test").write();

    std::env::set_var(SMTP_PASSWORD_ENV, "from-env");
    let config = load_config(&path);
    std::env::remove_var(SMTP_PASSWORD_ENV);

    let config = config.unwrap();
    assert_eq!(config.notifications.channel, NotificationChannel::Email);
    let email = config.notifications.email.unwrap();
    assert_eq!(email.smtp_server, "smtp.panel.test");
    assert_eq!(email.smtp_port, 587);
    assert_eq!(email.to_email, "ops@panel.test");
    assert_eq!(email.from_password, "from-env");
}

#[test]
#[serial]
fn test_email_channel_without_recipient_is_rejected() {
    std::env::remove_var(API_KEY_ENV);
    let (path, _temp_dir) = ConfigBuilder::new().email("smtp.panel.test", "").write();

    assert!(matches!(
        load_config(&path),
        Err(ConfigError::MissingValue("notifications.email.to_email"))
    ));
}
