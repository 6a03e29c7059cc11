//! Configuration module for ptero-backup
//!
//! This module handles loading and validating configuration from TOML files.
//! The API key may also come from the `PTERO_API_KEY` environment variable,
//! which takes precedence over the file, and the SMTP password from
//! `PTERO_SMTP_PASSWORD`.
//!
//! ## Example Usage
//!
//! ```no_run
//! use ptero_backup::config;
//!
//! let config = config::load_config("config.toml")?;
//! println!("Servers endpoint: {}", config.api.servers_url);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    load_config, parse_config, validate_config, ConfigError, Result, API_KEY_ENV, SMTP_PASSWORD_ENV,
};
pub use types::*;

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
