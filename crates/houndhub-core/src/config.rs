//! HoundHub configuration system.
//!
//! Configuration is an explicit object loaded once at startup and passed into
//! handlers — there is no process-wide settings cache. Reloading means calling
//! `load` again and rebuilding the context.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{HoundHubError, Result};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoundHubConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Business name substituted into email templates.
    #[serde(default = "default_business_name")]
    pub business_name: String,
    /// Base URL of the client portal, used to build attachment links.
    #[serde(default = "default_portal_url")]
    pub portal_base_url: String,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub reminders: ReminderConfig,
}

fn default_database_path() -> String {
    HoundHubConfig::home_dir()
        .join("houndhub.db")
        .to_string_lossy()
        .to_string()
}
fn default_business_name() -> String {
    "HoundHub Dog Training".into()
}
fn default_portal_url() -> String {
    "https://portal.houndhub.example".into()
}

impl Default for HoundHubConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            business_name: default_business_name(),
            portal_base_url: default_portal_url(),
            smtp: SmtpConfig::default(),
            reminders: ReminderConfig::default(),
        }
    }
}

impl HoundHubConfig {
    /// Load config from the default path (~/.houndhub/config.toml).
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| HoundHubError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| HoundHubError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| HoundHubError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        Self::home_dir().join("config.toml")
    }

    /// Get the HoundHub home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".houndhub")
    }
}

/// Outbound SMTP configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    /// When disabled, ticks log outbound mail instead of sending it.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_smtp_host")]
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    /// From address on every outbound email.
    #[serde(default)]
    pub from_address: String,
    #[serde(default = "default_from_name")]
    pub from_name: String,
    /// Hard cap on a single send, so a hanging relay cannot stall a tick.
    #[serde(default = "default_send_timeout")]
    pub send_timeout_secs: u64,
}

fn default_smtp_host() -> String {
    "smtp.gmail.com".into()
}
fn default_smtp_port() -> u16 {
    587
}
fn default_from_name() -> String {
    "HoundHub".into()
}
fn default_send_timeout() -> u64 {
    30
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_smtp_host(),
            port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from_address: String::new(),
            from_name: default_from_name(),
            send_timeout_secs: default_send_timeout(),
        }
    }
}

/// Booking reminder sweep configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// How far ahead of a booking's start the reminder goes out.
    #[serde(default = "default_lead_hours")]
    pub lead_hours: i64,
}

fn default_lead_hours() -> i64 {
    24
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            lead_hours: default_lead_hours(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = HoundHubConfig::default();
        assert!(!config.smtp.enabled);
        assert_eq!(config.smtp.port, 587);
        assert_eq!(config.reminders.lead_hours, 24);
    }

    #[test]
    fn test_partial_toml() {
        let config: HoundHubConfig = toml::from_str(
            r#"
            business_name = "Canine Campus"

            [smtp]
            enabled = true
            host = "mail.example.com"
            "#,
        )
        .unwrap();
        assert_eq!(config.business_name, "Canine Campus");
        assert!(config.smtp.enabled);
        assert_eq!(config.smtp.host, "mail.example.com");
        assert_eq!(config.smtp.port, 587);
    }
}
