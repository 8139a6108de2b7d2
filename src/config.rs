use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const DEFAULT_SETTLE_SECS: u64 = 5;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 5000;

/// The router has been observed to need slightly over three seconds before
/// a guest WiFi change shows up in its status.
pub const MIN_SETTLE_SECS: u64 = 3;

/// Settings as written in the TOML config file. Every field is optional;
/// missing values fall back to the environment, CLI flags, or defaults.
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub header_message: Option<String>,
    #[serde(default)]
    pub settle_secs: Option<u64>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub bind: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
}

impl FileConfig {
    /// Load the config file. A missing file at the default location is not
    /// an error, a missing file that was asked for explicitly is.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match config_path() {
                Some(p) if p.exists() => p,
                _ => return Ok(FileConfig::default()),
            },
        };

        let content = fs::read_to_string(&path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}

/// Values taken from CLI flags or their environment variables.
#[derive(Debug, Default)]
pub struct Overrides {
    pub address: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub base_url: Option<String>,
    pub header_message: Option<String>,
    pub settle_secs: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub bind: Option<String>,
    pub port: Option<u16>,
}

/// Address and login of the router. Immutable once built.
#[derive(Debug)]
pub struct RouterCredentials {
    pub address: String,
    pub user: String,
    pub password: SecretString,
}

impl RouterCredentials {
    pub fn new(address: &str, user: &str, password: &str) -> Result<Self, ConfigError> {
        let address = required("FRITZBOX_ADDRESS", Some(address.to_string()))?;
        let user = required("FRITZBOX_USER", Some(user.to_string()))?;
        let password = required("FRITZBOX_PASS", Some(password.to_string()))?;
        Ok(Self {
            address,
            user,
            password: SecretString::from(password),
        })
    }

    pub fn is_complete(&self) -> bool {
        !self.address.trim().is_empty()
            && !self.user.trim().is_empty()
            && !self.password.expose_secret().is_empty()
    }
}

#[derive(Debug)]
pub struct Settings {
    pub credentials: RouterCredentials,
    /// Redirect target after enable/disable.
    pub base_url: String,
    /// Banner shown on the index page.
    pub header_message: String,
    pub settle_time: Duration,
    pub request_timeout: Duration,
    pub bind: String,
    pub port: u16,
}

impl Settings {
    pub fn load(config_file: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = FileConfig::load(config_file)?;
        Self::resolve(file, overrides)
    }

    /// Merge file values with overrides. Overrides win.
    pub fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let address = required("FRITZBOX_ADDRESS", overrides.address.or(file.address))?;
        let user = required("FRITZBOX_USER", overrides.user.or(file.user))?;
        let password = required("FRITZBOX_PASS", overrides.password.or(file.password))?;

        let settle_secs = overrides
            .settle_secs
            .or(file.settle_secs)
            .unwrap_or(DEFAULT_SETTLE_SECS);
        if settle_secs <= MIN_SETTLE_SECS {
            tracing::warn!(
                "Settle time of {}s is not above the router's ~{}s status delay, re-reads may be stale",
                settle_secs,
                MIN_SETTLE_SECS
            );
        }

        Ok(Self {
            credentials: RouterCredentials {
                address,
                user,
                password: SecretString::from(password),
            },
            base_url: overrides
                .base_url
                .or(file.base_url)
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| "/".to_string()),
            header_message: overrides
                .header_message
                .or(file.header_message)
                .unwrap_or_default(),
            settle_time: Duration::from_secs(settle_secs),
            request_timeout: Duration::from_secs(
                overrides
                    .timeout_secs
                    .or(file.timeout_secs)
                    .unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
            bind: overrides
                .bind
                .or(file.bind)
                .unwrap_or_else(|| DEFAULT_BIND.to_string()),
            port: overrides.port.or(file.port).unwrap_or(DEFAULT_PORT),
        })
    }
}

fn required(name: &'static str, value: Option<String>) -> Result<String, ConfigError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ConfigError::Missing(name)),
    }
}

pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("guestwifi").join("config.toml"))
}
