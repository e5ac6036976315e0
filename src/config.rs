// ⚙️ Registry configuration - read once at startup from the environment
//
//   REGISTRY_DB_PATH            SQLite file; unset -> in-memory store
//   REGISTRY_UNIQUE_EMAIL       true/false (default true)
//   REGISTRY_DEFAULT_PAGE_SIZE  positive integer (default 10)

use crate::repository::DEFAULT_PAGE_SIZE;
use std::path::PathBuf;
use thiserror::Error;

pub const ENV_DB_PATH: &str = "REGISTRY_DB_PATH";
pub const ENV_UNIQUE_EMAIL: &str = "REGISTRY_UNIQUE_EMAIL";
pub const ENV_DEFAULT_PAGE_SIZE: &str = "REGISTRY_DEFAULT_PAGE_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Durable store location; `None` keeps everything in memory
    pub database_path: Option<PathBuf>,

    /// Enforce case-insensitive email uniqueness alongside tax ID
    pub unique_email: bool,

    /// Page size used when the caller doesn't give one
    pub default_page_size: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        RegistryConfig {
            database_path: None,
            unique_email: true,
            default_page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl RegistryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, test map, ...)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = RegistryConfig::default();

        let database_path = lookup(ENV_DB_PATH)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        let unique_email = match lookup(ENV_UNIQUE_EMAIL) {
            None => defaults.unique_email,
            Some(raw) => parse_bool(ENV_UNIQUE_EMAIL, &raw)?,
        };

        let default_page_size = match lookup(ENV_DEFAULT_PAGE_SIZE) {
            None => defaults.default_page_size,
            Some(raw) => match raw.trim().parse::<usize>() {
                Ok(size) if size > 0 => size,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: ENV_DEFAULT_PAGE_SIZE.to_string(),
                        message: format!("expected a positive integer, got '{raw}'"),
                    })
                }
            },
        };

        Ok(RegistryConfig {
            database_path,
            unique_email,
            default_page_size,
        })
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected true/false, got '{raw}'"),
        }),
    }
}
