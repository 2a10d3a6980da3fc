//! Process configuration read once from the environment at startup.

use crate::error::{Result, VersaError};
use std::env;
use std::time::Duration;

/// Default provider base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.deepseek.com";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "deepseek-chat";
/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:versa.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmSettings,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Settings for the completion provider.
#[derive(Clone)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    /// Single-shot completions must finish within this; streams may run
    /// longer but fail after this much silence between chunks.
    pub timeout: Duration,
}

impl std::fmt::Debug for LlmSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Config {
    /// Read configuration from the process environment.
    ///
    /// Call `dotenvy::dotenv()` first to pick up a local `.env` file.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Config::default();

        let port = match get("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| VersaError::Config(format!("Invalid PORT value: {raw}")))?,
            None => defaults.server.port,
        };
        let timeout = match get("LLM_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(raw.trim().parse().map_err(|_| {
                VersaError::Config(format!("Invalid LLM_TIMEOUT_SECS value: {raw}"))
            })?),
            None => defaults.llm.timeout,
        };

        Ok(Config {
            server: ServerConfig {
                host: get("HOST").unwrap_or(defaults.server.host),
                port,
            },
            llm: LlmSettings {
                api_key: get("DEEPSEEK_API_KEY"),
                base_url: get("DEEPSEEK_BASE_URL").unwrap_or(defaults.llm.base_url),
                model: get("DEEPSEEK_MODEL").unwrap_or(defaults.llm.model),
                timeout,
            },
            database: DatabaseConfig {
                url: get("DATABASE_URL").unwrap_or(defaults.database.url),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8000,
            },
            llm: LlmSettings {
                api_key: None,
                base_url: DEFAULT_BASE_URL.to_string(),
                model: DEFAULT_MODEL.to_string(),
                timeout: Duration::from_secs(120),
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
            },
        }
    }
}
