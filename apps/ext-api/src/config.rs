//! Extension API configuration.
//!
//! Layered with the `config` crate:
//!
//! ```text
//! defaults ──► titan-ext.toml (optional) ──► TITAN_EXT_* environment
//! ```
//!
//! | Key               | Environment                  | Default                 |
//! |-------------------|------------------------------|-------------------------|
//! | `database_path`   | `TITAN_EXT_DATABASE_PATH`    | `./titan_ext.db`        |
//! | `bind_addr`       | `TITAN_EXT_BIND_ADDR`        | `0.0.0.0`               |
//! | `http_port`       | `TITAN_EXT_HTTP_PORT`        | `8090`                  |
//! | `jwt_secret`      | `TITAN_EXT_JWT_SECRET`       | development secret      |
//! | `jwt_lifetime_secs` | `TITAN_EXT_JWT_LIFETIME_SECS` | `3600`               |
//! | `max_connections` | `TITAN_EXT_MAX_CONNECTIONS`  | `5`                     |

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

const DEV_JWT_SECRET: &str = "titan-ext-dev-secret-change-in-production";

/// Extension API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtConfig {
    /// SQLite database file
    pub database_path: String,

    /// Address the HTTP server binds to
    pub bind_addr: String,

    /// HTTP server port
    pub http_port: u16,

    /// Secret for HS256 bearer tokens
    pub jwt_secret: String,

    /// Lifetime of issued tokens in seconds
    pub jwt_lifetime_secs: i64,

    /// SQLite pool size
    pub max_connections: u32,
}

impl ExtConfig {
    /// Loads defaults, then `titan-ext.toml` if present, then `TITAN_EXT_*`.
    pub fn load() -> Result<Self, ConfigError> {
        let config: ExtConfig = Config::builder()
            .set_default("database_path", "./titan_ext.db")?
            .set_default("bind_addr", "0.0.0.0")?
            .set_default("http_port", 8090)?
            .set_default("jwt_secret", DEV_JWT_SECRET)?
            .set_default("jwt_lifetime_secs", 3600)?
            .set_default("max_connections", 5)?
            .add_source(File::with_name("titan-ext").required(false))
            .add_source(Environment::with_prefix("TITAN_EXT"))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
        }
        if self.http_port == 0 {
            return Err(ConfigError::InvalidValue("http_port".to_string()));
        }
        if self.jwt_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("jwt_lifetime_secs".to_string()));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::InvalidValue("max_connections".to_string()));
        }
        Ok(())
    }

    /// `bind_addr:http_port`
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.http_port)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExtConfig {
        ExtConfig {
            database_path: ":memory:".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            http_port: 8090,
            jwt_secret: "secret".to_string(),
            jwt_lifetime_secs: 60,
            max_connections: 1,
        }
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());
        assert_eq!(sample().listen_addr(), "127.0.0.1:8090");

        let mut config = sample();
        config.jwt_secret = "  ".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::MissingRequired(_))));

        let mut config = sample();
        config.http_port = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidValue(_))));
    }
}
