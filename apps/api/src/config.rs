//! # Server Configuration
//!
//! ## Load Order
//! ```text
//! defaults ──► TOML file ──► RECEETS_* environment ──► validate()
//!               │
//!               ├── $RECEETS_CONFIG, if set
//!               └── <platform config dir>/config.toml, if present
//! ```
//!
//! ## Example
//! ```toml
//! [server]
//! bind_addr = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! path = "/var/lib/receets/receets.db"
//! max_connections = 10
//!
//! [engine]
//! currency = "usd"
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use receets_db::DbConfig;
use receets_engine::EngineConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_addr: default_bind_addr(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file; created on first start.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> PathBuf {
    project_dirs()
        .map(|dirs| dirs.data_dir().join("receets.db"))
        .unwrap_or_else(|| PathBuf::from("receets.db"))
}

fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        DatabaseConfig {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.path).max_connections(self.max_connections)
    }
}

// =============================================================================
// API Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub engine: EngineConfig,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "Receets", "receets")
}

impl ApiConfig {
    /// Loads configuration from the file and environment of this process.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var_os("RECEETS_CONFIG")
            .map(PathBuf::from)
            .or_else(|| {
                project_dirs()
                    .map(|dirs| dirs.config_dir().join("config.toml"))
                    .filter(|path| path.exists())
            });

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Applies `RECEETS_*` overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("RECEETS_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(port) = lookup("RECEETS_PORT") {
            self.server.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: "RECEETS_PORT".to_string(),
                value: port,
            })?;
        }
        if let Some(path) = lookup("RECEETS_DB_PATH") {
            self.database.path = PathBuf::from(path);
        }
        if let Some(currency) = lookup("RECEETS_CURRENCY") {
            self.engine.currency = currency.to_lowercase();
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.socket_addr()?;
        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid(
                "database.max_connections must be > 0".to_string(),
            ));
        }
        self.engine
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = format!("{}:{}", self.server.bind_addr, self.server.port);
        addr.parse().map_err(|_| ConfigError::InvalidValue {
            key: "server.bind_addr".to_string(),
            value: addr,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        let config = ApiConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.currency, "usd");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ApiConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [engine]
            gateway_timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_addr, "0.0.0.0");
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.engine.gateway_timeout_secs, 10);
        assert_eq!(config.engine.default_return_period_days, 7);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("RECEETS_PORT", "7000"),
            ("RECEETS_DB_PATH", "/tmp/r.db"),
            ("RECEETS_CURRENCY", "EUR"),
        ]);
        let mut config = ApiConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 7000);
        assert_eq!(config.database.path, PathBuf::from("/tmp/r.db"));
        assert_eq!(config.engine.currency, "eur");

        let err = ApiConfig::default()
            .apply_env(|key| (key == "RECEETS_PORT").then(|| "http".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ApiConfig::default();
        config.server.bind_addr = "not an address".to_string();
        assert!(config.validate().is_err());

        let mut config = ApiConfig::default();
        config.engine.currency = "dollars".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
