//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use serde::Deserialize;
use std::net::Ipv4Addr;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0), // Bind to 0.0.0.0 for Docker
            port: 3000,
        }
    }
}

/// A named database the schema browser can point at
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub url: String,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub environments: Vec<EnvironmentConfig>,
    /// Name of the environment backing the schema graph
    pub active: String,
    pub max_pool_size: usize,
}

impl DatabaseConfig {
    pub fn active_environment(&self) -> Option<&EnvironmentConfig> {
        self.environments.iter().find(|e| e.name == self.active)
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.environments.iter().map(|e| e.name.clone()).collect()
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Schema graph cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// How long a captured graph is served, in minutes (0 disables caching)
    pub lifetime_minutes: u64,
}

impl CacheConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_minutes.saturating_mul(60))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            lifetime_minutes: 10,
        }
    }
}

/// Complete application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub cors: CorsConfig,
    pub cache: CacheConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();

        let server = ServerConfig {
            host: std::env::var("HOST")
                .ok()
                .and_then(|h| h.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().host),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or_else(|| ServerConfig::default().port),
        };

        // DATABASE_URLS (name=url;name=url) wins over a single DATABASE_URL
        let environments = if let Ok(urls) = std::env::var("DATABASE_URLS") {
            Self::parse_environments(&urls)?
        } else if let Ok(url) = std::env::var("DATABASE_URL") {
            vec![EnvironmentConfig {
                name: "default".to_string(),
                url,
            }]
        } else {
            return Err(ConfigError::MissingVar("DATABASE_URL".to_string()));
        };

        let database = Self::select_environment(
            environments,
            std::env::var("ACTIVE_ENVIRONMENT").ok(),
            std::env::var("DB_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
        )?;

        let cors = CorsConfig {
            allowed_origins: std::env::var("ALLOWED_ORIGINS")
                .ok()
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or_else(|| CorsConfig::default().allowed_origins),
        };

        let cache = match std::env::var("CACHE_TIME_MINS") {
            Ok(raw) => CacheConfig {
                lifetime_minutes: Self::parse_cache_minutes(&raw)?,
            },
            Err(_) => CacheConfig::default(),
        };

        Ok(Self {
            server,
            database,
            cors,
            cache,
        })
    }

    /// Parse `name=url;name=url` into named environments
    fn parse_environments(raw: &str) -> Result<Vec<EnvironmentConfig>, ConfigError> {
        let mut environments: Vec<EnvironmentConfig> = Vec::new();

        for entry in raw.split(';').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, url) = entry.split_once('=').ok_or_else(|| {
                ConfigError::InvalidValue(format!(
                    "DATABASE_URLS entry '{}' must look like name=postgres://...",
                    entry
                ))
            })?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "DATABASE_URLS entry has an empty name".to_string(),
                ));
            }
            if environments.iter().any(|e| e.name == name) {
                return Err(ConfigError::InvalidValue(format!(
                    "Environment '{}' is defined twice",
                    name
                )));
            }
            environments.push(EnvironmentConfig {
                name: name.to_string(),
                url: url.trim().to_string(),
            });
        }

        if environments.is_empty() {
            return Err(ConfigError::InvalidValue(
                "DATABASE_URLS does not define any environment".to_string(),
            ));
        }

        Ok(environments)
    }

    fn select_environment(
        environments: Vec<EnvironmentConfig>,
        active: Option<String>,
        max_pool_size: usize,
    ) -> Result<DatabaseConfig, ConfigError> {
        let active = match active {
            Some(name) if environments.iter().any(|e| e.name == name) => name,
            Some(name) => {
                return Err(ConfigError::InvalidValue(format!(
                    "ACTIVE_ENVIRONMENT '{}' is not one of the configured environments",
                    name
                )))
            }
            None => environments
                .first()
                .map(|e| e.name.clone())
                .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?,
        };

        Ok(DatabaseConfig {
            environments,
            active,
            max_pool_size,
        })
    }

    fn parse_cache_minutes(raw: &str) -> Result<u64, ConfigError> {
        raw.trim().parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(format!(
                "CACHE_TIME_MINS must be a whole number of minutes >= 0, got '{}'",
                raw
            ))
        })
    }
}
