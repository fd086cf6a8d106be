//! Configuration management for StockCloud
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with STOCKCLOUD__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;
use shared::BusinessClock;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    /// Server configuration
    pub server: ServerConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// Read-through cache configuration
    pub cache: CacheConfig,

    /// JWT authentication configuration
    pub jwt: JwtConfig,

    /// Business locale settings
    pub business: BusinessConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,

    /// Server host
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// Redis connection URL; the in-process cache is used when absent
    pub redis_url: Option<String>,

    /// Lifetime of every cached read model, in seconds
    pub ttl_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWT tokens
    pub secret: String,

    /// Access token expiration in seconds
    pub access_token_expiry: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessConfig {
    /// Offset from UTC of the store's local time, in whole hours
    pub utc_offset_hours: i32,
}

impl BusinessConfig {
    pub fn clock(&self) -> BusinessClock {
        BusinessClock::from_hours(self.utc_offset_hours).unwrap_or_default()
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment =
            std::env::var("STOCKCLOUD_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("cache.ttl_seconds", 3600)?
            .set_default("jwt.access_token_expiry", 28800)?
            .set_default("business.utc_offset_hours", -5)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (STOCKCLOUD__ prefix)
            .add_source(
                Environment::with_prefix("STOCKCLOUD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "test".to_string(),
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/stockcloud".to_string(),
                max_connections: 10,
                min_connections: 2,
            },
            cache: CacheConfig {
                redis_url: None,
                ttl_seconds: 3600,
            },
            jwt: JwtConfig {
                secret: "development-secret-key".to_string(),
                access_token_expiry: 28800,
            },
            business: BusinessConfig {
                utc_offset_hours: -5,
            },
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_default_clock_is_lima() {
        let clock = Config::default().business.clock();
        let instant = Utc.with_ymd_and_hms(2024, 5, 2, 2, 0, 0).unwrap();
        assert_eq!(clock.local_date(instant).to_string(), "2024-05-01");
    }

    #[test]
    fn test_out_of_range_offset_falls_back() {
        let business = BusinessConfig {
            utc_offset_hours: 40,
        };
        assert_eq!(business.clock(), BusinessClock::default());
    }
}
