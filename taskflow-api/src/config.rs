//! Configuration management for the API server
//!
//! Configuration comes from environment variables, with a `.env` file loaded
//! first when present.
//!
//! # Environment Variables
//!
//! | variable | default | |
//! |---|---|---|
//! | `API_HOST` | `0.0.0.0` | bind host |
//! | `API_PORT` | `8080` | bind port |
//! | `DATABASE_URL` | required | PostgreSQL URL |
//! | `DATABASE_MAX_CONNECTIONS` | `10` | pool size |
//! | `RUN_MIGRATIONS` | `true` | apply migrations at startup |
//! | `JWT_SECRET` | required | HS256 secret, at least 32 characters |
//! | `CORS_ORIGINS` | `*` | comma-separated allowed origins |
//! | `APP_ENV` | `development` | `production` turns on HSTS |
//! | `RATE_LIMIT_PER_MINUTE` | `300` | per-IP budget for the API |
//! | `AUTH_RATE_LIMIT_PER_MINUTE` | `20` | per-IP budget for `/api/auth/*` |
//! | `LOG_FORMAT` | `pretty` | `pretty` or `json` |
//!
//! # Example
//!
//! ```no_run
//! use taskflow_api::config::Config;
//!
//! # fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! println!("Server will listen on {}", config.bind_address());
//! # Ok(())
//! # }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Minimum accepted `JWT_SECRET` length
pub const MIN_JWT_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (enables HSTS)
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Apply embedded migrations before serving
    pub run_migrations: bool,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,
}

/// Per-client-IP request budgets
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub requests_per_minute: u32,

    /// Tighter budget for register/login/refresh
    pub auth_requests_per_minute: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub format: LogFormat,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
        _ => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> anyhow::Result<bool> {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) if v.is_empty() => Ok(default),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(true),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(false),
        Some(v) => anyhow::bail!("{} must be a boolean, got '{}'", key, v),
    }
}

impl Config {
    /// Loads configuration from `.env` and the process environment
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value does
    /// not parse.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("API_HOST")
            .filter(|h| !h.trim().is_empty())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_var(&lookup, "API_PORT", 8080u16)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);

        let production = lookup("APP_ENV")
            .map(|env| env.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let database_url = lookup("DATABASE_URL")
            .filter(|u| !u.trim().is_empty())
            .context("DATABASE_URL environment variable is required")?;
        let max_connections = parse_var(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;
        let run_migrations = parse_bool(&lookup, "RUN_MIGRATIONS", true)?;

        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_JWT_SECRET_LENGTH {
            anyhow::bail!(
                "JWT_SECRET must be at least {} characters long",
                MIN_JWT_SECRET_LENGTH
            );
        }

        let requests_per_minute = parse_var(&lookup, "RATE_LIMIT_PER_MINUTE", 300u32)?;
        let auth_requests_per_minute = parse_var(&lookup, "AUTH_RATE_LIMIT_PER_MINUTE", 20u32)?;
        if requests_per_minute == 0 || auth_requests_per_minute == 0 {
            anyhow::bail!("Rate limits must be greater than zero");
        }

        let format = parse_var(&lookup, "LOG_FORMAT", LogFormat::Pretty)?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
                run_migrations,
            },
            jwt: JwtConfig { secret: jwt_secret },
            rate_limit: RateLimitConfig {
                requests_per_minute,
                auth_requests_per_minute,
            },
            logging: LoggingConfig { format },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// True when any origin is allowed
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.iter().any(|o| o == "*")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[
            ("DATABASE_URL", "postgresql://localhost/taskflow"),
            ("JWT_SECRET", SECRET),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.database.max_connections, 10);
        assert!(config.database.run_migrations);
        assert!(config.cors_allows_any());
        assert!(!config.api.production);
        assert_eq!(config.rate_limit.requests_per_minute, 300);
        assert_eq!(config.rate_limit.auth_requests_per_minute, 20);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "postgresql://db/taskflow"),
            ("JWT_SECRET", SECRET),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "3000"),
            ("CORS_ORIGINS", "https://app.example.com, https://admin.example.com"),
            ("APP_ENV", "Production"),
            ("RUN_MIGRATIONS", "false"),
            ("RATE_LIMIT_PER_MINUTE", "60"),
            ("LOG_FORMAT", "json"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(
            config.api.cors_origins,
            vec!["https://app.example.com", "https://admin.example.com"]
        );
        assert!(!config.cors_allows_any());
        assert!(config.api.production);
        assert!(!config.database.run_migrations);
        assert_eq!(config.rate_limit.requests_per_minute, 60);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_missing_required_vars() {
        let err = config_from(&[("JWT_SECRET", SECRET)]).unwrap_err();
        assert!(err.to_string().contains("DATABASE_URL"));

        let err = config_from(&[("DATABASE_URL", "postgresql://localhost/x")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = config_from(&[
            ("DATABASE_URL", "postgresql://localhost/x"),
            ("JWT_SECRET", "too-short"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("at least 32"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let base = [
            ("DATABASE_URL", "postgresql://localhost/x"),
            ("JWT_SECRET", SECRET),
        ];

        let mut vars = base.to_vec();
        vars.push(("API_PORT", "not-a-port"));
        assert!(config_from(&vars).unwrap_err().to_string().contains("API_PORT"));

        let mut vars = base.to_vec();
        vars.push(("RUN_MIGRATIONS", "maybe"));
        assert!(config_from(&vars).is_err());

        let mut vars = base.to_vec();
        vars.push(("LOG_FORMAT", "xml"));
        assert!(config_from(&vars).is_err());

        let mut vars = base.to_vec();
        vars.push(("AUTH_RATE_LIMIT_PER_MINUTE", "0"));
        assert!(config_from(&vars).is_err());
    }
}
