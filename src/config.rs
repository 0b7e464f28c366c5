//! Configuration management

use anyhow::{self, Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// NATS server URL
    pub nats_url: String,

    /// Optional NATS credentials
    pub nats_user: Option<String>,
    pub nats_password: Option<String>,

    /// PostgreSQL connection string
    pub database_url: String,

    /// Upper bound for the connection pool
    pub database_max_connections: u32,

    /// JWT secret key for token validation
    pub jwt_secret: String,

    /// Directory for the rolling log files
    pub logs_dir: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present
        dotenvy::dotenv().ok();

        let nats_url = std::env::var("NATS_URL")
            .unwrap_or_else(|_| "nats://localhost:4222".to_string());

        let nats_user = std::env::var("NATS_USER").ok().filter(|u| !u.is_empty());
        let nats_password = std::env::var("NATS_PASSWORD").ok();

        let database_url = std::env::var("DATABASE_URL")
            .context("DATABASE_URL must be set")?;

        let database_max_connections = match std::env::var("DATABASE_MAX_CONNECTIONS") {
            Ok(raw) => raw
                .parse::<u32>()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS is not a number: {raw}"))?,
            Err(_) => 10,
        };

        let jwt_secret = std::env::var("JWT_SECRET")
            .context("JWT_SECRET must be set, generate one with: openssl rand -base64 48")?;

        if jwt_secret.len() < 32 {
            anyhow::bail!(
                "JWT_SECRET must be at least 32 bytes (current: {} bytes). Generate one with: openssl rand -base64 48",
                jwt_secret.len()
            );
        }

        let logs_dir = logs_dir_from_env();

        Ok(Self {
            nats_url,
            nats_user,
            nats_password,
            database_url,
            database_max_connections,
            jwt_secret,
            logs_dir,
        })
    }
}

/// Logs directory is needed before the rest of the config is loaded.
pub fn logs_dir_from_env() -> String {
    std::env::var("LOGS_DIR").unwrap_or_else(|_| "./logs".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "config-test-secret-that-is-long-enough-0123";

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_defaults() {
        std::env::remove_var("NATS_URL");
        std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", SECRET);

        let config = Config::from_env().unwrap();
        assert_eq!(config.nats_url, "nats://localhost:4222");
        assert_eq!(config.database_max_connections, 10);
    }

    #[test]
    #[ignore] // requires --test-threads=1 due to env var race
    fn test_config_rejects_short_secret() {
        std::env::set_var("DATABASE_URL", "postgres://test");
        std::env::set_var("JWT_SECRET", "short");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("at least 32 bytes"));

        std::env::set_var("JWT_SECRET", SECRET);
    }

    #[test]
    fn test_logs_dir_uses_env_when_set() {
        std::env::set_var("LOGS_DIR", "/var/log/multidrop");
        assert_eq!(logs_dir_from_env(), "/var/log/multidrop");
        std::env::remove_var("LOGS_DIR");
    }
}
