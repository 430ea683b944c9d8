//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development. The backend URL, its public key and the
//! application base URL are required; without them the service refuses to start.

use std::collections::HashMap;
use std::net::SocketAddr;

use course_ratings_core::LogMode;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub log_mode: LogMode,
    /// Base URL of the hosted backend, e.g. `https://xyz.supabase.co`.
    pub supabase_url: String,
    pub supabase_anon_key: String,
    /// Public base URL of this application; magic links redirect here.
    pub app_url: String,
    pub cors_origin: String,
    /// Shared counter store. Without it the limiter is process-local.
    pub redis_url: Option<String>,
    pub run_migrations: bool,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_vars(&std::env::vars().collect())
    }

    /// Builds the configuration from an explicit variable map.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let optional = |name: &str| vars.get(name).filter(|v| !v.trim().is_empty()).cloned();
        let required =
            |name: &str| optional(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()));

        // --- Server ---
        let bind_address_str = optional("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = optional("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let log_mode = match optional("APP_ENV") {
            Some(env) => env
                .parse::<LogMode>()
                .map_err(|e| ConfigError::InvalidValue("APP_ENV".to_string(), e))?,
            None => LogMode::Development,
        };

        // --- Hosted backend ---
        let database_url = required("DATABASE_URL")?;
        let supabase_url = required("SUPABASE_URL")?.trim_end_matches('/').to_string();
        let supabase_anon_key = required("SUPABASE_ANON_KEY")?;
        let app_url = required("APP_URL")?.trim_end_matches('/').to_string();
        let cors_origin = optional("CORS_ORIGIN").unwrap_or_else(|| app_url.clone());

        // --- Optional infrastructure ---
        let redis_url = optional("REDIS_URL");
        let run_migrations = match optional("RUN_MIGRATIONS").as_deref() {
            None => false,
            Some("true" | "1") => true,
            Some("false" | "0") => false,
            Some(other) => {
                return Err(ConfigError::InvalidValue(
                    "RUN_MIGRATIONS".to_string(),
                    format!("'{other}' is not a boolean"),
                ))
            }
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            log_mode,
            supabase_url,
            supabase_anon_key,
            app_url,
            cors_origin,
            redis_url,
            run_migrations,
        })
    }

    pub fn is_production(&self) -> bool {
        self.log_mode == LogMode::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [
            ("DATABASE_URL", "postgres://localhost/avalia"),
            ("SUPABASE_URL", "https://xyz.supabase.co/"),
            ("SUPABASE_ANON_KEY", "anon"),
            ("APP_URL", "https://avalia.example.com/"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_vars(&base_vars()).unwrap();
        assert_eq!(config.bind_address.to_string(), "0.0.0.0:3000");
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.log_mode, LogMode::Development);
        assert_eq!(config.supabase_url, "https://xyz.supabase.co");
        assert_eq!(config.app_url, "https://avalia.example.com");
        assert_eq!(config.cors_origin, "https://avalia.example.com");
        assert!(config.redis_url.is_none());
        assert!(!config.run_migrations);
    }

    #[test]
    fn each_backend_variable_is_required() {
        for name in ["DATABASE_URL", "SUPABASE_URL", "SUPABASE_ANON_KEY", "APP_URL"] {
            let mut vars = base_vars();
            vars.remove(name);
            let err = Config::from_vars(&vars).unwrap_err();
            assert!(matches!(err, ConfigError::MissingVar(ref v) if v == name));
        }
    }

    #[test]
    fn invalid_values_are_reported() {
        let mut vars = base_vars();
        vars.insert("APP_ENV".into(), "staging".into());
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidValue(ref v, _)) if v == "APP_ENV"
        ));

        let mut vars = base_vars();
        vars.insert("RUN_MIGRATIONS".into(), "maybe".into());
        assert!(Config::from_vars(&vars).is_err());
    }

    #[test]
    fn production_mode_is_detected() {
        let mut vars = base_vars();
        vars.insert("APP_ENV".into(), "production".into());
        vars.insert("REDIS_URL".into(), "redis://cache:6379".into());
        let config = Config::from_vars(&vars).unwrap();
        assert!(config.is_production());
        assert_eq!(config.redis_url.as_deref(), Some("redis://cache:6379"));
    }
}
