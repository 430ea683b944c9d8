//! crates/course_ratings_core/src/service/mod.rs
//!
//! The data access layer. Composes validation, rate limiting and backend
//! queries into the named operations the web layer exposes. It owns no
//! entities and keeps no cache; callers re-fetch aggregates after a write.

mod associations;
mod catalog;
mod feedback;
mod writes;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::ports::{DatabaseService, PortError, RateLimiter};
use crate::validation::validate_uuid;

/// How much detail log events may carry.
///
/// Development logs include identifiers and full backend errors; production
/// logs keep only the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogMode {
    #[default]
    Development,
    Production,
}

impl FromStr for LogMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("'{other}' is not a valid environment")),
        }
    }
}

/// The application's entry point into the hosted backend.
#[derive(Clone)]
pub struct RatingsService {
    db: Arc<dyn DatabaseService>,
    limiter: Arc<dyn RateLimiter>,
    log_mode: LogMode,
}

impl RatingsService {
    pub fn new(
        db: Arc<dyn DatabaseService>,
        limiter: Arc<dyn RateLimiter>,
        log_mode: LogMode,
    ) -> Self {
        Self {
            db,
            limiter,
            log_mode,
        }
    }

    pub fn log_mode(&self) -> LogMode {
        self.log_mode
    }

    /// Fails with `RateLimited(message)` when `key` has used up its window.
    async fn enforce_rate_limit(&self, key: &str, message: &str) -> ServiceResult<()> {
        let allowed = self
            .limiter
            .check(key)
            .await
            .map_err(|e| self.backend_failure("Rate limit check failed", e))?;
        if allowed {
            return Ok(());
        }
        match self.log_mode {
            LogMode::Development => warn!(key, "Rate limit exceeded"),
            LogMode::Production => warn!("Rate limit exceeded"),
        }
        Err(ServiceError::RateLimited(message.to_string()))
    }

    /// Logs a backend failure at the detail the log mode allows and converts it.
    fn backend_failure(&self, message: &str, error: PortError) -> ServiceError {
        match self.log_mode {
            LogMode::Development => error!(error = ?error, "{message}"),
            LogMode::Production => error!("{message}"),
        }
        ServiceError::from(error)
    }

    fn log_event(&self, message: &str, detail: &dyn fmt::Debug) {
        match self.log_mode {
            LogMode::Development => info!(detail = ?detail, "{message}"),
            LogMode::Production => info!("{message}"),
        }
    }
}

/// Parses an id that must be in canonical hyphenated form.
fn parse_id(raw: &str, message: &str) -> ServiceResult<Uuid> {
    if !validate_uuid(raw) {
        return Err(ServiceError::validation(message));
    }
    Uuid::parse_str(raw).map_err(|_| ServiceError::validation(message))
}

/// Mean of a set of star values, `0.0` when empty.
fn average_stars(stars: &[u8]) -> f64 {
    if stars.is_empty() {
        return 0.0;
    }
    let sum: u32 = stars.iter().map(|&s| u32::from(s)).sum();
    f64::from(sum) / stars.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_of_empty_is_zero() {
        assert_eq!(average_stars(&[]), 0.0);
    }

    #[test]
    fn average_of_values() {
        assert_eq!(average_stars(&[5, 4, 3]), 4.0);
        assert_eq!(average_stars(&[1, 2]), 1.5);
    }

    #[test]
    fn parse_id_requires_canonical_form() {
        assert!(parse_id("123e4567-e89b-12d3-a456-426614174000", "bad").is_ok());
        let err = parse_id("123e4567e89b12d3a456426614174000", "bad").unwrap_err();
        assert!(matches!(err, ServiceError::Validation(m) if m == "bad"));
    }

    #[test]
    fn log_mode_parses_environment_names() {
        assert_eq!("production".parse::<LogMode>(), Ok(LogMode::Production));
        assert_eq!("Development".parse::<LogMode>(), Ok(LogMode::Development));
        assert!("staging".parse::<LogMode>().is_err());
    }
}
