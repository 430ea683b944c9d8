//! services/api/src/adapters/rate_limit.rs
//!
//! Redis-backed `RateLimiter`. Counters are shared by every instance of the
//! service and survive restarts, unlike the in-process limiter from the core.
//!
//! Each identifier maps to one key. The first hit of a window creates it with
//! a TTL equal to the window; increment and expiry run in a single script so
//! the window cannot be left without an expiry.

use std::time::Duration;

use async_trait::async_trait;
use course_ratings_core::ports::{PortError, PortResult, RateLimiter};
use course_ratings_core::rate_limit::{RATE_LIMIT_MAX, RATE_LIMIT_WINDOW};
use once_cell::sync::Lazy;
use redis::{aio::ConnectionManager, Client, Script};

const KEY_PREFIX: &str = "rate_limit:";

static INCREMENT_WINDOW: Lazy<Script> = Lazy::new(|| {
    Script::new(
        r"
        local current = redis.call('INCR', KEYS[1])
        if current == 1 then
            redis.call('PEXPIRE', KEYS[1], ARGV[1])
        end
        return current
        ",
    )
});

#[derive(Clone)]
pub struct RedisRateLimiter {
    connection: ConnectionManager,
    max_actions: u32,
    window: Duration,
}

impl RedisRateLimiter {
    /// Connects with the default limits of 10 actions per 60 seconds.
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(redis_url)?;
        let connection = client.get_connection_manager().await?;
        Ok(Self::with_limits(connection, RATE_LIMIT_MAX, RATE_LIMIT_WINDOW))
    }

    pub fn with_limits(connection: ConnectionManager, max_actions: u32, window: Duration) -> Self {
        Self {
            connection,
            max_actions,
            window,
        }
    }
}

fn counter_key(identifier: &str) -> String {
    format!("{KEY_PREFIX}{identifier}")
}

#[async_trait]
impl RateLimiter for RedisRateLimiter {
    async fn check(&self, identifier: &str) -> PortResult<bool> {
        let mut connection = self.connection.clone();
        let count: u64 = INCREMENT_WINDOW
            .key(counter_key(identifier))
            .arg(self.window.as_millis() as u64)
            .invoke_async(&mut connection)
            .await
            .map_err(|e| PortError::Unexpected(format!("rate limit store: {e}")))?;
        Ok(count <= u64::from(self.max_actions))
    }
}
