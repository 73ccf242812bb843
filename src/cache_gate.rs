//! TTL gate deciding whether a board refresh should hit the database.
//!
//! The gate only decides. Callers perform the fetch and record a successful
//! one with [`RefreshGate::update_cache_timestamp`].

use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct RefreshGate {
    ttl: Duration,
    last_refresh: Option<Instant>,
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

impl RefreshGate {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            last_refresh: None,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True when forced, when no refresh has been recorded, or when at least
    /// `ttl` has elapsed since the last recorded one.
    pub fn should_refresh(&self, force: bool) -> bool {
        if force {
            return true;
        }
        let Some(last) = self.last_refresh else {
            return true;
        };
        let elapsed = last.elapsed();
        if elapsed >= self.ttl {
            return true;
        }
        debug!(
            elapsed_ms = elapsed.as_millis() as u64,
            remaining_ms = (self.ttl - elapsed).as_millis() as u64,
            "recently refreshed; skipping"
        );
        false
    }

    pub fn update_cache_timestamp(&mut self) {
        self.last_refresh = Some(Instant::now());
    }

    pub fn reset_cache(&mut self) {
        self.last_refresh = None;
    }
}
