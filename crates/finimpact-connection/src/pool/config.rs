//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What `acquire` does when no pooled connection frees up in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExhaustionPolicy {
    /// Open a temporary overflow connection that is closed on release
    #[default]
    Overflow,
    /// Return `FinImpactError::PoolExhausted`
    Fail,
}

/// Configuration for a connection pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Number of connections opened by `initialize`
    size: usize,
    /// Timeout in milliseconds when acquiring a connection from the pool
    acquire_timeout_ms: u64,
    /// Behaviour once the acquire timeout elapses
    on_exhaustion: ExhaustionPolicy,
}

impl PoolConfig {
    /// Create a new pool configuration with the given capacity
    ///
    /// # Panics
    ///
    /// Panics if `size` is 0.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "pool size must be greater than 0, got {}", size);

        Self {
            size,
            acquire_timeout_ms: 5_000,
            on_exhaustion: ExhaustionPolicy::Overflow,
        }
    }

    /// Set the acquire timeout in milliseconds
    pub fn with_acquire_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.acquire_timeout_ms = timeout_ms;
        self
    }

    /// Set the exhaustion policy
    pub fn with_exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.on_exhaustion = policy;
        self
    }

    /// Get the pool capacity
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the acquire timeout as a Duration
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Get the exhaustion policy
    pub fn exhaustion_policy(&self) -> ExhaustionPolicy {
        self.on_exhaustion
    }
}

impl Default for PoolConfig {
    /// Defaults: 5 connections, 5 second acquire timeout, overflow on exhaustion
    fn default() -> Self {
        Self::new(5)
    }
}
