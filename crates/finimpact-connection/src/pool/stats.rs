//! Pool statistics types

use serde::{Deserialize, Serialize};

/// Snapshot of a connection pool's state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    /// Configured capacity
    pub capacity: usize,
    /// Pooled connections currently in circulation (idle + checked out)
    pub pooled: usize,
    /// Connections waiting in the queue
    pub idle: usize,
    /// Handles currently held by callers, overflow included
    pub checked_out: usize,
    /// Overflow connections currently held by callers
    pub overflow_active: usize,
    /// Overflow connections opened since the pool was created
    pub overflow_total: u64,
    /// Connections opened through the factory since the pool was created
    pub connections_opened: u64,
    /// Callers currently waiting in `acquire`
    pub waiting: usize,
}

impl PoolStats {
    /// Fraction of pooled connections that are checked out (0.0 to 1.0)
    ///
    /// Returns 0.0 for an empty pool.
    pub fn utilization(&self) -> f64 {
        if self.pooled == 0 {
            0.0
        } else {
            let in_use = self.checked_out.saturating_sub(self.overflow_active);
            in_use as f64 / self.pooled as f64
        }
    }

    /// Check if every pooled connection is checked out
    pub fn is_full(&self) -> bool {
        self.idle == 0 && self.pooled > 0
    }
}
