//! Connection pooling for database connections
//!
//! A fixed number of connections is opened eagerly by `initialize` and kept
//! in a FIFO queue. `acquire` waits a bounded time for one to come back and,
//! when the wait runs out, either opens a short-lived overflow connection or
//! fails, depending on the configured `ExhaustionPolicy`.
//!
//! # Example
//!
//! ```ignore
//! use finimpact_connection::pool::{ConnectionPool, PoolConfig};
//!
//! let config = PoolConfig::new(5).with_acquire_timeout_ms(5000);
//! let pool = ConnectionPool::new(config, connection_factory);
//! pool.initialize().await?;
//!
//! let conn = pool.acquire().await?;
//! conn.query("SELECT 1", &[]).await?;
//! // Connection returned to the pool on drop
//! ```

mod config;
mod pool;
mod stats;


pub use config::{ExhaustionPolicy, PoolConfig};
pub use pool::{ConnectionFactory, ConnectionOrigin, ConnectionPool, PooledConnection};
pub use stats::PoolStats;
