//! Database settings and connection pooling for FinImpact
//!
//! This crate turns a settings file into live connections:
//! - `DatabaseSettings` - the TOML file describing the server and the pool
//! - `DriverConnectionFactory` - opens connections through a registered driver
//! - `ConnectionPool` - fixed-capacity pool handing out `PooledConnection`s

mod config;
mod factory;
pub mod pool;

pub use config::{DatabaseSection, DatabaseSettings, PoolSection, SETTINGS_FILE_NAME};
pub use factory::DriverConnectionFactory;
pub use pool::{
    ConnectionFactory, ConnectionOrigin, ConnectionPool, ExhaustionPolicy, PoolConfig,
    PoolStats, PooledConnection,
};
