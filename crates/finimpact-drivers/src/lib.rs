//! FinImpact Drivers - database driver implementations
//!
//! This crate collects the concrete drivers for the traits defined in
//! `finimpact-core` and provides the worker runtime used for background
//! data loads.

#[cfg(feature = "mssql")]
pub use finimpact_driver_mssql as mssql;
#[cfg(feature = "sqlite")]
pub use finimpact_driver_sqlite as sqlite;

mod registry;
mod runtime;

pub use registry::DriverRegistry;
pub use runtime::{DEFAULT_WORKER_THREADS, TaskRunner};

/// Re-export commonly used types from finimpact-core
pub use finimpact_core::{
    ColumnMeta, Connection, ConnectionConfig, DatabaseDriver, FinImpactError, QueryResult, Result,
    Row, StatementResult, Value,
};
