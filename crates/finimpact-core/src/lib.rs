//! FinImpact Core - shared abstractions for the data-access stack
//!
//! This crate provides the traits and types every other FinImpact crate
//! depends on:
//!
//! - `DatabaseDriver` - opens connections for a backend
//! - `Connection` - a live database connection
//! - `Value`, `Row`, `QueryResult` - backend-neutral result types
//! - `FinImpactError` - the error type shared by the data layer

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
