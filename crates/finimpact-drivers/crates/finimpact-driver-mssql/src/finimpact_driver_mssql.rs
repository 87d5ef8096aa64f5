//! MS SQL Server driver for FinImpact
//!
//! Connects over TCP with tiberius using SQL Server authentication. Queries
//! written with `?` placeholders are rewritten to T-SQL `@P1..@Pn` before
//! they are sent.

mod connection;
mod driver;

#[cfg(test)]
mod connection_tests;

pub use connection::{MssqlConnection, MssqlConnectionError, bind_placeholders};
pub use driver::MssqlDriver;
