//! MS SQL Server driver implementation

use crate::connection::MssqlConnection;
use async_trait::async_trait;
use finimpact_core::{Connection, ConnectionConfig, DatabaseDriver, Result};
use std::sync::Arc;

/// Port SQL Server listens on unless configured otherwise
const DEFAULT_PORT: u16 = 1433;

/// MS SQL Server database driver
pub struct MssqlDriver;

impl MssqlDriver {
    /// Create a new MS SQL Server driver instance
    pub fn new() -> Self {
        tracing::debug!("MS SQL Server driver initialized");
        Self
    }
}

impl Default for MssqlDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DatabaseDriver for MssqlDriver {
    fn name(&self) -> &'static str {
        "mssql"
    }

    fn display_name(&self) -> &'static str {
        "MS SQL Server"
    }

    fn default_port(&self) -> Option<u16> {
        Some(DEFAULT_PORT)
    }

    #[tracing::instrument(skip(self, config), fields(host = config.get_string("host").as_deref(), database = config.get_string("database").as_deref()))]
    async fn connect(&self, config: &ConnectionConfig) -> Result<Arc<dyn Connection>> {
        tracing::debug!("connecting to MS SQL Server");
        let connection = MssqlConnection::from_config(config).await?;
        Ok(Arc::new(connection))
    }

    /// Connection string for display; the password is never included
    fn build_connection_string(&self, config: &ConnectionConfig) -> String {
        let host = config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string());
        let port = if config.port > 0 {
            config.port
        } else {
            DEFAULT_PORT
        };

        let mut conn_str = format!("Server={},{}", host, port);

        if let Some(db) = config.get_string("database") {
            conn_str.push_str(&format!(";Database={}", db));
        }
        if let Some(user) = config.get_string("username") {
            conn_str.push_str(&format!(";User Id={}", user));
        }
        if config.get_flag("trust_cert") {
            conn_str.push_str(";TrustServerCertificate=True");
        }

        conn_str
    }
}
