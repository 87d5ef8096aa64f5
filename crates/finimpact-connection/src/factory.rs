//! Connection factory backed by a registered database driver

use std::sync::Arc;

use async_trait::async_trait;
use finimpact_core::{Connection, ConnectionConfig, DatabaseDriver, FinImpactError, Result};
use finimpact_drivers::DriverRegistry;

use crate::DatabaseSettings;
use crate::pool::ConnectionFactory;

/// Opens pool connections through a `DatabaseDriver`
pub struct DriverConnectionFactory {
    driver: Arc<dyn DatabaseDriver>,
    config: ConnectionConfig,
}

impl DriverConnectionFactory {
    pub fn new(driver: Arc<dyn DatabaseDriver>, config: ConnectionConfig) -> Self {
        Self { driver, config }
    }

    /// Look up the driver named in the settings
    pub fn from_settings(registry: &DriverRegistry, settings: &DatabaseSettings) -> Result<Self> {
        let config = settings.connection_config();
        let driver = registry.get(&config.driver).ok_or_else(|| {
            FinImpactError::Configuration(format!(
                "unknown database driver '{}' (available: {})",
                config.driver,
                registry.list().join(", ")
            ))
        })?;
        Ok(Self::new(driver, config))
    }

    /// Connection string for logs and diagnostics
    pub fn describe(&self) -> String {
        self.driver.build_connection_string(&self.config)
    }
}

#[async_trait]
impl ConnectionFactory for DriverConnectionFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        tracing::debug!(driver = self.driver.name(), "opening database connection");
        self.driver.connect(&self.config).await
    }
}

impl std::fmt::Debug for DriverConnectionFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverConnectionFactory")
            .field("driver", &self.driver.name())
            .field("config", &self.config)
            .finish()
    }
}
