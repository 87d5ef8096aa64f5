//! Database settings file
//!
//! The settings live in a TOML file with a `[database]` section describing
//! the server and an optional `[pool]` section:
//!
//! ```toml
//! [database]
//! driver = "mssql"
//! host = "localhost"
//! port = 1433
//! name = "finimpact"
//! username = "sa"
//! password = "..."
//! trust_cert = true
//!
//! [pool]
//! size = 5
//! acquire_timeout_ms = 5000
//! on_exhaustion = "overflow"
//! ```

use std::path::{Path, PathBuf};

use finimpact_core::{ConnectionConfig, FinImpactError, Result};
use serde::{Deserialize, Serialize};

use crate::pool::{ExhaustionPolicy, PoolConfig};

/// File name looked up in the platform config directory
pub const SETTINGS_FILE_NAME: &str = "finimpact.toml";

/// Environment variable that overrides the password from the file
const PASSWORD_ENV: &str = "FINIMPACT_DB_PASSWORD";

/// Settings loaded from the database settings file
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    pub database: DatabaseSection,
    #[serde(default)]
    pub pool: PoolSection,
}

/// The `[database]` table
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseSection {
    #[serde(default = "default_driver")]
    pub driver: String,
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 means the driver's default port
    #[serde(default)]
    pub port: u16,
    /// Database name, or file path for SQLite
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Accept the server certificate without validation
    #[serde(default)]
    pub trust_cert: bool,
}

/// The `[pool]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolSection {
    #[serde(default = "default_pool_size")]
    pub size: usize,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default)]
    pub on_exhaustion: ExhaustionPolicy,
}

fn default_driver() -> String {
    "mssql".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_pool_size() -> usize {
    5
}

fn default_acquire_timeout_ms() -> u64 {
    5_000
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            size: default_pool_size(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            on_exhaustion: ExhaustionPolicy::default(),
        }
    }
}

impl DatabaseSettings {
    /// Default location: `<config dir>/finimpact/finimpact.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("finimpact").join(SETTINGS_FILE_NAME))
    }

    /// Load settings from a file.
    ///
    /// A missing, unreadable or malformed file is a `Configuration` error:
    /// without it there is no way to reach the database.
    #[tracing::instrument]
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            FinImpactError::Configuration(format!(
                "cannot read database settings from {}: {}",
                path.display(),
                e
            ))
        })?;
        let mut settings = Self::from_toml_str(&content)?;

        if let Ok(password) = std::env::var(PASSWORD_ENV) {
            tracing::debug!("database password taken from {}", PASSWORD_ENV);
            settings.database.password = Some(password);
        }

        tracing::info!(
            driver = %settings.database.driver,
            host = %settings.database.host,
            database = %settings.database.name,
            "database settings loaded"
        );
        Ok(settings)
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let settings: Self = toml::from_str(content).map_err(|e| {
            FinImpactError::Configuration(format!("invalid database settings: {}", e))
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.database.name.trim().is_empty() {
            return Err(FinImpactError::Configuration(
                "database.name must not be empty".into(),
            ));
        }
        if self.pool.size == 0 {
            return Err(FinImpactError::Configuration(
                "pool.size must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Settings for a SQLite database file with default pool settings
    pub fn sqlite(path: impl Into<String>) -> Self {
        Self {
            database: DatabaseSection {
                driver: "sqlite".to_string(),
                host: String::new(),
                port: 0,
                name: path.into(),
                username: None,
                password: None,
                trust_cert: false,
            },
            pool: PoolSection::default(),
        }
    }

    /// The driver-level connection configuration
    pub fn connection_config(&self) -> ConnectionConfig {
        let db = &self.database;
        let mut config = ConnectionConfig::new(&db.driver);
        config.host = db.host.clone();
        config.port = db.port;
        config.database = Some(db.name.clone());
        config.username = db.username.clone();
        config.password = db.password.clone();
        if db.trust_cert {
            config = config.with_param("trust_cert", true);
        }
        config
    }

    /// The pool configuration
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig::new(self.pool.size)
            .with_acquire_timeout_ms(self.pool.acquire_timeout_ms)
            .with_exhaustion_policy(self.pool.on_exhaustion)
    }
}

impl std::fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("connection", &self.connection_config())
            .field("pool", &self.pool)
            .finish()
    }
}

impl std::fmt::Debug for DatabaseSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseSection")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("username", &self.username)
            .field("trust_cert", &self.trust_cert)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const FULL: &str = r#"
[database]
driver = "mssql"
host = "db.internal"
port = 1433
name = "finimpact"
username = "sa"
password = "secret"
trust_cert = true

[pool]
size = 8
acquire_timeout_ms = 2500
on_exhaustion = "fail"
"#;

    #[test]
    fn test_parse_full_file() {
        let settings = DatabaseSettings::from_toml_str(FULL).unwrap();
        assert_eq!(settings.database.host, "db.internal");
        assert_eq!(settings.pool.size, 8);

        let pool = settings.pool_config();
        assert_eq!(pool.size(), 8);
        assert_eq!(pool.acquire_timeout().as_millis(), 2500);
        assert_eq!(pool.exhaustion_policy(), ExhaustionPolicy::Fail);

        let conn = settings.connection_config();
        assert_eq!(conn.driver, "mssql");
        assert_eq!(conn.database.as_deref(), Some("finimpact"));
        assert!(conn.get_flag("trust_cert"));
    }

    #[test]
    fn test_defaults_apply() {
        let settings = DatabaseSettings::from_toml_str(
            r#"
[database]
name = "finimpact"
"#,
        )
        .unwrap();
        assert_eq!(settings.database.driver, "mssql");
        assert_eq!(settings.database.host, "localhost");
        assert_eq!(settings.pool.size, 5);
        assert_eq!(settings.pool.acquire_timeout_ms, 5_000);
        assert_eq!(settings.pool.on_exhaustion, ExhaustionPolicy::Overflow);
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatabaseSettings::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, FinImpactError::Configuration(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let err = DatabaseSettings::from_toml_str("[database\nname=").unwrap_err();
        assert!(matches!(err, FinImpactError::Configuration(_)));

        let err = DatabaseSettings::from_toml_str("[database]\nname = \"x\"\n[pool]\nsize = 0\n")
            .unwrap_err();
        assert!(matches!(err, FinImpactError::Configuration(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[database]\ndriver = \"sqlite\"\nname = \"/tmp/finimpact.db\"\n")
            .unwrap();

        let settings = DatabaseSettings::load(file.path()).unwrap();
        assert_eq!(settings.database.driver, "sqlite");
        assert_eq!(settings.database.name, "/tmp/finimpact.db");
    }

    #[test]
    fn test_debug_hides_password() {
        let settings = DatabaseSettings::from_toml_str(FULL).unwrap();
        assert!(!format!("{:?}", settings).contains("secret"));
    }
}
