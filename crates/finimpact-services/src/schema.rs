//! Table definitions
//!
//! `ensure_schema` creates the `usuarios`, `iniciativas` and `impactos`
//! tables when they do not exist yet, using the dialect of the connection's
//! driver.

use finimpact_core::{Connection, FinImpactError, Result};

const SQLITE_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS usuarios (
        id_usuario INTEGER PRIMARY KEY AUTOINCREMENT,
        nombre_completo TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        rol TEXT NOT NULL CHECK (rol IN ('admin', 'analista', 'viewer')),
        estado INTEGER NOT NULL DEFAULT 1
    )",
    "CREATE TABLE IF NOT EXISTS iniciativas (
        id_iniciativa INTEGER PRIMARY KEY AUTOINCREMENT,
        nombre TEXT NOT NULL,
        descripcion TEXT,
        fecha_inicio DATE,
        fecha_fin DATE,
        tipo TEXT,
        estado TEXT NOT NULL DEFAULT 'planeado',
        riesgo TEXT NOT NULL DEFAULT 'medio',
        id_owner INTEGER REFERENCES usuarios (id_usuario),
        fecha_registro DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP
    )",
    "CREATE TABLE IF NOT EXISTS impactos (
        id_impacto INTEGER PRIMARY KEY AUTOINCREMENT,
        id_iniciativa INTEGER NOT NULL REFERENCES iniciativas (id_iniciativa) ON DELETE CASCADE,
        fecha_creacion DATE NOT NULL,
        tipo_impacto TEXT NOT NULL,
        multiplicador INTEGER NOT NULL CHECK (multiplicador IN (1, -1)),
        atributo_impacto TEXT NOT NULL,
        fecha_impacto DATE NOT NULL,
        impacto DECIMAL(15, 2) NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_iniciativas_owner ON iniciativas (id_owner)",
    "CREATE INDEX IF NOT EXISTS idx_impactos_iniciativa ON impactos (id_iniciativa)",
];

const MSSQL_SCHEMA: &[&str] = &[
    "IF OBJECT_ID(N'usuarios', N'U') IS NULL
    CREATE TABLE usuarios (
        id_usuario INT IDENTITY(1, 1) PRIMARY KEY,
        nombre_completo NVARCHAR(100) NOT NULL,
        email NVARCHAR(100) NOT NULL UNIQUE,
        password NVARCHAR(255) NOT NULL,
        rol NVARCHAR(20) NOT NULL CHECK (rol IN ('admin', 'analista', 'viewer')),
        estado BIT NOT NULL DEFAULT 1
    )",
    "IF OBJECT_ID(N'iniciativas', N'U') IS NULL
    CREATE TABLE iniciativas (
        id_iniciativa INT IDENTITY(1, 1) PRIMARY KEY,
        nombre NVARCHAR(200) NOT NULL,
        descripcion NVARCHAR(MAX),
        fecha_inicio DATE,
        fecha_fin DATE,
        tipo NVARCHAR(100),
        estado NVARCHAR(20) NOT NULL DEFAULT 'planeado',
        riesgo NVARCHAR(10) NOT NULL DEFAULT 'medio',
        id_owner INT REFERENCES usuarios (id_usuario),
        fecha_registro DATETIME NOT NULL DEFAULT GETDATE()
    )",
    "IF OBJECT_ID(N'impactos', N'U') IS NULL
    CREATE TABLE impactos (
        id_impacto INT IDENTITY(1, 1) PRIMARY KEY,
        id_iniciativa INT NOT NULL REFERENCES iniciativas (id_iniciativa) ON DELETE CASCADE,
        fecha_creacion DATE NOT NULL,
        tipo_impacto NVARCHAR(50) NOT NULL,
        multiplicador INT NOT NULL CHECK (multiplicador IN (1, -1)),
        atributo_impacto NVARCHAR(20) NOT NULL,
        fecha_impacto DATE NOT NULL,
        impacto DECIMAL(15, 2) NOT NULL
    )",
];

fn statements_for(driver: &str) -> Result<&'static [&'static str]> {
    match driver {
        "sqlite" => Ok(SQLITE_SCHEMA),
        "mssql" => Ok(MSSQL_SCHEMA),
        other => Err(FinImpactError::NotSupported(format!(
            "no schema definition for driver '{}'",
            other
        ))),
    }
}

/// Create any missing application tables
#[tracing::instrument(skip(conn), fields(driver = conn.driver_name()))]
pub async fn ensure_schema(conn: &dyn Connection) -> Result<()> {
    for statement in statements_for(conn.driver_name())? {
        conn.execute(statement, &[]).await?;
    }
    tracing::info!("database schema ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_driver_is_not_supported() {
        assert!(matches!(
            statements_for("oracle"),
            Err(FinImpactError::NotSupported(_))
        ));
    }

    #[test]
    fn test_every_dialect_defines_all_tables() {
        for driver in ["sqlite", "mssql"] {
            let ddl = statements_for(driver).unwrap().join("\n");
            for table in ["usuarios", "iniciativas", "impactos"] {
                assert!(
                    ddl.contains(&format!("CREATE TABLE {}", table))
                        || ddl.contains(&format!("CREATE TABLE IF NOT EXISTS {}", table)),
                    "{} is missing {}",
                    driver,
                    table
                );
            }
        }
    }
}
