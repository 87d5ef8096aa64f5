//! Common test utilities and mocks

#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use finimpact_connection::{
    ConnectionFactory, ConnectionPool, DatabaseSettings, DriverConnectionFactory, PoolConfig,
};
use finimpact_core::{
    ColumnMeta, Connection, QueryResult, Result, Row, StatementResult, Value,
};
use finimpact_drivers::DriverRegistry;
use finimpact_services::{
    AtributoImpacto, Impacto, Iniciativa, Multiplicador, NuevoUsuario, Rol, Services, Session,
    TipoImpacto, schema,
};
use rust_decimal::Decimal;
use tempfile::TempDir;

/// A SQLite database in a temporary directory with the schema applied
pub struct TestDb {
    pub pool: ConnectionPool,
    pub services: Services,
    _dir: TempDir,
}

impl TestDb {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("finimpact.db");
        let settings = DatabaseSettings::sqlite(path.to_string_lossy());
        let registry = DriverRegistry::with_defaults();
        let factory = DriverConnectionFactory::from_settings(&registry, &settings).unwrap();

        let pool = ConnectionPool::new(settings.pool_config(), factory);
        pool.initialize().await.unwrap();
        {
            let conn = pool.acquire().await.unwrap();
            schema::ensure_schema(&*conn).await.unwrap();
        }

        Self {
            services: Services::new(pool.clone()),
            pool,
            _dir: dir,
        }
    }

    pub async fn user(&self, nombre: &str, email: &str, rol: Rol) -> Session {
        let id = self
            .services
            .usuarios
            .save(&NuevoUsuario {
                nombre_completo: nombre.into(),
                email: email.into(),
                password: "secret123".into(),
                rol,
            })
            .await
            .unwrap();
        let usuario = self.services.usuarios.find_by_id(id).await.unwrap().unwrap();
        Session::new(usuario)
    }

    pub async fn iniciativa(&self, nombre: &str, id_owner: Option<i64>) -> i64 {
        let mut iniciativa = Iniciativa::nueva(nombre, "Operativa");
        iniciativa.id_owner = id_owner;
        self.services.iniciativas.save(&iniciativa).await.unwrap()
    }

    pub async fn impacto(
        &self,
        id_iniciativa: i64,
        tipo: TipoImpacto,
        atributo: AtributoImpacto,
        fecha: &str,
        amount: &str,
    ) -> i64 {
        let impacto = Impacto::nuevo(
            id_iniciativa,
            tipo,
            atributo,
            Multiplicador::Positivo,
            date(fecha),
            amount.parse::<Decimal>().unwrap(),
        );
        self.services.impactos.save(&impacto).await.unwrap()
    }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

/// Mock connection that records statements and answers with canned rows
pub struct MockConnection {
    pub query_result: QueryResult,
    pub query_log: Arc<parking_lot::Mutex<Vec<(String, Vec<Value>)>>>,
}

#[async_trait]
impl Connection for MockConnection {
    fn driver_name(&self) -> &str {
        "mock"
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.query_log.lock().push((sql.to_string(), params.to_vec()));
        Ok(StatementResult {
            affected_rows: 1,
            last_insert_id: Some(42),
        })
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.query_log.lock().push((sql.to_string(), params.to_vec()));
        Ok(self.query_result.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn is_closed(&self) -> bool {
        false
    }
}

/// Factory handing out [`MockConnection`]s that share one query log
pub struct MockFactory {
    pub query_result: QueryResult,
    pub query_log: Arc<parking_lot::Mutex<Vec<(String, Vec<Value>)>>>,
}

impl MockFactory {
    pub fn new(query_result: QueryResult) -> Self {
        Self {
            query_result,
            query_log: Arc::new(parking_lot::Mutex::new(Vec::new())),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.query_log.lock().iter().map(|(sql, _)| sql.clone()).collect()
    }

    pub fn params(&self) -> Vec<Vec<Value>> {
        self.query_log.lock().iter().map(|(_, p)| p.clone()).collect()
    }
}

#[async_trait]
impl ConnectionFactory for MockFactory {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        Ok(Arc::new(MockConnection {
            query_result: self.query_result.clone(),
            query_log: self.query_log.clone(),
        }))
    }
}

/// A pool of mock connections sharing `factory`'s query log
pub async fn mock_pool(factory: Arc<MockFactory>) -> ConnectionPool {
    let pool = ConnectionPool::with_factory(PoolConfig::new(2), factory);
    pool.initialize().await.unwrap();
    pool
}

/// Helper to create a QueryResult from column names and rows
pub fn mock_query_result(columns: Vec<&str>, rows: Vec<Vec<Value>>) -> QueryResult {
    let column_names: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    QueryResult {
        columns: columns
            .iter()
            .enumerate()
            .map(|(i, name)| ColumnMeta {
                name: name.to_string(),
                data_type: "TEXT".to_string(),
                nullable: true,
                ordinal: i,
            })
            .collect(),
        rows: rows
            .into_iter()
            .map(|values| Row::new(column_names.clone(), values))
            .collect(),
        ..QueryResult::empty()
    }
}
