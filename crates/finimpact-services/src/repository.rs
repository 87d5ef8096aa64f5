//! Data access for the application tables
//!
//! Every operation borrows one connection from the pool, runs a single
//! parameterized statement in autocommit mode and hands the connection back
//! when the handle drops.

mod impacto;
mod iniciativa;
mod usuario;

pub use impacto::{EstadisticaTipo, ImpactoRepository};
pub use iniciativa::IniciativaRepository;
pub use usuario::UsuarioRepository;

use finimpact_connection::ConnectionPool;
use finimpact_core::{FinImpactError, Result, StatementResult, Value};

use crate::rows::{FromRow, decode_all, decode_first};

async fn fetch_all<T: FromRow>(pool: &ConnectionPool, sql: &str, params: &[Value]) -> Result<Vec<T>> {
    let conn = pool.acquire().await?;
    let result = conn.query(sql, params).await?;
    decode_all(&result)
}

async fn fetch_one<T: FromRow>(
    pool: &ConnectionPool,
    sql: &str,
    params: &[Value],
) -> Result<Option<T>> {
    let conn = pool.acquire().await?;
    let result = conn.query(sql, params).await?;
    decode_first(&result)
}

async fn fetch_scalar(pool: &ConnectionPool, sql: &str, params: &[Value]) -> Result<Value> {
    let conn = pool.acquire().await?;
    let result = conn.query(sql, params).await?;
    Ok(result.scalar().cloned().unwrap_or(Value::Null))
}

async fn execute(pool: &ConnectionPool, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let conn = pool.acquire().await?;
    conn.execute(sql, params).await
}

/// Run an INSERT and return the generated key
async fn insert(pool: &ConnectionPool, sql: &str, params: &[Value]) -> Result<i64> {
    execute(pool, sql, params).await?.last_insert_id.ok_or_else(|| {
        FinImpactError::Query("insert did not report a generated id".to_string())
    })
}

/// `?, ?, ?` for an IN list of `n` values
fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}
