//! MS SQL Server connection implementation using tiberius

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use finimpact_core::{
    ColumnMeta, Connection, ConnectionConfig, FinImpactError, QueryResult, Result, Row,
    StatementResult, Value,
};
use std::sync::atomic::{AtomicBool, Ordering};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, Row as TiberiusRow};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

/// MS SQL Server connection errors
#[derive(Debug, thiserror::Error)]
pub enum MssqlConnectionError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Query execution failed: {0}")]
    QueryFailed(String),

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("Tiberius error: {0}")]
    Tiberius(#[from] tiberius::error::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MssqlConnectionError> for FinImpactError {
    fn from(err: MssqlConnectionError) -> Self {
        match err {
            MssqlConnectionError::ConnectionFailed(_)
            | MssqlConnectionError::AuthenticationFailed(_)
            | MssqlConnectionError::ConnectionClosed
            | MssqlConnectionError::Io(_) => FinImpactError::Connection(err.to_string()),
            MssqlConnectionError::QueryFailed(_) => FinImpactError::Query(err.to_string()),
            MssqlConnectionError::Tiberius(_) => FinImpactError::Driver(err.to_string()),
        }
    }
}

/// MS SQL Server connection using tiberius
pub struct MssqlConnection {
    client: Mutex<Client<Compat<TcpStream>>>,
    closed: AtomicBool,
    database: Option<String>,
}

impl MssqlConnection {
    /// Create a new MS SQL Server connection
    ///
    /// # Arguments
    /// * `host` - Server hostname
    /// * `port` - Server port (default 1433)
    /// * `database` - Database name (optional)
    /// * `username` - Username (None for Windows auth)
    /// * `password` - Password
    /// * `trust_cert` - Whether to trust server certificate (for dev/testing)
    #[tracing::instrument(skip(password))]
    pub async fn connect(
        host: &str,
        port: u16,
        database: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
        trust_cert: bool,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        tracing::debug!("connecting to MS SQL Server at {}:{}", host, port);

        let mut config = Config::new();
        config.host(host);
        config.port(port);

        if let Some(db) = database {
            config.database(db);
        }

        if trust_cert {
            config.trust_cert();
        }

        config.encryption(EncryptionLevel::Required);

        match (username, password) {
            (Some(user), Some(pass)) => {
                config.authentication(AuthMethod::sql_server(user, pass));
            }
            (Some(user), None) => {
                config.authentication(AuthMethod::sql_server(user, ""));
            }
            (None, _) => {
                return Err(MssqlConnectionError::AuthenticationFailed(
                    "a username is required for SQL Server authentication".to_string(),
                ));
            }
        }

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;

        tcp.set_nodelay(true)?;
        let compat_stream = tcp.compat_write();

        let client = Client::connect(config, compat_stream)
            .await
            .map_err(|e| MssqlConnectionError::ConnectionFailed(e.to_string()))?;

        tracing::debug!("successfully connected to MS SQL Server");

        Ok(Self {
            client: Mutex::new(client),
            closed: AtomicBool::new(false),
            database: database.map(String::from),
        })
    }

    /// Create connection from config with standard keys
    pub async fn from_config(
        config: &ConnectionConfig,
    ) -> std::result::Result<Self, MssqlConnectionError> {
        let host = config
            .get_string("host")
            .unwrap_or_else(|| "localhost".to_string());
        let port = if config.port > 0 { config.port } else { 1433 };
        let database = config.get_string("database");
        let username = config.get_string("username");
        let password = config.get_string("password");
        let trust_cert = config.get_flag("trust_cert");

        Self::connect(
            &host,
            port,
            database.as_deref(),
            username.as_deref(),
            password.as_deref(),
            trust_cert,
        )
        .await
    }

    fn ensure_not_closed(&self) -> std::result::Result<(), MssqlConnectionError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(MssqlConnectionError::ConnectionClosed);
        }
        Ok(())
    }

    /// INSERT followed by `SCOPE_IDENTITY()` in the same batch
    async fn insert_returning_identity(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<StatementResult> {
        let batch = format!(
            "{}; SELECT CAST(SCOPE_IDENTITY() AS BIGINT) AS id",
            bind_placeholders(sql)
        );
        let tiberius_params = values_to_tiberius_params(params);
        let param_refs: Vec<&dyn tiberius::ToSql> = tiberius_params
            .iter()
            .map(|p| p as &dyn tiberius::ToSql)
            .collect();

        let mut client = self.client.lock().await;
        let results = client
            .query(batch.as_str(), &param_refs[..])
            .await
            .map_err(|e| MssqlConnectionError::QueryFailed(e.to_string()))?
            .into_results()
            .await
            .map_err(|e| MssqlConnectionError::QueryFailed(e.to_string()))?;

        let last_insert_id = results
            .iter()
            .rev()
            .find_map(|rows| rows.first())
            .and_then(|row| row.get::<i64, _>(0));

        tracing::debug!(?last_insert_id, "insert completed");
        Ok(StatementResult {
            affected_rows: u64::from(last_insert_id.is_some()),
            last_insert_id,
        })
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

/// Rewrite `?` placeholders to `@P1`, `@P2`, ...
///
/// Question marks inside string literals, quoted identifiers and comments
/// are left alone.
pub fn bind_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut chars = sql.chars().peekable();
    let mut index = 0;

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '[' => {
                let close = if c == '[' { ']' } else { c };
                out.push(c);
                while let Some(inner) = chars.next() {
                    out.push(inner);
                    if inner == close {
                        // doubled quote is an escaped quote
                        if chars.peek() == Some(&close) && close != ']' {
                            if let Some(escaped) = chars.next() {
                                out.push(escaped);
                            }
                            continue;
                        }
                        break;
                    }
                }
            }
            '-' if chars.peek() == Some(&'-') => {
                out.push(c);
                for inner in chars.by_ref() {
                    out.push(inner);
                    if inner == '\n' {
                        break;
                    }
                }
            }
            '?' => {
                index += 1;
                out.push_str(&format!("@P{}", index));
            }
            _ => out.push(c),
        }
    }

    out
}

#[async_trait]
impl Connection for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_not_closed()?;
        if is_insert(sql) {
            return self.insert_returning_identity(sql, params).await;
        }

        let start = std::time::Instant::now();
        let sql = bind_placeholders(sql);
        let tiberius_params = values_to_tiberius_params(params);
        let param_refs: Vec<&dyn tiberius::ToSql> = tiberius_params
            .iter()
            .map(|p| p as &dyn tiberius::ToSql)
            .collect();

        let mut client = self.client.lock().await;
        match client.execute(sql.as_str(), &param_refs[..]).await {
            Ok(exec_result) => {
                let affected_rows = exec_result.rows_affected().iter().sum::<u64>();
                tracing::debug!(
                    affected_rows = affected_rows,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "execute completed"
                );
                Ok(StatementResult::affected(affected_rows))
            }
            Err(e) => {
                tracing::error!(error = %e, "execute failed");
                Err(FinImpactError::Query(e.to_string()))
            }
        }
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_not_closed()?;
        let start = std::time::Instant::now();
        let sql = bind_placeholders(sql);
        let tiberius_params = values_to_tiberius_params(params);
        let param_refs: Vec<&dyn tiberius::ToSql> = tiberius_params
            .iter()
            .map(|p| p as &dyn tiberius::ToSql)
            .collect();

        let mut client = self.client.lock().await;
        let stream = client
            .query(sql.as_str(), &param_refs[..])
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "query failed");
                FinImpactError::Query(e.to_string())
            })?;

        let tib_rows = stream
            .into_first_result()
            .await
            .map_err(|e| FinImpactError::Query(e.to_string()))?;

        let columns: Vec<ColumnMeta> = tib_rows
            .first()
            .map(|first_row| {
                first_row
                    .columns()
                    .iter()
                    .enumerate()
                    .map(|(idx, col)| tiberius_column_to_meta(col, idx))
                    .collect()
            })
            .unwrap_or_default();
        let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

        let mut rows = Vec::with_capacity(tib_rows.len());
        for tib_row in tib_rows {
            rows.push(Row::new(column_names.clone(), tiberius_row_to_values(tib_row)));
        }

        let execution_time_ms = start.elapsed().as_millis() as u64;
        tracing::debug!(
            row_count = rows.len(),
            duration_ms = execution_time_ms,
            "query completed"
        );

        Ok(QueryResult {
            id: Uuid::new_v4(),
            columns,
            rows,
            execution_time_ms,
        })
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let client = self.client.lock().await;
        // Dropping the TCP stream ends the session; tiberius has no explicit logout
        drop(client);
        tracing::debug!(database = ?self.database, "MS SQL Server connection closed");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Convert a tiberius column to ColumnMeta
fn tiberius_column_to_meta(col: &tiberius::Column, ordinal: usize) -> ColumnMeta {
    ColumnMeta {
        name: col.name().to_string(),
        data_type: format!("{:?}", col.column_type()),
        nullable: true,
        ordinal,
    }
}

/// Convert a tiberius row to a vector of Values by consuming the row
fn tiberius_row_to_values(row: TiberiusRow) -> Vec<Value> {
    row.into_iter().map(column_data_to_value).collect()
}

fn epoch(year: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or_default()
}

fn time_from_increments(increments: u64, scale: u8) -> NaiveTime {
    let per_second = 10u64.pow(scale as u32);
    let seconds = (increments / per_second) as u32;
    let nanos = ((increments % per_second) * 10u64.pow(9 - scale as u32)) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, nanos).unwrap_or_default()
}

/// Convert tiberius ColumnData to a FinImpact Value
pub(crate) fn column_data_to_value(col_data: ColumnData<'static>) -> Value {
    match col_data {
        ColumnData::Bit(v) => v.map(Value::Bool).unwrap_or(Value::Null),
        ColumnData::U8(v) => v.map(|v| Value::Int32(v as i32)).unwrap_or(Value::Null),
        ColumnData::I16(v) => v.map(Value::Int16).unwrap_or(Value::Null),
        ColumnData::I32(v) => v.map(Value::Int32).unwrap_or(Value::Null),
        ColumnData::I64(v) => v.map(Value::Int64).unwrap_or(Value::Null),
        ColumnData::F32(v) => v.map(Value::Float32).unwrap_or(Value::Null),
        ColumnData::F64(v) => v.map(Value::Float64).unwrap_or(Value::Null),
        ColumnData::String(v) => v
            .map(|s| Value::String(s.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Guid(v) => v.map(Value::Uuid).unwrap_or(Value::Null),
        ColumnData::Binary(v) => v
            .map(|b| Value::Bytes(b.into_owned()))
            .unwrap_or(Value::Null),
        ColumnData::Numeric(v) => v
            .map(|n| Value::Decimal(n.to_string()))
            .unwrap_or(Value::Null),
        ColumnData::Xml(v) => v
            .map(|x| Value::String(x.into_owned().into_string()))
            .unwrap_or(Value::Null),
        ColumnData::DateTime(None) => Value::Null,
        ColumnData::DateTime(Some(v)) => {
            // Fractions are 1/300 of a second
            let date = epoch(1900) + chrono::Duration::days(v.days() as i64);
            let millis = (v.seconds_fragments() as u64 * 1000) / 300;
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (millis / 1000) as u32,
                ((millis % 1000) * 1_000_000) as u32,
            )
            .unwrap_or_default();
            Value::DateTime(NaiveDateTime::new(date, time))
        }
        ColumnData::SmallDateTime(None) => Value::Null,
        ColumnData::SmallDateTime(Some(v)) => {
            let date = epoch(1900) + chrono::Duration::days(v.days() as i64);
            let time = NaiveTime::from_num_seconds_from_midnight_opt(
                (v.seconds_fragments() as u32) * 60,
                0,
            )
            .unwrap_or_default();
            Value::DateTime(NaiveDateTime::new(date, time))
        }
        ColumnData::DateTime2(None) => Value::Null,
        ColumnData::DateTime2(Some(v)) => {
            let date = epoch(1) + chrono::Duration::days(v.date().days() as i64);
            let time = time_from_increments(v.time().increments(), v.time().scale());
            Value::DateTime(NaiveDateTime::new(date, time))
        }
        ColumnData::DateTimeOffset(None) => Value::Null,
        ColumnData::DateTimeOffset(Some(v)) => {
            let dt2 = v.datetime2();
            let date = epoch(1) + chrono::Duration::days(dt2.date().days() as i64);
            let time = time_from_increments(dt2.time().increments(), dt2.time().scale());
            let naive = NaiveDateTime::new(date, time);
            Value::DateTimeUtc(chrono::DateTime::<chrono::Utc>::from_naive_utc_and_offset(
                naive,
                chrono::Utc,
            ))
        }
        ColumnData::Date(None) => Value::Null,
        ColumnData::Date(Some(v)) => {
            Value::Date(epoch(1) + chrono::Duration::days(v.days() as i64))
        }
        ColumnData::Time(None) => Value::Null,
        ColumnData::Time(Some(v)) => Value::Time(time_from_increments(v.increments(), v.scale())),
    }
}

/// Container for tiberius parameter values
#[derive(Debug)]
pub(crate) enum TiberiusParam {
    Null,
    Bool(bool),
    I16(i16),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
}

impl tiberius::ToSql for TiberiusParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            // Untyped NULL as NVARCHAR converts implicitly to any column type
            TiberiusParam::Null => ColumnData::String(None),
            TiberiusParam::Bool(v) => ColumnData::Bit(Some(*v)),
            TiberiusParam::I16(v) => ColumnData::I16(Some(*v)),
            TiberiusParam::I32(v) => ColumnData::I32(Some(*v)),
            TiberiusParam::I64(v) => ColumnData::I64(Some(*v)),
            TiberiusParam::F32(v) => ColumnData::F32(Some(*v)),
            TiberiusParam::F64(v) => ColumnData::F64(Some(*v)),
            TiberiusParam::String(v) => {
                ColumnData::String(Some(std::borrow::Cow::Borrowed(v.as_str())))
            }
            TiberiusParam::Bytes(v) => {
                ColumnData::Binary(Some(std::borrow::Cow::Borrowed(v.as_slice())))
            }
            TiberiusParam::Uuid(v) => ColumnData::Guid(Some(*v)),
            TiberiusParam::Date(v) => tiberius::ToSql::to_sql(v),
            TiberiusParam::Time(v) => tiberius::ToSql::to_sql(v),
            TiberiusParam::DateTime(v) => tiberius::ToSql::to_sql(v),
        }
    }
}

/// Convert FinImpact Values to tiberius parameters
pub(crate) fn values_to_tiberius_params(values: &[Value]) -> Vec<TiberiusParam> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => TiberiusParam::Null,
            Value::Bool(b) => TiberiusParam::Bool(*b),
            Value::Int8(i) => TiberiusParam::I16(*i as i16),
            Value::Int16(i) => TiberiusParam::I16(*i),
            Value::Int32(i) => TiberiusParam::I32(*i),
            Value::Int64(i) => TiberiusParam::I64(*i),
            Value::Float32(f) => TiberiusParam::F32(*f),
            Value::Float64(f) => TiberiusParam::F64(*f),
            Value::Decimal(d) => TiberiusParam::String(d.clone()),
            Value::String(s) => TiberiusParam::String(s.clone()),
            Value::Bytes(b) => TiberiusParam::Bytes(b.clone()),
            Value::Uuid(u) => TiberiusParam::Uuid(*u),
            Value::Date(d) => TiberiusParam::Date(*d),
            Value::Time(t) => TiberiusParam::Time(*t),
            Value::DateTime(dt) => TiberiusParam::DateTime(*dt),
            Value::DateTimeUtc(dt) => TiberiusParam::DateTime(dt.naive_utc()),
            Value::Json(j) => TiberiusParam::String(j.to_string()),
        })
        .collect()
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("database", &self.database)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}
