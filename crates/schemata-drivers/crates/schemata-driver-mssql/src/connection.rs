//! SQL Server connection implementation using tiberius

use async_trait::async_trait;
use schemata_core::{
    ColumnMeta, Connection, ConnectionConfig, QueryCancelHandle, QueryResult, Result, Row,
    SchemataError, SqlExecutor, StatementResult, Transaction, Value,
};
use std::borrow::Cow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use uuid::Uuid;

type TdsClient = Client<Compat<TcpStream>>;

/// Cancel handle for SQL Server statements.
///
/// tiberius sends no attention packet, so the handle raises a flag the row
/// reader checks between rows.
pub struct MssqlCancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl QueryCancelHandle for MssqlCancelHandle {
    fn cancel(&self) {
        tracing::debug!("setting SQL Server query cancellation flag");
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn database_error(error: tiberius::error::Error) -> SchemataError {
    tracing::debug!(error = %error, "SQL Server statement failed");
    SchemataError::database(error)
}

/// SQL Server connection using tiberius
///
/// One TDS session behind a mutex; a transaction shares it, so statements run
/// on the connection while a transaction is open take part in it.
pub struct MssqlConnection {
    client: Arc<Mutex<Option<TdsClient>>>,
    cancelled: Arc<AtomicBool>,
    closed: AtomicBool,
    database: Option<String>,
}

impl MssqlConnection {
    /// Connect using host, port, database, credentials and the `trust_cert`
    /// flag from a connection config.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut tds = Config::new();
        tds.host(config.get_string("host").unwrap_or_else(|| "localhost".into()));
        tds.port(config.port_or(1433));
        if let Some(database) = config.get_string("database") {
            tds.database(database);
        }
        if config.get_flag("trust_cert") || config.get_flag("trust_certificate") {
            tds.trust_cert();
        }
        tds.encryption(EncryptionLevel::Required);

        match config.get_string("user") {
            Some(user) => {
                let password = config.get_string("password").unwrap_or_default();
                tds.authentication(AuthMethod::sql_server(user, password));
            }
            None => {
                return Err(SchemataError::Configuration(
                    "SQL Server connections need a user name".into(),
                ));
            }
        }

        Self::connect_with_config(tds, config.get_string("database")).await
    }

    /// Connect with a ready-made tiberius config.
    #[tracing::instrument(skip(config))]
    pub async fn connect_with_config(config: Config, database: Option<String>) -> Result<Self> {
        tracing::info!(address = %config.get_addr(), "connecting to SQL Server");

        let tcp = TcpStream::connect(config.get_addr())
            .await
            .map_err(|e| SchemataError::Connection(format!("Failed to reach SQL Server: {}", e)))?;
        tcp.set_nodelay(true)
            .map_err(|e| SchemataError::Connection(e.to_string()))?;

        let client = Client::connect(config, tcp.compat_write())
            .await
            .map_err(|e| SchemataError::Connection(format!("Failed to connect to SQL Server: {}", e)))?;

        tracing::info!("SQL Server connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(Some(client))),
            cancelled: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
            database,
        })
    }
}

impl std::fmt::Debug for MssqlConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MssqlConnection")
            .field("database", &self.database)
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .finish()
    }
}

#[async_trait]
impl SqlExecutor for MssqlConnection {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("mssql")
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed_error)?;
        let result = run_execute(client, sql, params).await?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed_error)?;
        let result = run_query(client, sql, params, &self.cancelled).await?;
        tracing::debug!(
            row_count = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(MssqlCancelHandle {
            cancelled: self.cancelled.clone(),
        }))
    }
}

#[async_trait]
impl Connection for MssqlConnection {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning SQL Server transaction");
        {
            let mut guard = self.client.lock().await;
            let client = guard.as_mut().ok_or_else(closed_error)?;
            client
                .simple_query("BEGIN TRANSACTION")
                .await
                .map_err(database_error)?
                .into_results()
                .await
                .map_err(database_error)?;
        }
        Ok(Box::new(MssqlTransaction {
            client: Arc::clone(&self.client),
            cancelled: self.cancelled.clone(),
            finished: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("closing SQL Server connection");
        if let Some(client) = self.client.lock().await.take() {
            client.close().await.map_err(database_error)?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

fn closed_error() -> SchemataError {
    SchemataError::Connection("connection is closed".into())
}

/// SQL Server transaction on the connection's session.
pub struct MssqlTransaction {
    client: Arc<Mutex<Option<TdsClient>>>,
    cancelled: Arc<AtomicBool>,
    finished: bool,
}

impl MssqlTransaction {
    async fn finish(&mut self, statement: &'static str) -> Result<()> {
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed_error)?;
        client
            .simple_query(statement)
            .await
            .map_err(database_error)?
            .into_results()
            .await
            .map_err(database_error)?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for MssqlTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("SQL Server transaction dropped without commit or rollback, issuing automatic rollback");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let client = Arc::clone(&self.client);
        runtime.spawn(async move {
            let mut guard = client.lock().await;
            if let Some(client) = guard.as_mut() {
                let outcome = match client
                    .simple_query("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION")
                    .await
                {
                    Ok(stream) => stream.into_results().await.map(|_| ()),
                    Err(e) => Err(e),
                };
                if let Err(e) = outcome {
                    tracing::error!(error = %e, "automatic rollback on drop failed");
                }
            }
        });
    }
}

#[async_trait]
impl SqlExecutor for MssqlTransaction {
    fn driver_name(&self) -> &str {
        "mssql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("mssql")
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQL Server transaction");
        self.cancelled.store(false, Ordering::SeqCst);
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed_error)?;
        run_execute(client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in SQL Server transaction");
        self.cancelled.store(false, Ordering::SeqCst);
        let mut guard = self.client.lock().await;
        let client = guard.as_mut().ok_or_else(closed_error)?;
        run_query(client, sql, params, &self.cancelled).await
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(MssqlCancelHandle {
            cancelled: self.cancelled.clone(),
        }))
    }
}

#[async_trait]
impl Transaction for MssqlTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        self.finish("COMMIT TRANSACTION").await?;
        tracing::debug!("SQL Server transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        self.finish("IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await?;
        tracing::debug!("SQL Server transaction rolled back");
        Ok(())
    }
}

async fn run_execute(client: &mut TdsClient, sql: &str, params: &[Value]) -> Result<StatementResult> {
    let params = values_to_tiberius_params(params);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();
    let result = client
        .execute(sql, &param_refs[..])
        .await
        .map_err(database_error)?;
    Ok(StatementResult {
        affected_rows: result.rows_affected().iter().sum::<u64>(),
    })
}

async fn run_query(
    client: &mut TdsClient,
    sql: &str,
    params: &[Value],
    cancelled: &AtomicBool,
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let params = values_to_tiberius_params(params);
    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p as &dyn ToSql).collect();

    let mut stream = client
        .query(sql, &param_refs[..])
        .await
        .map_err(database_error)?;
    let columns: Vec<ColumnMeta> = stream
        .columns()
        .await
        .map_err(database_error)?
        .map(|columns| {
            columns
                .iter()
                .enumerate()
                .map(|(ordinal, col)| ColumnMeta {
                    name: col.name().to_string(),
                    data_type: format!("{:?}", col.column_type()),
                    ordinal,
                })
                .collect()
        })
        .unwrap_or_default();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let tds_rows = stream.into_first_result().await.map_err(database_error)?;
    let mut rows = Vec::with_capacity(tds_rows.len());
    for tds_row in tds_rows {
        if cancelled.load(Ordering::SeqCst) {
            tracing::debug!("query cancelled while reading rows");
            return Err(SchemataError::Cancelled);
        }
        let values = tds_row
            .into_iter()
            .map(column_data_to_value)
            .collect::<Result<Vec<_>>>()?;
        rows.push(Row::new(column_names.clone(), values));
    }

    Ok(QueryResult {
        id: Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    })
}

/// Convert tiberius ColumnData to a [`Value`]
pub(crate) fn column_data_to_value(data: ColumnData<'static>) -> Result<Value> {
    let value = match data {
        ColumnData::Bit(v) => v.map(Value::Bool),
        ColumnData::U8(v) => v.map(|v| Value::Int16(i16::from(v))),
        ColumnData::I16(v) => v.map(Value::Int16),
        ColumnData::I32(v) => v.map(Value::Int32),
        ColumnData::I64(v) => v.map(Value::Int64),
        ColumnData::F32(v) => v.map(Value::Float32),
        ColumnData::F64(v) => v.map(Value::Float64),
        ColumnData::String(v) => v.map(|s| Value::String(s.into_owned())),
        ColumnData::Guid(v) => v.map(Value::Uuid),
        ColumnData::Binary(v) => v.map(|b| Value::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| Value::Decimal(n.to_string())),
        ColumnData::Xml(v) => v.map(|x| Value::String(x.into_owned().into_string())),
        ColumnData::Date(_) => chrono::NaiveDate::from_sql(&data)
            .map_err(database_error)?
            .map(Value::Date),
        ColumnData::Time(_) => chrono::NaiveTime::from_sql(&data)
            .map_err(database_error)?
            .map(Value::Time),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            chrono::NaiveDateTime::from_sql(&data)
                .map_err(database_error)?
                .map(Value::DateTime)
        }
        ColumnData::DateTimeOffset(_) => chrono::DateTime::<chrono::Utc>::from_sql(&data)
            .map_err(database_error)?
            .map(Value::DateTimeUtc),
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Container for tiberius parameter values
#[derive(Debug, Clone, PartialEq)]
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
    Uuid(Uuid),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

impl ToSql for TiberiusParam {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            TiberiusParam::Null => ColumnData::I32(None),
            TiberiusParam::Bool(v) => ColumnData::Bit(Some(*v)),
            TiberiusParam::I16(v) => ColumnData::I16(Some(*v)),
            TiberiusParam::I32(v) => ColumnData::I32(Some(*v)),
            TiberiusParam::I64(v) => ColumnData::I64(Some(*v)),
            TiberiusParam::F32(v) => ColumnData::F32(Some(*v)),
            TiberiusParam::F64(v) => ColumnData::F64(Some(*v)),
            TiberiusParam::String(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            TiberiusParam::Bytes(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            TiberiusParam::Uuid(v) => ColumnData::Guid(Some(*v)),
            TiberiusParam::Date(v) => v.to_sql(),
            TiberiusParam::Time(v) => v.to_sql(),
            TiberiusParam::DateTime(v) => v.to_sql(),
        }
    }
}

/// Convert values to tiberius parameters (`@P1`, `@P2`, ...)
pub(crate) fn values_to_tiberius_params(values: &[Value]) -> Vec<TiberiusParam> {
    values
        .iter()
        .map(|v| match v {
            Value::Null => TiberiusParam::Null,
            Value::Bool(b) => TiberiusParam::Bool(*b),
            Value::Int8(i) => TiberiusParam::I16(i16::from(*i)),
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
            Value::DateTimeUtc(dt) => TiberiusParam::String(dt.to_rfc3339()),
            Value::Json(j) => TiberiusParam::String(j.to_string()),
            Value::Array(items) => TiberiusParam::String(
                serde_json::Value::Array(items.iter().map(value_to_json).collect()).to_string(),
            ),
        })
        .collect()
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Float32(f) => serde_json::json!(f),
        Value::Float64(f) => serde_json::json!(f),
        Value::Int8(_) | Value::Int16(_) | Value::Int32(_) | Value::Int64(_) => value
            .as_i64()
            .map(serde_json::Value::from)
            .unwrap_or(serde_json::Value::Null),
        other => serde_json::Value::String(other.to_string()),
    }
}
