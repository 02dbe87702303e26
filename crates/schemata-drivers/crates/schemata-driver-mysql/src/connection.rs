//! MySQL connection implementation

use async_trait::async_trait;
use mysql_async::consts::{ColumnFlags, ColumnType};
use mysql_async::prelude::*;
use mysql_async::{
    Column as MySqlColumn, Conn, Opts, OptsBuilder, Params, Pool, PoolConstraints, PoolOpts,
    Row as MySqlRow,
};
use schemata_core::{
    ColumnMeta, Connection, ConnectionConfig, QueryCancelHandle, QueryResult, Result, Row,
    SchemataError, SqlExecutor, StatementResult, Transaction, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Character set id MySQL reports for binary columns.
const BINARY_CHARSET: u16 = 63;

/// Cancel handle for MySQL statements.
///
/// MySQL has no out-of-band cancel on the wire, so the handle raises a flag
/// the row reader checks between rows.
pub struct MySqlCancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl QueryCancelHandle for MySqlCancelHandle {
    fn cancel(&self) {
        tracing::debug!("setting MySQL query cancellation flag");
        self.cancelled.store(true, Ordering::SeqCst);
    }
}

fn database_error(error: mysql_async::Error) -> SchemataError {
    tracing::debug!(error = %error, "MySQL statement failed");
    SchemataError::database(error)
}

/// MySQL connection wrapper
///
/// Backed by a pool of exactly one connection, so session state (the current
/// database, `FOREIGN_KEY_CHECKS`) carries from one statement to the next.
pub struct MySqlConnection {
    pool: Pool,
    cancelled: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl MySqlConnection {
    /// Connect using host, port, database and credentials from a connection
    /// config.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut builder = OptsBuilder::default()
            .ip_or_hostname(config.get_string("host").unwrap_or_else(|| "localhost".into()))
            .tcp_port(config.port_or(3306));
        if let Some(database) = config.get_string("database") {
            builder = builder.db_name(Some(database));
        }
        if let Some(user) = config.get_string("user") {
            builder = builder.user(Some(user));
        }
        if let Some(password) = config.get_string("password") {
            builder = builder.pass(Some(password));
        }
        Self::connect_with_opts(builder.into()).await
    }

    /// Connect with ready-made mysql_async options. The pool settings are
    /// replaced with a single-connection pool.
    pub async fn connect_with_opts(opts: Opts) -> Result<Self> {
        tracing::info!(
            host = %opts.ip_or_hostname(),
            port = opts.tcp_port(),
            database = ?opts.db_name(),
            "connecting to MySQL database"
        );

        let constraints = PoolConstraints::new(1, 1).ok_or_else(|| {
            SchemataError::Connection("failed to configure MySQL pool constraints (min=1, max=1)".into())
        })?;
        let pool_opts = PoolOpts::default()
            .with_constraints(constraints)
            .with_reset_connection(false);
        let opts: Opts = OptsBuilder::from_opts(opts).pool_opts(pool_opts).into();

        let pool = Pool::new(opts);
        // verify connectivity before handing the connection out
        pool.get_conn().await.map_err(|e| {
            SchemataError::Connection(format!("Failed to connect to MySQL: {}", e))
        })?;

        tracing::info!("MySQL connection established");
        Ok(Self {
            pool,
            cancelled: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        })
    }

    async fn get_conn(&self) -> Result<Conn> {
        if self.is_closed() {
            return Err(SchemataError::Connection("connection is closed".into()));
        }
        self.pool
            .get_conn()
            .await
            .map_err(|e| SchemataError::Connection(format!("Failed to get MySQL connection: {}", e)))
    }
}

#[async_trait]
impl SqlExecutor for MySqlConnection {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("mysql")
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut conn = self.get_conn().await?;
        let result = run_execute(&mut conn, sql, params).await?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.cancelled.store(false, Ordering::SeqCst);
        let mut conn = self.get_conn().await?;
        let result = run_query(&mut conn, sql, params, &self.cancelled).await?;
        tracing::debug!(
            row_count = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(MySqlCancelHandle {
            cancelled: self.cancelled.clone(),
        }))
    }
}

#[async_trait]
impl Connection for MySqlConnection {
    /// Starts a transaction on the pooled connection. MySQL commits implicitly
    /// before and after most DDL, so schema changes inside it are not undone by
    /// a rollback.
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        tracing::debug!("beginning MySQL transaction");
        let mut conn = self.get_conn().await?;
        conn.query_drop("START TRANSACTION")
            .await
            .map_err(database_error)?;

        Ok(Box::new(MySqlTransaction {
            conn: Arc::new(Mutex::new(Some(conn))),
            cancelled: self.cancelled.clone(),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!("closing MySQL connection pool");
        self.pool
            .clone()
            .disconnect()
            .await
            .map_err(|e| SchemataError::Connection(format!("Failed to close MySQL connection: {}", e)))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// MySQL transaction
///
/// Holds the pooled connection from `START TRANSACTION` until commit or
/// rollback; the connection returns to the pool when released.
pub struct MySqlTransaction {
    conn: Arc<Mutex<Option<Conn>>>,
    cancelled: Arc<AtomicBool>,
    committed: bool,
    rolled_back: bool,
}

impl MySqlTransaction {
    async fn finish(&self, statement: &'static str) -> Result<()> {
        let mut guard = self.conn.lock().await;
        let Some(mut conn) = guard.take() else {
            return Err(SchemataError::Connection(
                "Transaction connection no longer available".into(),
            ));
        };
        conn.query_drop(statement).await.map_err(database_error)
    }
}

impl Drop for MySqlTransaction {
    fn drop(&mut self) {
        if self.committed || self.rolled_back {
            return;
        }
        tracing::warn!("MySQL transaction dropped without commit or rollback, issuing automatic rollback");
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let conn = Arc::clone(&self.conn);
        runtime.spawn(async move {
            if let Some(mut conn) = conn.lock().await.take()
                && let Err(e) = conn.query_drop("ROLLBACK").await
            {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        });
    }
}

#[async_trait]
impl SqlExecutor for MySqlTransaction {
    fn driver_name(&self) -> &str {
        "mysql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("mysql")
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in MySQL transaction");
        self.cancelled.store(false, Ordering::SeqCst);
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| {
            SchemataError::Connection("Transaction connection no longer available".into())
        })?;
        run_execute(conn, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in MySQL transaction");
        self.cancelled.store(false, Ordering::SeqCst);
        let mut guard = self.conn.lock().await;
        let conn = guard.as_mut().ok_or_else(|| {
            SchemataError::Connection("Transaction connection no longer available".into())
        })?;
        run_query(conn, sql, params, &self.cancelled).await
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(MySqlCancelHandle {
            cancelled: self.cancelled.clone(),
        }))
    }
}

#[async_trait]
impl Transaction for MySqlTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        if self.rolled_back {
            return Err(SchemataError::Connection(
                "Transaction already rolled back".into(),
            ));
        }
        if self.committed {
            return Err(SchemataError::Connection("Transaction already committed".into()));
        }
        self.finish("COMMIT").await?;
        self.committed = true;
        tracing::debug!("MySQL transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        if self.committed {
            return Err(SchemataError::Connection("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }
        self.finish("ROLLBACK").await?;
        self.rolled_back = true;
        tracing::debug!("MySQL transaction rolled back");
        Ok(())
    }
}

async fn run_execute(conn: &mut Conn, sql: &str, params: &[Value]) -> Result<StatementResult> {
    // the text protocol also runs statements that cannot be prepared
    if params.is_empty() {
        conn.query_drop(sql).await.map_err(database_error)?;
    } else {
        conn.exec_drop(sql, to_params(params))
            .await
            .map_err(database_error)?;
    }
    Ok(StatementResult {
        affected_rows: conn.affected_rows(),
    })
}

async fn run_query(
    conn: &mut Conn,
    sql: &str,
    params: &[Value],
    cancelled: &AtomicBool,
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();

    let (mysql_columns, mysql_rows): (Vec<MySqlColumn>, Vec<MySqlRow>) = if params.is_empty() {
        let mut result = conn.query_iter(sql).await.map_err(database_error)?;
        let columns = result.columns().map(|c| c.to_vec()).unwrap_or_default();
        (columns, result.collect().await.map_err(database_error)?)
    } else {
        let mut result = conn
            .exec_iter(sql, to_params(params))
            .await
            .map_err(database_error)?;
        let columns = result.columns().map(|c| c.to_vec()).unwrap_or_default();
        (columns, result.collect().await.map_err(database_error)?)
    };

    let columns: Vec<ColumnMeta> = mysql_columns
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name_str().to_string(),
            data_type: format!("{:?}", col.column_type()),
            ordinal,
        })
        .collect();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::with_capacity(mysql_rows.len());
    for mut mysql_row in mysql_rows {
        if cancelled.load(Ordering::SeqCst) {
            tracing::debug!("query cancelled while reading rows");
            return Err(SchemataError::Cancelled);
        }
        let values = mysql_columns
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let raw = mysql_row.take(idx).unwrap_or(mysql_async::Value::NULL);
                mysql_value_to_value(raw, col.column_type(), is_binary_column(col))
            })
            .collect();
        rows.push(Row::new(column_names.clone(), values));
    }

    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    })
}

fn to_params(params: &[Value]) -> Params {
    Params::Positional(params.iter().map(value_to_mysql).collect())
}

pub(crate) fn value_to_mysql(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as My;
    match value {
        Value::Null => My::NULL,
        Value::Bool(v) => My::Int(i64::from(*v)),
        Value::Int8(v) => My::Int(i64::from(*v)),
        Value::Int16(v) => My::Int(i64::from(*v)),
        Value::Int32(v) => My::Int(i64::from(*v)),
        Value::Int64(v) => My::Int(*v),
        Value::Float32(v) => My::Float(*v),
        Value::Float64(v) => My::Double(*v),
        Value::Decimal(v) | Value::String(v) => My::Bytes(v.as_bytes().to_vec()),
        Value::Bytes(v) => My::Bytes(v.clone()),
        Value::Uuid(v) => My::Bytes(v.to_string().into_bytes()),
        Value::Json(v) => My::Bytes(v.to_string().into_bytes()),
        Value::Date(v) => My::Bytes(v.format("%Y-%m-%d").to_string().into_bytes()),
        Value::Time(v) => My::Bytes(v.format("%H:%M:%S%.f").to_string().into_bytes()),
        Value::DateTime(v) => My::Bytes(v.format("%Y-%m-%d %H:%M:%S%.f").to_string().into_bytes()),
        Value::DateTimeUtc(v) => {
            My::Bytes(v.format("%Y-%m-%d %H:%M:%S%.f").to_string().into_bytes())
        }
        // no array type; arrays travel as JSON text
        Value::Array(items) => My::Bytes(
            serde_json::Value::Array(items.iter().map(value_to_json).collect())
                .to_string()
                .into_bytes(),
        ),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        Value::Float32(f) => serde_json::json!(f),
        Value::Float64(f) => serde_json::json!(f),
        other => match other.as_i64() {
            Some(i) if !matches!(other, Value::String(_) | Value::Decimal(_)) => {
                serde_json::Value::from(i)
            }
            _ => serde_json::Value::String(other.to_string()),
        },
    }
}

fn is_binary_column(column: &MySqlColumn) -> bool {
    column.character_set() == BINARY_CHARSET && !column.flags().contains(ColumnFlags::NUM_FLAG)
}

/// Convert a mysql_async value using the column metadata. The text protocol
/// returns every value as bytes, so the column type decides how to read them.
pub(crate) fn mysql_value_to_value(
    value: mysql_async::Value,
    column_type: ColumnType,
    is_binary: bool,
) -> Value {
    match value {
        mysql_async::Value::NULL => Value::Null,
        mysql_async::Value::Bytes(bytes) => bytes_to_value(bytes, column_type, is_binary),
        mysql_async::Value::Int(i) => Value::Int64(i),
        mysql_async::Value::UInt(u) => i64::try_from(u)
            .map(Value::Int64)
            .unwrap_or_else(|_| Value::Decimal(u.to_string())),
        mysql_async::Value::Float(f) => Value::Float32(f),
        mysql_async::Value::Double(d) => Value::Float64(d),
        mysql_async::Value::Date(year, month, day, hour, min, sec, micro) => {
            let date = chrono::NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day));
            match (date, column_type) {
                (Some(date), ColumnType::MYSQL_TYPE_DATE) => Value::Date(date),
                (Some(date), _) => date
                    .and_hms_micro_opt(u32::from(hour), u32::from(min), u32::from(sec), micro)
                    .map(Value::DateTime)
                    .unwrap_or(Value::Date(date)),
                // zero dates such as 0000-00-00
                (None, _) => Value::String(format!(
                    "{:04}-{:02}-{:02} {:02}:{:02}:{:02}",
                    year, month, day, hour, min, sec
                )),
            }
        }
        mysql_async::Value::Time(negative, days, hours, mins, secs, micros) => {
            if !negative
                && days == 0
                && let Some(time) = chrono::NaiveTime::from_hms_micro_opt(
                    u32::from(hours),
                    u32::from(mins),
                    u32::from(secs),
                    micros,
                )
            {
                return Value::Time(time);
            }
            let total_hours = days * 24 + u32::from(hours);
            let sign = if negative { "-" } else { "" };
            Value::String(format!(
                "{}{:02}:{:02}:{:02}.{:06}",
                sign, total_hours, mins, secs, micros
            ))
        }
    }
}

fn bytes_to_value(bytes: Vec<u8>, column_type: ColumnType, is_binary: bool) -> Value {
    if is_binary {
        return Value::Bytes(bytes);
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => return Value::Bytes(e.into_bytes()),
    };
    match column_type {
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => text
            .parse::<i64>()
            .map(Value::Int64)
            .unwrap_or(Value::Decimal(text)),
        ColumnType::MYSQL_TYPE_FLOAT => text
            .parse::<f32>()
            .map(Value::Float32)
            .unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DOUBLE => text
            .parse::<f64>()
            .map(Value::Float64)
            .unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => Value::Decimal(text),
        ColumnType::MYSQL_TYPE_JSON => serde_json::from_str(&text)
            .map(Value::Json)
            .unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DATE => chrono::NaiveDate::parse_from_str(&text, "%Y-%m-%d")
            .map(Value::Date)
            .unwrap_or(Value::String(text)),
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_TIMESTAMP => {
            chrono::NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f")
                .map(Value::DateTime)
                .unwrap_or(Value::String(text))
        }
        _ => Value::String(text),
    }
}
