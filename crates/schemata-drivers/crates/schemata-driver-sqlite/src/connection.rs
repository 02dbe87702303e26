//! SQLite connection implementation

use async_trait::async_trait;
use parking_lot::Mutex;
use rusqlite::{Connection as RusqliteConnection, InterruptHandle, OpenFlags, params_from_iter};
use schemata_core::{
    ColumnMeta, Connection, ConnectionConfig, QueryCancelHandle, QueryResult, Result, Row,
    SchemataError, SqlExecutor, StatementResult, Transaction, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cancel handle for SQLite statements.
///
/// Wraps the rusqlite `InterruptHandle`; the interrupted statement fails with
/// SQLITE_INTERRUPT.
pub struct SqliteCancelHandle {
    interrupt_handle: Arc<InterruptHandle>,
}

impl QueryCancelHandle for SqliteCancelHandle {
    fn cancel(&self) {
        tracing::debug!("interrupting SQLite statement");
        self.interrupt_handle.interrupt();
    }
}

/// SQLite connection wrapper.
///
/// Statements run on the blocking pool so a cancelled caller can interrupt
/// them while they are in flight.
pub struct SqliteConnection {
    conn: Arc<Mutex<RusqliteConnection>>,
    interrupt_handle: Arc<InterruptHandle>,
    closed: AtomicBool,
}

impl SqliteConnection {
    /// Open a SQLite database file, or `:memory:`.
    pub fn open(path: &str) -> Result<Self> {
        tracing::info!(path = %path, "opening SQLite database");

        let conn = if path == ":memory:" {
            RusqliteConnection::open_in_memory().map_err(|e| {
                SchemataError::Connection(format!("Failed to open in-memory database: {}", e))
            })?
        } else {
            let expanded_path = Self::expand_path(path)?;
            if !expanded_path.starts_with("file:") {
                let file_path = std::path::Path::new(&expanded_path);
                if let Some(parent) = file_path.parent()
                    && !parent.as_os_str().is_empty()
                    && !parent.exists()
                {
                    return Err(SchemataError::Connection(format!(
                        "Parent directory does not exist: {}",
                        parent.display()
                    )));
                }
            }

            let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            let conn = RusqliteConnection::open_with_flags(&expanded_path, flags).map_err(|e| {
                SchemataError::Connection(format!(
                    "Failed to open SQLite database at '{}': {}",
                    expanded_path, e
                ))
            })?;

            conn.pragma_update(None, "journal_mode", "WAL").map_err(|e| {
                SchemataError::Connection(format!("Failed to set journal mode: {}", e))
            })?;
            conn.pragma_update(None, "synchronous", "NORMAL").map_err(|e| {
                SchemataError::Connection(format!("Failed to set synchronous mode: {}", e))
            })?;
            conn
        };

        conn.pragma_update(None, "foreign_keys", "ON").map_err(|e| {
            SchemataError::Connection(format!("Failed to enable foreign keys: {}", e))
        })?;

        // taken before the connection moves behind the mutex
        let interrupt_handle = Arc::new(conn.get_interrupt_handle());

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt_handle,
            closed: AtomicBool::new(false),
        })
    }

    /// Open the database named by `path` (or `database`) in a connection
    /// config. No path means an in-memory database.
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let path = config
            .get_string("path")
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| ":memory:".to_string());
        Self::open(&path)
    }

    /// Expand `~/` and make relative paths absolute.
    fn expand_path(path: &str) -> Result<String> {
        if path.starts_with("file:") {
            return Ok(path.to_string());
        }

        let expanded = if let Some(rest) = path.strip_prefix("~/") {
            let home = std::env::var_os("HOME").ok_or_else(|| {
                SchemataError::Configuration("Unable to determine HOME directory".into())
            })?;
            std::path::PathBuf::from(home)
                .join(rest)
                .to_string_lossy()
                .to_string()
        } else if path.starts_with('~') {
            return Err(SchemataError::Configuration(
                "User-specific home directories (~user) are not supported".into(),
            ));
        } else {
            path.to_string()
        };

        let path_buf = std::path::PathBuf::from(&expanded);
        if path_buf.is_relative() {
            Ok(std::env::current_dir()?
                .join(path_buf)
                .to_string_lossy()
                .to_string())
        } else {
            Ok(expanded)
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(SchemataError::Connection("connection is closed".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SqlExecutor for SqliteConnection {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("sqlite")
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        let sql = sql.to_string();
        let params = values_to_rusqlite(params);
        let result = blocking(&self.conn, move |conn| run_execute(conn, &sql, &params)).await?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let sql = sql.to_string();
        let params = values_to_rusqlite(params);
        let result = blocking(&self.conn, move |conn| run_query(conn, &sql, &params)).await?;
        tracing::debug!(
            row_count = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(SqliteCancelHandle {
            interrupt_handle: self.interrupt_handle.clone(),
        }))
    }
}

#[async_trait]
impl Connection for SqliteConnection {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        tracing::debug!("beginning SQLite transaction");
        blocking(&self.conn, |conn| {
            conn.execute_batch("BEGIN DEFERRED")
                .map_err(SchemataError::database)
        })
        .await?;
        Ok(Box::new(SqliteTransaction {
            conn: Arc::clone(&self.conn),
            interrupt_handle: Arc::clone(&self.interrupt_handle),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing SQLite connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// SQLite transaction wrapper.
///
/// Issues raw `BEGIN DEFERRED` / `COMMIT` / `ROLLBACK` so it can share the
/// connection mutex without rusqlite's borrow-scoped transaction type.
pub struct SqliteTransaction {
    conn: Arc<Mutex<RusqliteConnection>>,
    interrupt_handle: Arc<InterruptHandle>,
    committed: bool,
    rolled_back: bool,
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!(
                "SQLite transaction dropped without commit or rollback, issuing automatic rollback"
            );
            let conn = self.conn.lock();
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::error!(error = %e, "automatic rollback on drop failed");
            }
        }
    }
}

#[async_trait]
impl SqlExecutor for SqliteTransaction {
    fn driver_name(&self) -> &str {
        "sqlite"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("sqlite")
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in SQLite transaction");
        let sql = sql.to_string();
        let params = values_to_rusqlite(params);
        blocking(&self.conn, move |conn| run_execute(conn, &sql, &params)).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in SQLite transaction");
        let sql = sql.to_string();
        let params = values_to_rusqlite(params);
        blocking(&self.conn, move |conn| run_query(conn, &sql, &params)).await
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(SqliteCancelHandle {
            interrupt_handle: self.interrupt_handle.clone(),
        }))
    }
}

#[async_trait]
impl Transaction for SqliteTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        if self.rolled_back {
            return Err(SchemataError::Connection(
                "Transaction already rolled back".into(),
            ));
        }
        if self.committed {
            return Err(SchemataError::Connection("Transaction already committed".into()));
        }

        blocking(&self.conn, |conn| {
            conn.execute_batch("COMMIT").map_err(SchemataError::database)
        })
        .await?;
        self.committed = true;
        tracing::debug!("SQLite transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        if self.committed {
            return Err(SchemataError::Connection("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        blocking(&self.conn, |conn| {
            conn.execute_batch("ROLLBACK")
                .map_err(SchemataError::database)
        })
        .await?;
        self.rolled_back = true;
        tracing::debug!("SQLite transaction rolled back");
        Ok(())
    }
}

/// Run `f` against the locked connection on the blocking pool.
async fn blocking<T, F>(conn: &Arc<Mutex<RusqliteConnection>>, f: F) -> Result<T>
where
    F: FnOnce(&RusqliteConnection) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let conn = Arc::clone(conn);
    tokio::task::spawn_blocking(move || {
        let guard = conn.lock();
        f(&guard)
    })
    .await
    .map_err(SchemataError::database)?
}

fn run_execute(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[rusqlite::types::Value],
) -> Result<StatementResult> {
    let mut stmt = conn.prepare(sql).map_err(SchemataError::database)?;

    // PRAGMAs and the like may hand back a row even when run for effect
    if stmt.column_count() > 0 {
        let mut rows = stmt
            .query(params_from_iter(params.iter()))
            .map_err(SchemataError::database)?;
        while rows.next().map_err(SchemataError::database)?.is_some() {}
        return Ok(StatementResult { affected_rows: 0 });
    }

    let affected = stmt
        .execute(params_from_iter(params.iter()))
        .map_err(SchemataError::database)?;
    Ok(StatementResult {
        affected_rows: affected as u64,
    })
}

fn run_query(
    conn: &RusqliteConnection,
    sql: &str,
    params: &[rusqlite::types::Value],
) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let mut stmt = conn.prepare(sql).map_err(SchemataError::database)?;

    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.decl_type().unwrap_or("DYNAMIC").to_string(),
            ordinal,
        })
        .collect();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let mut rows = Vec::new();
    let mut query_rows = stmt
        .query(params_from_iter(params.iter()))
        .map_err(SchemataError::database)?;
    while let Some(row) = query_rows.next().map_err(SchemataError::database)? {
        let mut values = Vec::with_capacity(column_names.len());
        for i in 0..column_names.len() {
            values.push(rusqlite_to_value(row, i)?);
        }
        rows.push(Row::new(column_names.clone(), values));
    }

    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    })
}

fn values_to_rusqlite(values: &[Value]) -> Vec<rusqlite::types::Value> {
    values.iter().map(value_to_rusqlite).collect()
}

pub(crate) fn value_to_rusqlite(value: &Value) -> rusqlite::types::Value {
    use rusqlite::types::Value as Sql;

    match value {
        Value::Null => Sql::Null,
        Value::Bool(b) => Sql::Integer(i64::from(*b)),
        Value::Int8(i) => Sql::Integer(i64::from(*i)),
        Value::Int16(i) => Sql::Integer(i64::from(*i)),
        Value::Int32(i) => Sql::Integer(i64::from(*i)),
        Value::Int64(i) => Sql::Integer(*i),
        Value::Float32(f) => Sql::Real(f64::from(*f)),
        Value::Float64(f) => Sql::Real(*f),
        Value::Decimal(d) => Sql::Text(d.clone()),
        Value::String(s) => Sql::Text(s.clone()),
        Value::Bytes(b) => Sql::Blob(b.clone()),
        Value::Date(d) => Sql::Text(d.to_string()),
        Value::Time(t) => Sql::Text(t.to_string()),
        Value::DateTime(dt) => Sql::Text(dt.to_string()),
        Value::DateTimeUtc(dt) => Sql::Text(dt.to_rfc3339()),
        Value::Json(j) => Sql::Text(j.to_string()),
        Value::Uuid(u) => Sql::Text(u.to_string()),
        Value::Array(items) => Sql::Text(
            serde_json::Value::Array(items.iter().map(value_to_json).collect()).to_string(),
        ),
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Json(j) => j.clone(),
        Value::Array(items) => serde_json::Value::Array(items.iter().map(value_to_json).collect()),
        other => serde_json::Value::String(other.to_string()),
    }
}

fn rusqlite_to_value(row: &rusqlite::Row, idx: usize) -> Result<Value> {
    use rusqlite::types::ValueRef;

    let value = match row.get_ref(idx).map_err(SchemataError::database)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(s) => Value::String(String::from_utf8_lossy(s).to_string()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    };
    Ok(value)
}
