//! PostgreSQL connection implementation

use crate::tls::TlsSettings;
use async_trait::async_trait;
use bytes::BytesMut;
use postgres_native_tls::MakeTlsConnector;
use schemata_core::{
    ColumnMeta, Connection, ConnectionConfig, QueryCancelHandle, QueryResult, Result, Row,
    SchemataError, SqlExecutor, StatementResult, Transaction, Value,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_postgres::types::{FromSql, ToSql, Type};
use tokio_postgres::{CancelToken, Client, NoTls, Row as PgRow};

/// Cancel handle for PostgreSQL statements.
///
/// Wraps the tokio-postgres `CancelToken`. The cancel request travels over its
/// own connection, spawned on the runtime the connection was opened on.
pub struct PostgresCancelHandle {
    cancel_token: CancelToken,
    runtime: Handle,
}

impl QueryCancelHandle for PostgresCancelHandle {
    fn cancel(&self) {
        tracing::debug!("sending cancel request to PostgreSQL server");
        let cancel_token = self.cancel_token.clone();
        self.runtime.spawn(async move {
            if let Err(e) = cancel_token.cancel_query(NoTls).await {
                tracing::warn!(error = %e, "failed to cancel PostgreSQL query");
            } else {
                tracing::debug!("PostgreSQL cancel request sent");
            }
        });
    }
}

/// Server message with SQLSTATE, detail and hint, for logs. The error itself
/// is returned untouched.
pub(crate) fn format_postgres_error(error: &tokio_postgres::Error) -> String {
    let Some(db_error) = error.as_db_error() else {
        return error.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail()
        && !detail.trim().is_empty()
    {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint()
        && !hint.trim().is_empty()
    {
        message.push_str(&format!(" (hint: {})", hint));
    }
    format!("{} (code: {})", message, db_error.code().code())
}

fn database_error(error: tokio_postgres::Error) -> SchemataError {
    tracing::debug!(error = %format_postgres_error(&error), "PostgreSQL statement failed");
    SchemataError::database(error)
}

/// PostgreSQL connection wrapper
pub struct PostgresConnection {
    client: Arc<Mutex<Client>>,
    cancel_token: CancelToken,
    runtime: Handle,
    closed: AtomicBool,
}

impl PostgresConnection {
    /// Connect using host, port, database and credentials from a connection
    /// config. `sslmode` and the certificate paths follow libpq.
    pub async fn connect(config: &ConnectionConfig) -> Result<Self> {
        let mut pg_config = tokio_postgres::Config::new();
        pg_config
            .host(config.get_string("host").as_deref().unwrap_or("localhost"))
            .port(config.port_or(5432))
            .dbname(
                config
                    .get_string("database")
                    .as_deref()
                    .unwrap_or("postgres"),
            );
        if let Some(user) = config.get_string("user") {
            pg_config.user(&user);
        }
        if let Some(password) = config.get_string("password") {
            pg_config.password(password);
        }
        if let Some(application_name) = config.get_string("application_name") {
            pg_config.application_name(&application_name);
        }

        let tls = TlsSettings::from_config(config)?;
        pg_config.ssl_mode(tls.mode.negotiation());
        Self::open(pg_config, tls.connector()?).await
    }

    /// Connect with a ready-made tokio-postgres config, without TLS.
    pub async fn connect_with_config(config: tokio_postgres::Config) -> Result<Self> {
        Self::open(config, None).await
    }

    async fn open(config: tokio_postgres::Config, tls: Option<MakeTlsConnector>) -> Result<Self> {
        tracing::info!(
            hosts = ?config.get_hosts(),
            database = ?config.get_dbname(),
            tls = tls.is_some(),
            "connecting to PostgreSQL database"
        );

        let runtime = Handle::try_current().map_err(|e| {
            SchemataError::Connection(format!("PostgreSQL driver needs a Tokio runtime: {}", e))
        })?;
        let connect_error = |e: tokio_postgres::Error| {
            SchemataError::Connection(format!(
                "Failed to connect to PostgreSQL: {}",
                format_postgres_error(&e)
            ))
        };

        let client = match tls {
            Some(tls) => {
                let (client, connection) = config.connect(tls).await.map_err(connect_error)?;
                runtime.spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "PostgreSQL connection error");
                    }
                });
                client
            }
            None => {
                let (client, connection) = config.connect(NoTls).await.map_err(connect_error)?;
                runtime.spawn(async move {
                    if let Err(e) = connection.await {
                        tracing::error!(error = %e, "PostgreSQL connection error");
                    }
                });
                client
            }
        };

        let cancel_token = client.cancel_token();
        tracing::info!("PostgreSQL connection established");
        Ok(Self {
            client: Arc::new(Mutex::new(client)),
            cancel_token,
            runtime,
            closed: AtomicBool::new(false),
        })
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
impl SqlExecutor for PostgresConnection {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("postgresql")
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        self.ensure_open()?;
        let client = self.client.lock().await;
        let result = run_execute(&client, sql, params).await?;
        tracing::debug!(affected_rows = result.affected_rows, "statement executed");
        Ok(result)
    }

    #[tracing::instrument(skip(self, sql, params), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.ensure_open()?;
        let client = self.client.lock().await;
        let result = run_query(&client, sql, params).await?;
        tracing::debug!(
            row_count = result.rows.len(),
            execution_time_ms = result.execution_time_ms,
            "query executed successfully"
        );
        Ok(result)
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(PostgresCancelHandle {
            cancel_token: self.cancel_token.clone(),
            runtime: self.runtime.clone(),
        }))
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>> {
        self.ensure_open()?;
        tracing::debug!("beginning PostgreSQL transaction");
        self.client
            .lock()
            .await
            .batch_execute("BEGIN")
            .await
            .map_err(database_error)?;

        Ok(Box::new(PostgresTransaction {
            client: Arc::clone(&self.client),
            cancel_token: self.cancel_token.clone(),
            runtime: self.runtime.clone(),
            committed: false,
            rolled_back: false,
        }))
    }

    async fn close(&self) -> Result<()> {
        tracing::info!("closing PostgreSQL connection");
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.client.try_lock().is_ok_and(|c| c.is_closed())
    }
}

/// PostgreSQL transaction wrapper.
///
/// Shares the connection's client; statements issued through the connection
/// while the transaction is open run inside it.
pub struct PostgresTransaction {
    client: Arc<Mutex<Client>>,
    cancel_token: CancelToken,
    runtime: Handle,
    committed: bool,
    rolled_back: bool,
}

impl Drop for PostgresTransaction {
    fn drop(&mut self) {
        if !self.committed && !self.rolled_back {
            tracing::warn!(
                "PostgreSQL transaction dropped without commit or rollback, issuing automatic rollback"
            );
            let client = Arc::clone(&self.client);
            self.runtime.spawn(async move {
                if let Err(e) = client.lock().await.batch_execute("ROLLBACK").await {
                    tracing::error!(error = %e, "automatic rollback on drop failed");
                }
            });
        }
    }
}

#[async_trait]
impl SqlExecutor for PostgresTransaction {
    fn driver_name(&self) -> &str {
        "postgresql"
    }

    fn dialect_id(&self) -> Option<&'static str> {
        Some("postgresql")
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing statement in PostgreSQL transaction");
        let client = self.client.lock().await;
        run_execute(&client, sql, params).await
    }

    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        tracing::debug!(sql_preview = %sql.chars().take(100).collect::<String>(), "executing query in PostgreSQL transaction");
        let client = self.client.lock().await;
        run_query(&client, sql, params).await
    }

    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        Some(Arc::new(PostgresCancelHandle {
            cancel_token: self.cancel_token.clone(),
            runtime: self.runtime.clone(),
        }))
    }
}

#[async_trait]
impl Transaction for PostgresTransaction {
    async fn commit(mut self: Box<Self>) -> Result<()> {
        if self.rolled_back {
            return Err(SchemataError::Connection(
                "Transaction already rolled back".into(),
            ));
        }
        if self.committed {
            return Err(SchemataError::Connection("Transaction already committed".into()));
        }

        self.client
            .lock()
            .await
            .batch_execute("COMMIT")
            .await
            .map_err(database_error)?;
        self.committed = true;
        tracing::debug!("PostgreSQL transaction committed");
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> Result<()> {
        if self.committed {
            return Err(SchemataError::Connection("Transaction already committed".into()));
        }
        if self.rolled_back {
            return Ok(());
        }

        self.client
            .lock()
            .await
            .batch_execute("ROLLBACK")
            .await
            .map_err(database_error)?;
        self.rolled_back = true;
        tracing::debug!("PostgreSQL transaction rolled back");
        Ok(())
    }
}

/// Prepare `sql` and bind `params` against the parameter types the server
/// inferred.
async fn bind(
    client: &Client,
    sql: &str,
    params: &[Value],
) -> Result<(tokio_postgres::Statement, Vec<PgValue>)> {
    let statement = client.prepare(sql).await.map_err(database_error)?;
    let pg_params = params
        .iter()
        .enumerate()
        .map(|(i, value)| match statement.params().get(i) {
            Some(target_type) => PgValue::from_value_for_type(value, target_type),
            None => PgValue::from_value(value),
        })
        .collect();
    Ok((statement, pg_params))
}

async fn run_execute(client: &Client, sql: &str, params: &[Value]) -> Result<StatementResult> {
    // DDL takes no parameters; the simple protocol also accepts several
    // statements and utility commands that cannot be prepared
    if params.is_empty() {
        client.batch_execute(sql).await.map_err(database_error)?;
        return Ok(StatementResult { affected_rows: 0 });
    }

    let (statement, pg_params) = bind(client, sql, params).await?;
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
    let affected_rows = client
        .execute(&statement, &param_refs)
        .await
        .map_err(database_error)?;
    Ok(StatementResult { affected_rows })
}

async fn run_query(client: &Client, sql: &str, params: &[Value]) -> Result<QueryResult> {
    let start_time = std::time::Instant::now();
    let (statement, pg_params) = bind(client, sql, params).await?;
    let param_refs: Vec<&(dyn ToSql + Sync)> =
        pg_params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

    let pg_rows = client
        .query(&statement, &param_refs)
        .await
        .map_err(database_error)?;

    // taken from the statement so empty results still carry their columns
    let columns: Vec<ColumnMeta> = statement
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, col)| ColumnMeta {
            name: col.name().to_string(),
            data_type: col.type_().name().to_string(),
            ordinal,
        })
        .collect();
    let column_names: Vec<String> = columns.iter().map(|c| c.name.clone()).collect();

    let rows = pg_rows
        .iter()
        .map(|pg_row| {
            let values = (0..column_names.len())
                .map(|idx| postgres_to_value(pg_row, idx))
                .collect();
            Row::new(column_names.clone(), values)
        })
        .collect();

    Ok(QueryResult {
        id: uuid::Uuid::new_v4(),
        columns,
        rows,
        execution_time_ms: start_time.elapsed().as_millis() as u64,
    })
}

/// Owned parameter value tokio-postgres can bind.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum PgValue {
    Null,
    Bool(bool),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(uuid::Uuid),
    Json(serde_json::Value),
    DateTimeUtc(chrono::DateTime<chrono::Utc>),
    Date(chrono::NaiveDate),
    Time(chrono::NaiveTime),
    DateTime(chrono::NaiveDateTime),
}

impl PgValue {
    /// Convert a value to the variant matching the target parameter type, so
    /// tokio-postgres writes the right binary width (4 bytes for INT4, not the
    /// 8 of an i64).
    pub(crate) fn from_value_for_type(value: &Value, target_type: &Type) -> Self {
        match value {
            Value::Int8(v) => Self::coerce_int(i64::from(*v), target_type),
            Value::Int16(v) => Self::coerce_int(i64::from(*v), target_type),
            Value::Int32(v) => Self::coerce_int(i64::from(*v), target_type),
            Value::Int64(v) => Self::coerce_int(*v, target_type),
            Value::Float32(v) => match *target_type {
                Type::FLOAT8 => PgValue::Float64(f64::from(*v)),
                _ => PgValue::Float32(*v),
            },
            Value::Float64(v) => match *target_type {
                Type::FLOAT4 => PgValue::Float32(*v as f32),
                _ => PgValue::Float64(*v),
            },
            Value::String(v) => Self::coerce_string(v, target_type),
            other => Self::from_value(other),
        }
    }

    fn coerce_int(value: i64, target_type: &Type) -> Self {
        match *target_type {
            Type::INT2 => PgValue::Int16(value as i16),
            Type::INT4 => PgValue::Int32(value as i32),
            Type::TEXT | Type::VARCHAR | Type::NAME | Type::NUMERIC => {
                PgValue::String(value.to_string())
            }
            _ => PgValue::Int64(value),
        }
    }

    /// Strings bound to typed parameters are parsed into the target type when
    /// they can be; anything else goes over as text.
    fn coerce_string(value: &str, target_type: &Type) -> Self {
        match *target_type {
            Type::JSON | Type::JSONB => serde_json::from_str::<serde_json::Value>(value)
                .map(PgValue::Json)
                .unwrap_or_else(|_| PgValue::String(value.to_string())),
            Type::UUID => uuid::Uuid::parse_str(value)
                .map(PgValue::Uuid)
                .unwrap_or_else(|_| PgValue::String(value.to_string())),
            Type::DATE => chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(PgValue::Date)
                .unwrap_or_else(|_| PgValue::String(value.to_string())),
            Type::TIME => chrono::NaiveTime::parse_from_str(value, "%H:%M:%S%.f")
                .map(PgValue::Time)
                .unwrap_or_else(|_| PgValue::String(value.to_string())),
            Type::TIMESTAMP => chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
                .map(PgValue::DateTime)
                .unwrap_or_else(|_| PgValue::String(value.to_string())),
            Type::TIMESTAMPTZ => chrono::DateTime::parse_from_rfc3339(value)
                .map(|timestamp| PgValue::DateTimeUtc(timestamp.with_timezone(&chrono::Utc)))
                .unwrap_or_else(|_| PgValue::String(value.to_string())),
            _ => PgValue::String(value.to_string()),
        }
    }

    /// Used when the statement reports no type for the parameter.
    pub(crate) fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => PgValue::Null,
            Value::Bool(v) => PgValue::Bool(*v),
            Value::Int8(v) => PgValue::Int16(i16::from(*v)),
            Value::Int16(v) => PgValue::Int16(*v),
            Value::Int32(v) => PgValue::Int32(*v),
            Value::Int64(v) => PgValue::Int64(*v),
            Value::Float32(v) => PgValue::Float32(*v),
            Value::Float64(v) => PgValue::Float64(*v),
            Value::Decimal(v) | Value::String(v) => PgValue::String(v.clone()),
            Value::Bytes(v) => PgValue::Bytes(v.clone()),
            Value::Uuid(v) => PgValue::Uuid(*v),
            Value::Json(v) => PgValue::Json(v.clone()),
            Value::DateTimeUtc(v) => PgValue::DateTimeUtc(*v),
            Value::Date(v) => PgValue::Date(*v),
            Value::Time(v) => PgValue::Time(*v),
            Value::DateTime(v) => PgValue::DateTime(*v),
            Value::Array(items) => PgValue::String(array_literal(items)),
        }
    }
}

impl ToSql for PgValue {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> std::result::Result<postgres_types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            PgValue::Null => Ok(postgres_types::IsNull::Yes),
            PgValue::Bool(v) => v.to_sql(ty, out),
            PgValue::Int16(v) => v.to_sql(ty, out),
            PgValue::Int32(v) => v.to_sql(ty, out),
            PgValue::Int64(v) => v.to_sql(ty, out),
            PgValue::Float32(v) => v.to_sql(ty, out),
            PgValue::Float64(v) => v.to_sql(ty, out),
            PgValue::String(v) => v.to_sql(ty, out),
            PgValue::Bytes(v) => v.to_sql(ty, out),
            PgValue::Uuid(v) => v.to_sql(ty, out),
            PgValue::Json(v) => v.to_sql(ty, out),
            PgValue::DateTimeUtc(v) => v.to_sql(ty, out),
            PgValue::Date(v) => v.to_sql(ty, out),
            PgValue::Time(v) => v.to_sql(ty, out),
            PgValue::DateTime(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(_: &Type) -> bool {
        true
    }

    postgres_types::to_sql_checked!();
}

/// `{"a","b",NULL}` array input text.
pub(crate) fn array_literal(items: &[Value]) -> String {
    let elements: Vec<String> = items
        .iter()
        .map(|item| match item {
            Value::Null => "NULL".to_string(),
            Value::Array(nested) => array_literal(nested),
            other => {
                let text = other.to_text().unwrap_or_default();
                format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
            }
        })
        .collect();
    format!("{{{}}}", elements.join(","))
}

/// NUMERIC read in its binary form, kept as exact decimal text.
#[derive(Debug)]
pub(crate) struct PgNumericString(pub(crate) String);

impl PgNumericString {
    pub(crate) fn parse(
        raw: &[u8],
    ) -> std::result::Result<String, Box<dyn std::error::Error + Sync + Send>> {
        if raw.len() < 8 {
            return Err("invalid NUMERIC payload: too short".into());
        }

        let ndigits = i16::from_be_bytes([raw[0], raw[1]]).max(0) as usize;
        let weight = i16::from_be_bytes([raw[2], raw[3]]);
        let sign = u16::from_be_bytes([raw[4], raw[5]]);
        let dscale = i16::from_be_bytes([raw[6], raw[7]]).max(0) as usize;

        if raw.len() < 8 + ndigits * 2 {
            return Err("invalid NUMERIC payload: truncated digits".into());
        }
        if sign == 0xC000 {
            return Ok("NaN".to_string());
        }

        let mut digits = Vec::with_capacity(ndigits);
        for index in 0..ndigits {
            let offset = 8 + index * 2;
            let group = u16::from_be_bytes([raw[offset], raw[offset + 1]]);
            if group > 9999 {
                return Err("invalid NUMERIC payload: group out of range".into());
            }
            digits.push(group);
        }
        if digits.is_empty() {
            return Ok("0".to_string());
        }

        let integer_group_count = if weight >= 0 { weight as usize + 1 } else { 0 };

        let mut integer_text = String::new();
        if integer_group_count == 0 {
            integer_text.push('0');
        } else {
            for group_index in 0..integer_group_count {
                let group = digits.get(group_index).copied().unwrap_or(0);
                if group_index == 0 {
                    integer_text.push_str(&group.to_string());
                } else {
                    integer_text.push_str(&format!("{group:04}"));
                }
            }
        }

        let mut fraction_text = String::new();
        if dscale > 0 {
            // groups between the decimal point and the first stored digit
            let leading_zero_groups = if weight < -1 {
                (-(weight as i32) - 1) as usize
            } else {
                0
            };
            fraction_text.push_str(&"0000".repeat(leading_zero_groups));
            for group in digits.iter().skip(integer_group_count.min(digits.len())) {
                fraction_text.push_str(&format!("{group:04}"));
            }
            if fraction_text.len() < dscale {
                fraction_text.push_str(&"0".repeat(dscale - fraction_text.len()));
            } else {
                fraction_text.truncate(dscale);
            }
            while fraction_text.ends_with('0') {
                fraction_text.pop();
            }
        }

        let mut output = String::new();
        if sign == 0x4000 && (integer_text != "0" || !fraction_text.is_empty()) {
            output.push('-');
        }
        output.push_str(&integer_text);
        if !fraction_text.is_empty() {
            output.push('.');
            output.push_str(&fraction_text);
        }
        Ok(output)
    }
}

impl<'a> FromSql<'a> for PgNumericString {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(Self::parse(raw)?))
    }

    fn accepts(ty: &Type) -> bool {
        *ty == Type::NUMERIC
    }
}

/// Raw UTF-8 payload of a type with no dedicated decoding (enums, `char`,
/// domains over text).
#[derive(Debug)]
struct PgFallbackString(String);

impl<'a> FromSql<'a> for PgFallbackString {
    fn from_sql(
        _: &Type,
        raw: &'a [u8],
    ) -> std::result::Result<Self, Box<dyn std::error::Error + Sync + Send>> {
        Ok(Self(String::from_utf8(raw.to_vec())?))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn get<'a, T: FromSql<'a>>(row: &'a PgRow, idx: usize) -> Option<T> {
    row.try_get::<_, Option<T>>(idx).ok().flatten()
}

/// Convert a PostgreSQL row value to a [`Value`]. Values that fail to decode
/// read as NULL.
fn postgres_to_value(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_().name();

    let value = match type_name {
        "bool" => get::<bool>(row, idx).map(Value::Bool),
        "char" => get::<i8>(row, idx).map(|c| Value::String((c as u8 as char).to_string())),
        "int2" => get::<i16>(row, idx).map(Value::Int16),
        "int4" => get::<i32>(row, idx).map(Value::Int32),
        "int8" => get::<i64>(row, idx).map(Value::Int64),
        "oid" => get::<u32>(row, idx).map(|v| Value::Int64(i64::from(v))),
        "float4" => get::<f32>(row, idx).map(Value::Float32),
        "float8" => get::<f64>(row, idx).map(Value::Float64),
        "text" | "varchar" | "bpchar" | "name" => get::<String>(row, idx).map(Value::String),
        "bytea" => get::<Vec<u8>>(row, idx).map(Value::Bytes),
        "uuid" => get::<uuid::Uuid>(row, idx).map(Value::Uuid),
        "json" | "jsonb" => get::<serde_json::Value>(row, idx).map(Value::Json),
        "date" => get::<chrono::NaiveDate>(row, idx).map(Value::Date),
        "time" => get::<chrono::NaiveTime>(row, idx).map(Value::Time),
        "timestamp" => get::<chrono::NaiveDateTime>(row, idx).map(Value::DateTime),
        "timestamptz" => get::<chrono::DateTime<chrono::Utc>>(row, idx).map(Value::DateTimeUtc),
        "numeric" => get::<PgNumericString>(row, idx).map(|v| Value::Decimal(v.0)),
        // array type names carry a leading underscore
        "_text" | "_varchar" | "_bpchar" | "_name" => get::<Vec<Option<String>>>(row, idx)
            .map(|items| Value::Array(items.into_iter().map(Value::from).collect())),
        "_int2" => get::<Vec<Option<i16>>>(row, idx).map(|items| {
            Value::Array(
                items
                    .into_iter()
                    .map(|v| v.map(Value::Int16).unwrap_or(Value::Null))
                    .collect(),
            )
        }),
        "_int4" => get::<Vec<Option<i32>>>(row, idx).map(|items| {
            Value::Array(
                items
                    .into_iter()
                    .map(|v| v.map(Value::Int32).unwrap_or(Value::Null))
                    .collect(),
            )
        }),
        "_int8" => get::<Vec<Option<i64>>>(row, idx)
            .map(|items| Value::Array(items.into_iter().map(Value::from).collect())),
        "_bool" => get::<Vec<Option<bool>>>(row, idx).map(|items| {
            Value::Array(
                items
                    .into_iter()
                    .map(|v| v.map(Value::Bool).unwrap_or(Value::Null))
                    .collect(),
            )
        }),
        _ => get::<PgFallbackString>(row, idx).map(|v| Value::String(v.0)),
    };

    value.unwrap_or(Value::Null)
}
