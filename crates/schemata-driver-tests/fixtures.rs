//! Connections and schema drivers for parameterised scenario tests.
//!
//! Tests name a [`TestDialect`] through rstest cases and ask for a
//! [`TestDatabase`]. A server dialect without a configured connection yields
//! `None` and the test returns early:
//!
//! ```rust,ignore
//! #[rstest]
//! #[case::sqlite(TestDialect::Sqlite)]
//! #[case::postgres(TestDialect::Postgres)]
//! #[tokio::test]
//! async fn test_something(#[case] dialect: TestDialect) -> anyhow::Result<()> {
//!     let Some(db) = test_database(dialect).await? else {
//!         return Ok(());
//!     };
//!     // ...
//!     Ok(())
//! }
//! ```
//!
//! A connection comes from `SCHEMATA_TEST_{POSTGRES,MYSQL,MSSQL}_URL` when set,
//! otherwise from a Docker container when `SCHEMATA_TEST_CONTAINERS=1`.

use crate::test_containers::{mssql_container, mysql_container, postgres_container};
use anyhow::{Context, Result};
use schemata_core::{
    ConnectionConfig, Dialect, DialectSchema, SchemaDriver, SqlExecutor, TableMethods,
};
use schemata_drivers::mssql::MssqlConnection;
use schemata_drivers::mysql::MySqlConnection;
use schemata_drivers::postgres::PostgresConnection;
use schemata_drivers::sqlite::SqliteConnection;
use schemata_drivers::{CancellationToken, SchemaDriverRegistry};
use std::env;
use std::sync::{Arc, Once};
use std::time::Duration;

/// Dialect identifier for parameterised testing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestDialect {
    Sqlite,
    Postgres,
    Mysql,
    Mssql,
}

impl TestDialect {
    pub fn dialect(&self) -> Dialect {
        match self {
            TestDialect::Sqlite => Dialect::Sqlite,
            TestDialect::Postgres => Dialect::PostgreSql,
            TestDialect::Mysql => Dialect::MySql,
            TestDialect::Mssql => Dialect::SqlServer,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TestDialect::Sqlite => "sqlite",
            TestDialect::Postgres => "postgres",
            TestDialect::Mysql => "mysql",
            TestDialect::Mssql => "mssql",
        }
    }

    /// Environment variable holding a connection URL, for server dialects
    pub fn url_var(&self) -> Option<&'static str> {
        match self {
            TestDialect::Sqlite => None,
            TestDialect::Postgres => Some("SCHEMATA_TEST_POSTGRES_URL"),
            TestDialect::Mysql => Some("SCHEMATA_TEST_MYSQL_URL"),
            TestDialect::Mssql => Some("SCHEMATA_TEST_MSSQL_URL"),
        }
    }
}

static TRACING: Once = Once::new();

/// Route `tracing` output through the test harness, filtered by `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// The schema driver for a dialect, from a registry with every built-in driver.
pub fn schema_driver(dialect: TestDialect) -> Result<Arc<dyn SchemaDriver>> {
    SchemaDriverRegistry::with_defaults()
        .driver(&dialect.dialect())
        .with_context(|| format!("no schema driver for {}", dialect.name()))
}

/// A live connection with the schema driver dispatched for it
pub struct TestDatabase {
    pub dialect: TestDialect,
    pub driver: Arc<dyn SchemaDriver>,
    pub cancel: CancellationToken,
    conn: Box<dyn SqlExecutor>,
    created: parking_lot::Mutex<Vec<String>>,
}

impl TestDatabase {
    pub fn db(&self) -> &dyn SqlExecutor {
        self.conn.as_ref()
    }

    /// A table name no other test uses; dropped again by [`cleanup`](Self::cleanup).
    pub fn table_name(&self, prefix: &str) -> String {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!("{}_{}", prefix, &suffix[..8]);
        self.track(&name);
        name
    }

    /// Include a table, e.g. the new name after a rename, in the cleanup.
    pub fn track(&self, table_name: &str) {
        self.created.lock().push(table_name.to_string());
    }

    /// Number of rows in a table
    pub async fn count(&self, table_name: &str) -> Result<i64> {
        let sql = format!(
            "SELECT COUNT(*) AS n FROM {}",
            self.driver.quote_identifier(table_name)
        );
        let result = self.db().query(&sql, &[]).await?;
        result
            .rows
            .first()
            .and_then(|row| row.int("n"))
            .context("COUNT(*) returned no row")
    }

    /// Drop every table handed out by [`table_name`](Self::table_name),
    /// newest first so referencing tables go before the ones they reference.
    pub async fn cleanup(&self) -> Result<()> {
        let names: Vec<String> = self.created.lock().drain(..).rev().collect();
        let cancel = CancellationToken::new();
        for name in names {
            self.driver
                .drop_table_if_exists(self.db(), None, &name, &cancel)
                .await
                .with_context(|| format!("failed to drop {}", name))?;
        }
        Ok(())
    }
}

/// Connect to a dialect, or `None` when the server dialect is not configured.
pub async fn test_database(dialect: TestDialect) -> Result<Option<TestDatabase>> {
    init_tracing();

    let conn: Box<dyn SqlExecutor> = match dialect {
        TestDialect::Sqlite => Box::new(SqliteConnection::open(":memory:")?),
        _ => {
            let Some(config) = server_config(dialect).await? else {
                tracing::info!(dialect = dialect.name(), "no server configured, skipping");
                return Ok(None);
            };
            connect_with_retry(dialect, &config).await?
        }
    };

    let driver = SchemaDriverRegistry::with_defaults()
        .driver_for(conn.as_ref())
        .context("no schema driver for the test connection")?;

    Ok(Some(TestDatabase {
        dialect,
        driver,
        cancel: CancellationToken::new(),
        conn,
        created: parking_lot::Mutex::new(Vec::new()),
    }))
}

fn use_containers() -> bool {
    env::var("SCHEMATA_TEST_CONTAINERS")
        .ok()
        .and_then(|v| v.parse::<u8>().ok())
        .map(|v| v != 0)
        .unwrap_or(false)
}

async fn server_config(dialect: TestDialect) -> Result<Option<ConnectionConfig>> {
    if let Some(var) = dialect.url_var()
        && let Ok(url) = env::var(var)
        && !url.trim().is_empty()
    {
        let config = ConnectionConfig::from_url(url.trim())
            .with_context(|| format!("invalid {}", var))?;
        return Ok(Some(config));
    }

    if !use_containers() {
        return Ok(None);
    }

    let info = match dialect {
        TestDialect::Sqlite => return Ok(None),
        TestDialect::Postgres => postgres_container().await,
        TestDialect::Mysql => mysql_container().await,
        TestDialect::Mssql => mssql_container().await,
    }
    .with_context(|| format!("failed to start {} container - is Docker running?", dialect.name()))?;
    Ok(Some(info.connection_config()))
}

async fn connect(dialect: TestDialect, config: &ConnectionConfig) -> Result<Box<dyn SqlExecutor>> {
    let conn: Box<dyn SqlExecutor> = match dialect {
        TestDialect::Sqlite => Box::new(SqliteConnection::connect(config)?),
        TestDialect::Postgres => Box::new(PostgresConnection::connect(config).await?),
        TestDialect::Mysql => Box::new(MySqlConnection::connect(config).await?),
        TestDialect::Mssql => Box::new(MssqlConnection::connect(config).await?),
    };
    Ok(conn)
}

/// Freshly started containers accept TCP a little before they accept logins.
async fn connect_with_retry(
    dialect: TestDialect,
    config: &ConnectionConfig,
) -> Result<Box<dyn SqlExecutor>> {
    const MAX_ATTEMPTS: u32 = 8;

    let mut attempt = 1;
    loop {
        match connect(dialect, config).await {
            Ok(conn) => return Ok(conn),
            Err(e) if attempt < MAX_ATTEMPTS => {
                let delay = Duration::from_secs(u64::from(attempt));
                tracing::warn!(
                    dialect = dialect.name(),
                    attempt,
                    delay_secs = delay.as_secs(),
                    "connection failed, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                return Err(e.context(format!(
                    "failed to connect to {} after {} attempts",
                    dialect.name(),
                    MAX_ATTEMPTS
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dialects_match_their_drivers() {
        for dialect in [
            TestDialect::Sqlite,
            TestDialect::Postgres,
            TestDialect::Mysql,
            TestDialect::Mssql,
        ] {
            assert_eq!(schema_driver(dialect).unwrap().dialect(), dialect.dialect());
        }
    }

    #[tokio::test]
    async fn test_sqlite_is_always_available() {
        let db = test_database(TestDialect::Sqlite).await.unwrap().unwrap();
        assert_eq!(db.driver.dialect(), Dialect::Sqlite);
        let name = db.table_name("sample");
        assert!(name.starts_with("sample_"));
        assert_eq!(name.len(), "sample_".len() + 8);
    }
}
