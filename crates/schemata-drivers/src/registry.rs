//! Dialect dispatch for schema drivers

use parking_lot::RwLock;
use schemata_core::{Dialect, Result, SchemaDriver, SchemataError, SqlExecutor};
use std::collections::HashMap;
use std::sync::Arc;

/// Builds the schema driver for one dialect. Called at most once per dialect
/// per registry.
pub type DriverFactory = Arc<dyn Fn() -> Arc<dyn SchemaDriver> + Send + Sync>;

/// Maps dialects to their schema drivers.
///
/// Drivers are created lazily on first lookup and then shared by every caller
/// of the same registry.
pub struct SchemaDriverRegistry {
    factories: HashMap<Dialect, DriverFactory>,
    instances: RwLock<HashMap<Dialect, Arc<dyn SchemaDriver>>>,
}

impl SchemaDriverRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Create a registry with every built-in driver enabled by features
    pub fn with_defaults() -> Self {
        #[allow(unused_mut)]
        let mut registry = Self::new();

        #[cfg(feature = "sqlite")]
        registry.register(Dialect::Sqlite, || {
            Arc::new(crate::sqlite::SqliteSchema::new())
        });
        #[cfg(feature = "postgres")]
        registry.register(Dialect::PostgreSql, || {
            Arc::new(crate::postgres::PostgresSchema::new())
        });
        #[cfg(feature = "mysql")]
        registry.register(Dialect::MySql, || {
            Arc::new(crate::mysql::MySqlSchema::new())
        });
        #[cfg(feature = "mssql")]
        registry.register(Dialect::SqlServer, || {
            Arc::new(crate::mssql::MssqlSchema::new())
        });

        registry
    }

    /// Register a driver factory, replacing any earlier one for the dialect.
    pub fn register<F>(&mut self, dialect: Dialect, factory: F)
    where
        F: Fn() -> Arc<dyn SchemaDriver> + Send + Sync + 'static,
    {
        tracing::info!(dialect = %dialect, "registering schema driver");
        self.instances.get_mut().remove(&dialect);
        self.factories.insert(dialect, Arc::new(factory));
    }

    /// The driver for a dialect, created on first use.
    pub fn driver(&self, dialect: &Dialect) -> Option<Arc<dyn SchemaDriver>> {
        if let Some(driver) = self.instances.read().get(dialect) {
            return Some(driver.clone());
        }

        let Some(factory) = self.factories.get(dialect) else {
            tracing::warn!(dialect = %dialect, "schema driver not found in registry");
            return None;
        };

        let mut instances = self.instances.write();
        let driver = instances
            .entry(dialect.clone())
            .or_insert_with(|| {
                tracing::debug!(dialect = %dialect, "creating schema driver");
                factory()
            })
            .clone();
        Some(driver)
    }

    /// The driver for whatever dialect a connection speaks.
    pub fn driver_for(&self, db: &dyn SqlExecutor) -> Result<Arc<dyn SchemaDriver>> {
        let Some(id) = db.dialect_id() else {
            return Err(SchemataError::Configuration(format!(
                "connection driver '{}' does not report a SQL dialect",
                db.driver_name()
            )));
        };

        let dialect: Dialect = id.parse().map_err(|_| {
            SchemataError::Configuration(format!(
                "connection driver '{}' reports an invalid dialect '{}'",
                db.driver_name(),
                id
            ))
        })?;

        self.driver(&dialect).ok_or_else(|| {
            SchemataError::Configuration(format!(
                "no schema driver registered for dialect '{}' (connection driver '{}')",
                dialect,
                db.driver_name()
            ))
        })
    }

    /// Registered dialects, sorted
    pub fn dialects(&self) -> Vec<Dialect> {
        let mut dialects: Vec<Dialect> = self.factories.keys().cloned().collect();
        dialects.sort();
        dialects
    }

    /// Check if a dialect has a driver
    pub fn has(&self, dialect: &Dialect) -> bool {
        self.factories.contains_key(dialect)
    }
}

impl Default for SchemaDriverRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for SchemaDriverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaDriverRegistry")
            .field("dialects", &self.dialects())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use schemata_core::{DialectSchema, QueryResult, StatementResult, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeConnection {
        driver_name: &'static str,
        dialect_id: Option<&'static str>,
    }

    impl FakeConnection {
        fn new(driver_name: &'static str, dialect_id: Option<&'static str>) -> Self {
            Self {
                driver_name,
                dialect_id,
            }
        }
    }

    #[async_trait]
    impl SqlExecutor for FakeConnection {
        fn driver_name(&self) -> &str {
            self.driver_name
        }

        fn dialect_id(&self) -> Option<&'static str> {
            self.dialect_id
        }

        async fn execute(&self, _sql: &str, _params: &[Value]) -> Result<StatementResult> {
            Ok(StatementResult { affected_rows: 0 })
        }

        async fn query(&self, _sql: &str, _params: &[Value]) -> Result<QueryResult> {
            Ok(QueryResult::empty())
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = SchemaDriverRegistry::new();
        assert!(registry.dialects().is_empty());
        assert!(registry.driver(&Dialect::Sqlite).is_none());
    }

    #[cfg(all(feature = "sqlite", feature = "postgres", feature = "mysql", feature = "mssql"))]
    #[test]
    fn test_defaults_cover_built_in_dialects() {
        let registry = SchemaDriverRegistry::with_defaults();
        assert_eq!(registry.dialects(), {
            let mut expected = Dialect::BUILT_IN.to_vec();
            expected.sort();
            expected
        });
        for dialect in Dialect::BUILT_IN {
            let driver = registry.driver(&dialect).expect("built-in driver");
            assert_eq!(driver.dialect(), dialect);
        }
    }

    #[cfg(all(feature = "sqlite", feature = "postgres", feature = "mysql", feature = "mssql"))]
    #[test]
    fn test_dispatch_follows_dialect_id_aliases() {
        let registry = SchemaDriverRegistry::default();
        let cases = [
            ("sqlite", "sqlite3", Dialect::Sqlite),
            ("postgres", "pg", Dialect::PostgreSql),
            ("mariadb", "mariadb", Dialect::MySql),
            ("mssql", "sqlserver", Dialect::SqlServer),
        ];
        for (driver_name, dialect_id, expected) in cases {
            let db = FakeConnection::new(driver_name, Some(dialect_id));
            let driver = registry.driver_for(&db).expect("dispatch");
            assert_eq!(driver.dialect(), expected, "{}", dialect_id);
        }
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_driver_is_created_once() {
        let created = Arc::new(AtomicUsize::new(0));
        let mut registry = SchemaDriverRegistry::new();
        let counter = created.clone();
        registry.register(Dialect::Sqlite, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(crate::sqlite::SqliteSchema::new())
        });

        let db = FakeConnection::new("sqlite", Some("sqlite"));
        let first = registry.driver_for(&db).unwrap();
        let second = registry.driver_for(&db).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unknown_dialect_names_the_connection_driver() {
        let registry = SchemaDriverRegistry::new();
        let db = FakeConnection::new("duckdb-native", Some("duckdb"));

        let err = registry.driver_for(&db).err().expect("no driver registered");
        assert!(matches!(err, SchemataError::Configuration(_)));
        assert!(err.to_string().contains("duckdb-native"), "{}", err);
    }

    #[test]
    fn test_missing_dialect_id_is_a_configuration_error() {
        let registry = SchemaDriverRegistry::with_defaults();
        let db = FakeConnection::new("redis", None);

        let err = registry.driver_for(&db).err().expect("no dialect");
        assert!(matches!(err, SchemataError::Configuration(_)));
        assert!(err.to_string().contains("redis"), "{}", err);
    }

    #[test]
    fn test_blank_dialect_id_is_a_configuration_error() {
        let registry = SchemaDriverRegistry::with_defaults();
        let db = FakeConnection::new("odbc", Some("  "));

        let err = registry.driver_for(&db).err().expect("blank dialect");
        assert!(matches!(err, SchemataError::Configuration(_)));
        assert!(err.to_string().contains("odbc"), "{}", err);
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_register_other_dialect() {
        let mut registry = SchemaDriverRegistry::new();
        let duckdb = Dialect::Other("duckdb".into());
        registry.register(duckdb.clone(), || {
            Arc::new(crate::sqlite::SqliteSchema::new())
        });

        assert!(registry.has(&duckdb));
        let db = FakeConnection::new("duckdb", Some("DuckDB"));
        assert!(registry.driver_for(&db).is_ok());
    }

    #[cfg(feature = "sqlite")]
    #[test]
    fn test_register_replaces_cached_driver() {
        let mut registry = SchemaDriverRegistry::new();
        registry.register(Dialect::Sqlite, || {
            Arc::new(crate::sqlite::SqliteSchema::new())
        });
        let before = registry.driver(&Dialect::Sqlite).unwrap();

        registry.register(Dialect::Sqlite, || {
            Arc::new(crate::sqlite::SqliteSchema::new())
        });
        let after = registry.driver(&Dialect::Sqlite).unwrap();

        assert!(!Arc::ptr_eq(&before, &after));
    }
}
