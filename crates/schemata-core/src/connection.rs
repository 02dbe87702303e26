//! Connection, transaction and executor traits

use crate::{QueryResult, Result, StatementResult, Value};
use async_trait::async_trait;
use std::sync::Arc;

/// Handle for cancelling a running statement from any thread.
///
/// Safe to call repeatedly; calls with nothing running are no-ops.
pub trait QueryCancelHandle: Send + Sync {
    fn cancel(&self);
}

/// Anything that can run SQL: an open connection or a transaction on one.
///
/// Every schema operation takes `&dyn SqlExecutor`, so callers pick whether DDL
/// runs inside their own transaction.
#[async_trait]
pub trait SqlExecutor: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Dialect identifier used by the schema driver registry. `None` means the
    /// executor does not know which dialect it speaks.
    fn dialect_id(&self) -> Option<&'static str> {
        None
    }

    /// Execute a statement that returns no rows (DDL, INSERT/UPDATE/DELETE)
    async fn execute(&self, sql: &str, params: &[Value]) -> Result<StatementResult>;

    /// Execute a query that returns rows
    async fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Get a handle that can be used to cancel the running statement.
    ///
    /// Returns `None` if the driver does not support cancellation.
    fn cancel_handle(&self) -> Option<Arc<dyn QueryCancelHandle>> {
        None
    }
}

/// A database connection
#[async_trait]
pub trait Connection: SqlExecutor {
    /// Begin a transaction
    async fn begin_transaction(&self) -> Result<Box<dyn Transaction>>;

    /// Close the connection
    async fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}

/// A database transaction
#[async_trait]
pub trait Transaction: SqlExecutor {
    /// Commit the transaction
    async fn commit(self: Box<Self>) -> Result<()>;

    /// Rollback the transaction
    async fn rollback(self: Box<Self>) -> Result<()>;
}
