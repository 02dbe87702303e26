//! Cooperative cancellation around statement execution
//!
//! Every statement a schema operation issues goes through [`execute`] or
//! [`query`]. The token is checked before any I/O, then raced against the
//! statement. When the token wins, the connection's [`QueryCancelHandle`] is
//! fired so the server stops work too, and the call reports
//! [`SchemataError::Cancelled`].
//!
//! [`QueryCancelHandle`]: crate::QueryCancelHandle

use crate::{QueryResult, Result, SchemataError, SqlExecutor, StatementResult, Value};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Fail with `Cancelled` if the token has fired.
pub fn check(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(SchemataError::Cancelled)
    } else {
        Ok(())
    }
}

pub async fn execute(
    db: &dyn SqlExecutor,
    sql: &str,
    params: &[Value],
    cancel: &CancellationToken,
) -> Result<StatementResult> {
    check(cancel)?;
    tracing::debug!(
        driver = db.driver_name(),
        sql_preview = %sql.chars().take(100).collect::<String>(),
        "executing statement"
    );
    race(db, db.execute(sql, params), cancel).await
}

pub async fn query(
    db: &dyn SqlExecutor,
    sql: &str,
    params: &[Value],
    cancel: &CancellationToken,
) -> Result<QueryResult> {
    check(cancel)?;
    tracing::trace!(
        driver = db.driver_name(),
        sql_preview = %sql.chars().take(100).collect::<String>(),
        "querying catalog"
    );
    race(db, db.query(sql, params), cancel).await
}

/// Run several statements in order, stopping at the first failure.
pub async fn execute_all(
    db: &dyn SqlExecutor,
    statements: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    for sql in statements {
        execute(db, sql, &[], cancel).await?;
    }
    Ok(())
}

async fn race<T>(
    db: &dyn SqlExecutor,
    statement: impl Future<Output = Result<T>>,
    cancel: &CancellationToken,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            if let Some(handle) = db.cancel_handle() {
                handle.cancel();
            }
            tracing::debug!(driver = db.driver_name(), "statement cancelled");
            Err(SchemataError::Cancelled)
        }
        result = statement => result,
    }
}
