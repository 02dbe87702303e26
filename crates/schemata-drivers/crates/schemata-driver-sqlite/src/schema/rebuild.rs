//! Running a table rebuild
//!
//! Dropping the old table fires the implicit `DELETE` of every referencing
//! foreign key, so enforcement is switched off for the rebuild and the result
//! checked afterwards. `foreign_keys` cannot change inside a transaction; in
//! that case a rebuild is only allowed when no other table references this one.
//! The statements run inside a savepoint and leave nothing behind on failure.

use schemata_core::{
    CancellationToken, Result, SchemataError, SqlExecutor, Value, cancellation,
};

pub(super) async fn run(
    db: &dyn SqlExecutor,
    table_name: &str,
    statements: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    cancellation::check(cancel)?;

    let enforced = foreign_keys_enabled(db, cancel).await?;
    if enforced {
        cancellation::execute(db, "PRAGMA foreign_keys = OFF", &[], cancel).await?;
    }
    cancellation::execute(db, "PRAGMA legacy_alter_table = ON", &[], cancel).await?;

    let result = rebuild(db, table_name, statements, cancel).await;

    if let Err(e) = db.execute("PRAGMA legacy_alter_table = OFF", &[]).await {
        tracing::warn!(error = %e, "failed to reset legacy_alter_table");
    }
    if enforced && let Err(e) = db.execute("PRAGMA foreign_keys = ON", &[]).await {
        tracing::warn!(error = %e, "failed to re-enable foreign keys");
    }
    result
}

async fn rebuild(
    db: &dyn SqlExecutor,
    table_name: &str,
    statements: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    // still on means a transaction is open and the PRAGMA was ignored
    if foreign_keys_enabled(db, cancel).await? && is_referenced(db, table_name, cancel).await? {
        return Err(SchemataError::NotSupported(format!(
            "table '{}' is referenced by other tables and cannot be rebuilt inside a transaction",
            table_name
        )));
    }

    tracing::debug!(table = %table_name, statements = statements.len(), "rebuilding sqlite table");
    cancellation::execute(db, "SAVEPOINT schemata_rebuild", &[], cancel).await?;
    let result = rebuild_and_check(db, table_name, statements, cancel).await;
    match &result {
        Ok(()) => {
            db.execute("RELEASE schemata_rebuild", &[]).await?;
        }
        Err(_) => {
            if let Err(e) = db.execute("ROLLBACK TO schemata_rebuild", &[]).await {
                tracing::warn!(error = %e, "failed to roll back table rebuild");
            }
            if let Err(e) = db.execute("RELEASE schemata_rebuild", &[]).await {
                tracing::warn!(error = %e, "failed to release rebuild savepoint");
            }
        }
    }
    result
}

async fn rebuild_and_check(
    db: &dyn SqlExecutor,
    table_name: &str,
    statements: &[String],
    cancel: &CancellationToken,
) -> Result<()> {
    cancellation::execute_all(db, statements, cancel).await?;

    let violations = cancellation::query(
        db,
        "SELECT \"table\", rowid, parent FROM pragma_foreign_key_check(?1)",
        &[Value::from(table_name)],
        cancel,
    )
    .await?;
    if let Some(row) = violations.rows.first() {
        return Err(SchemataError::Schema(format!(
            "rebuilding '{}' left {} foreign key violation(s), first against '{}'",
            table_name,
            violations.rows.len(),
            row.text_or_empty("parent")
        )));
    }
    Ok(())
}

async fn foreign_keys_enabled(db: &dyn SqlExecutor, cancel: &CancellationToken) -> Result<bool> {
    let result = cancellation::query(db, "PRAGMA foreign_keys", &[], cancel).await?;
    Ok(result.scalar().and_then(Value::as_bool).unwrap_or(false))
}

async fn is_referenced(
    db: &dyn SqlExecutor,
    table_name: &str,
    cancel: &CancellationToken,
) -> Result<bool> {
    let result = cancellation::query(
        db,
        "SELECT m.name FROM sqlite_master m \
         JOIN pragma_foreign_key_list(m.name) f \
         WHERE m.type = 'table' AND f.\"table\" = ?1 COLLATE NOCASE AND m.name <> ?1 \
         LIMIT 1",
        &[Value::from(table_name)],
        cancel,
    )
    .await?;
    Ok(result.has_rows())
}
