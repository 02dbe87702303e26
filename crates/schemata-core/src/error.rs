//! Error types for Schemata

use thiserror::Error;

/// Boxed error raised by an underlying SQL client library.
pub type DatabaseError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Core error type for Schemata operations
#[derive(Error, Debug)]
pub enum SchemataError {
    /// Invalid default setting, malformed override shorthand, unregistered dialect.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Forward or reverse type resolution failed. The message names the type.
    #[error("Type mapping error: {0}")]
    TypeMapping(String),

    /// The request is structurally invalid for the model or the dialect.
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Cancelled")]
    Cancelled,

    /// Error raised by the SQL execution layer, passed through untouched.
    #[error(transparent)]
    Database(DatabaseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SchemataError {
    /// Wrap a native client error without translating it.
    pub fn database<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        SchemataError::Database(Box::new(error))
    }

    /// Borrow the native client error if this is a `Database` error of type `E`.
    ///
    /// ```ignore
    /// if let Some(pg) = err.downcast_database_ref::<tokio_postgres::Error>() {
    ///     // branch on SQLSTATE
    /// }
    /// ```
    pub fn downcast_database_ref<E>(&self) -> Option<&E>
    where
        E: std::error::Error + 'static,
    {
        match self {
            SchemataError::Database(inner) => inner.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SchemataError::Cancelled)
    }
}

/// Result type alias for Schemata operations
pub type Result<T> = std::result::Result<T, SchemataError>;
