//! Typed error type for the db crate.

use adapters::AdapterError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("cannot decode column '{column}' of type {type_name}")]
    Decode { column: String, type_name: String },
}

impl From<DbError> for AdapterError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Sqlx(sqlx::Error::Database(db)) => AdapterError::Invocation(db.message().to_string()),
            DbError::Sqlx(e @ (sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::PoolTimedOut)) => {
                AdapterError::Connection(e.to_string())
            }
            DbError::Sqlx(e) => AdapterError::Invocation(e.to_string()),
            other @ DbError::Decode { .. } => AdapterError::Protocol(other.to_string()),
        }
    }
}
