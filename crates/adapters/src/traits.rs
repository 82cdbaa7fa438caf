//! Transport contracts: what an external protocol must provide.
//!
//! Each protocol splits into a factory (`*Transport`) that opens a session
//! from connection credentials and the session itself, which performs exactly
//! the calls of one step and is then closed. Sessions are never shared across
//! steps.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::{AdapterError, DbConnection, RfcConnection};

/// Flat name → value map used for call inputs and step results.
pub type ResultMap = Map<String, Value>;

/// Opens sessions against an RFC endpoint.
#[async_trait]
pub trait RfcTransport: Send + Sync {
    async fn open(&self, connection: &RfcConnection) -> Result<Box<dyn RfcSession>, AdapterError>;
}

/// One logged-on RFC session.
#[async_trait]
pub trait RfcSession: Send {
    /// Invoke `function` with the given import parameters and return export
    /// and table parameters merged into one map.
    async fn call(&mut self, function: &str, imports: &ResultMap) -> Result<ResultMap, AdapterError>;

    /// Release the session. Called exactly once by the adapter.
    async fn close(self: Box<Self>) -> Result<(), AdapterError>;
}

/// Raw outcome of one executed SQL statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlOutcome {
    /// Returned rows, each keyed by column name.
    pub rows: Vec<ResultMap>,
    /// Row count from the server's command tags: rows touched by a
    /// data-modifying statement, rows returned by a query.
    pub rows_affected: u64,
}

/// Opens database sessions.
#[async_trait]
pub trait SqlTransport: Send + Sync {
    async fn connect(&self, connection: &DbConnection) -> Result<Box<dyn SqlSession>, AdapterError>;
}

/// One open database session.
#[async_trait]
pub trait SqlSession: Send {
    async fn execute(&mut self, statement: &str) -> Result<SqlOutcome, AdapterError>;

    /// Release the session. Called exactly once by the adapter.
    async fn close(self: Box<Self>) -> Result<(), AdapterError>;
}
