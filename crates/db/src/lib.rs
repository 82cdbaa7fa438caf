//! `db` crate: PostgreSQL implementation of the SQL transport.
//!
//! Opens one connection per statement, executes it, and decodes the returned
//! rows into JSON objects. No pooling: every SQL step gets its own session.

pub mod error;
pub mod rows;
pub mod transport;

pub use error::DbError;
pub use transport::PgSqlTransport;
