//! `adapters` crate: transport contracts and the two call adapters.
//!
//! Every external system a step can reach is spoken to through a transport
//! trait defined in [`traits`]. The engine never talks to a transport
//! directly; it goes through [`RemoteCallAdapter`] or [`SqlCallAdapter`],
//! which own session lifetime and timeouts.

pub mod connection;
pub mod error;
pub mod http_rfc;
pub mod mock;
pub mod rfc;
pub mod sql;
pub mod traits;

pub use connection::{ConnectionRegistry, DbConnection, RfcConnection};
pub use error::AdapterError;
pub use rfc::RemoteCallAdapter;
pub use sql::{build_statement, SqlCallAdapter};
pub use traits::{ResultMap, RfcSession, RfcTransport, SqlOutcome, SqlSession, SqlTransport};
