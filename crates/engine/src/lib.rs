//! `engine` crate: interface model, parameter resolution, validation, and
//! the interface execution engine.

pub mod error;
pub mod executor;
pub mod models;
pub mod params;
pub mod resolver;
pub mod sink;
pub mod state;
pub mod validate;

pub use error::{ConnectionKind, EngineError};
pub use executor::{Connections, ExecutorConfig, InterfaceExecutor, ReferenceMode};
pub use models::{Catalog, InterfaceDefinition, RpcFunctionInfo, RpcParameter, SqlInfo, Step, StepType};
pub use params::ParamExpr;
pub use resolver::{resolve, Resolution};
pub use sink::{LogSink, TracingLogSink};
pub use state::{ExecutionLog, ExecutionState, ExecutionTracker, LogLevel};
pub use validate::{validate_interface, ValidationReport};
