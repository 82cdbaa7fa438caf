//! Log sinks: where execution log entries go besides the tracked state.

use tracing::{error, info, warn};

use crate::state::{ExecutionLog, LogLevel};

/// Receives every [`ExecutionLog`] entry as it is produced.
pub trait LogSink: Send + Sync {
    fn emit(&self, log: &ExecutionLog);
}

/// Re-emits entries as `tracing` events. `success` maps to `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn emit(&self, log: &ExecutionLog) {
        let details = log.details.as_ref().map(ToString::to_string).unwrap_or_default();
        match log.level {
            LogLevel::Info => info!(details = %details, "{}", log.message),
            LogLevel::Success => info!(details = %details, outcome = "success", "{}", log.message),
            LogLevel::Warning => warn!(details = %details, "{}", log.message),
            LogLevel::Error => error!(details = %details, "{}", log.message),
        }
    }
}
