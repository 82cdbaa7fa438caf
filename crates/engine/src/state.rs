//! Per-run execution state and the tracker that publishes it.

use adapters::ResultMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::watch;
use uuid::Uuid;

use crate::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionLog {
    pub fn new(level: LogLevel, message: impl Into<String>, details: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            details,
        }
    }
}

/// Observable state of one run.
///
/// `current_step_index` is the 0-based index of the last step attempted;
/// `results.len()` is how many steps completed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionState {
    pub run_id: Option<Uuid>,
    pub is_running: bool,
    pub current_step_index: Option<usize>,
    pub logs: Vec<ExecutionLog>,
    pub results: Vec<ResultMap>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionState {
    pub fn completed_steps(&self) -> usize {
        self.results.len()
    }

    /// Finished without an error.
    pub fn succeeded(&self) -> bool {
        !self.is_running && self.error.is_none()
    }
}

/// Live [`ExecutionState`] holder.
///
/// The engine writes through it during a run; any number of observers can
/// [`subscribe`](Self::subscribe) and read the evolving state without
/// blocking the run. One tracker drives at most one run at a time; use a
/// separate tracker per concurrent run.
#[derive(Debug)]
pub struct ExecutionTracker {
    tx: watch::Sender<ExecutionState>,
}

impl Default for ExecutionTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionTracker {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(ExecutionState::default());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> ExecutionState {
        self.tx.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.tx.borrow().is_running
    }

    /// Drop the accumulated logs. Rejected while a run is in progress.
    pub fn clear_logs(&self) -> Result<(), EngineError> {
        let mut busy = false;
        self.tx.send_if_modified(|state| {
            if state.is_running {
                busy = true;
                return false;
            }
            state.logs.clear();
            true
        });
        if busy {
            Err(EngineError::RunInProgress)
        } else {
            Ok(())
        }
    }

    /// Reset to a fresh running state for `run_id`. Returns `false` (and
    /// changes nothing) if a run is already in progress.
    pub(crate) fn begin(&self, run_id: Uuid) -> bool {
        self.tx.send_if_modified(|state| {
            if state.is_running {
                return false;
            }
            *state = ExecutionState {
                run_id: Some(run_id),
                is_running: true,
                ..ExecutionState::default()
            };
            true
        })
    }

    pub(crate) fn update(&self, f: impl FnOnce(&mut ExecutionState)) {
        self.tx.send_modify(f);
    }
}
