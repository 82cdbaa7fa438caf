//! Interface execution engine.
//!
//! `InterfaceExecutor` is the central orchestrator:
//! 1. Resets the tracker and logs the run start.
//! 2. Walks the steps in list order, publishing the current step index.
//! 3. Resolves each step's parameters against the results so far.
//! 4. Dispatches to the Remote Call Adapter or the SQL Call Adapter.
//! 5. Appends the step result and logs it.
//! 6. Stops at the first failure; nothing is retried.
//!
//! Steps never overlap: step n+1 is not resolved until step n's adapter call
//! has returned and its session is closed.

use std::sync::Arc;

use adapters::sql::{build_statement, placeholders};
use adapters::{DbConnection, RemoteCallAdapter, ResultMap, RfcConnection, SqlCallAdapter};
use serde_json::{json, Value};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::error::ConnectionKind;
use crate::models::{Catalog, InterfaceDefinition, Step, StepType};
use crate::resolver::resolve;
use crate::sink::{LogSink, TracingLogSink};
use crate::state::{ExecutionLog, ExecutionState, ExecutionTracker, LogLevel};
use crate::EngineError;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How to treat a back-reference with nothing to resolve to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReferenceMode {
    /// Substitute `null`, log a warning, keep going.
    #[default]
    Lenient,
    /// Fail the run with [`EngineError::UnresolvedParameterReference`].
    Strict,
}

/// Tuning knobs for the executor.
#[derive(Debug, Clone, Default)]
pub struct ExecutorConfig {
    pub reference_mode: ReferenceMode,
}

/// The connections the operator selected for a run.
#[derive(Debug, Clone, Default)]
pub struct Connections {
    pub rfc: Option<RfcConnection>,
    pub db: Option<DbConnection>,
}

// ---------------------------------------------------------------------------
// Run bookkeeping
// ---------------------------------------------------------------------------

/// Writes log entries to both the tracker and the sink.
struct RunLog<'a> {
    tracker: &'a ExecutionTracker,
    sink: &'a dyn LogSink,
}

impl RunLog<'_> {
    fn push(&self, level: LogLevel, message: impl Into<String>, details: Option<Value>) {
        let entry = ExecutionLog::new(level, message, details);
        self.sink.emit(&entry);
        self.tracker.update(|s| s.logs.push(entry));
    }
}

// ---------------------------------------------------------------------------
// InterfaceExecutor
// ---------------------------------------------------------------------------

/// Runs interfaces against live systems.
///
/// Holds no per-run state, so one executor can serve many runs; each run's
/// state lives in the [`ExecutionTracker`] passed to [`execute`](Self::execute).
pub struct InterfaceExecutor {
    rfc: RemoteCallAdapter,
    sql: SqlCallAdapter,
    sink: Arc<dyn LogSink>,
    config: ExecutorConfig,
}

impl InterfaceExecutor {
    pub fn new(rfc: RemoteCallAdapter, sql: SqlCallAdapter, config: ExecutorConfig) -> Self {
        Self {
            rfc,
            sql,
            sink: Arc::new(TracingLogSink),
            config,
        }
    }

    /// Send log entries to `sink` instead of `tracing`.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Run `interface` on `tracker` and return the final state.
    ///
    /// Step failures do not produce an `Err`; they end the run with
    /// `error` set in the returned state.
    ///
    /// # Errors
    /// [`EngineError::RunInProgress`] if `tracker` is already running.
    pub async fn execute(
        &self,
        tracker: &ExecutionTracker,
        interface: &InterfaceDefinition,
        catalog: &Catalog,
        connections: &Connections,
    ) -> Result<ExecutionState, EngineError> {
        let run_id = Uuid::new_v4();
        if !tracker.begin(run_id) {
            return Err(EngineError::RunInProgress);
        }
        Ok(self.drive(tracker, run_id, interface, catalog, connections).await)
    }

    /// Run `interface` on a fresh tracker.
    pub async fn run(
        &self,
        interface: &InterfaceDefinition,
        catalog: &Catalog,
        connections: &Connections,
    ) -> ExecutionState {
        let tracker = ExecutionTracker::new();
        let run_id = Uuid::new_v4();
        tracker.begin(run_id);
        self.drive(&tracker, run_id, interface, catalog, connections).await
    }

    /// Run several interfaces one after another.
    ///
    /// A failed interface does not stop the ones after it. Returns
    /// `(interface id, final state)` in input order.
    pub async fn execute_all(
        &self,
        interfaces: &[InterfaceDefinition],
        catalog: &Catalog,
        connections: &Connections,
    ) -> Vec<(String, ExecutionState)> {
        let mut outcomes = Vec::with_capacity(interfaces.len());
        for interface in interfaces {
            let state = self.run(interface, catalog, connections).await;
            outcomes.push((interface.id.clone(), state));
        }
        outcomes
    }

    #[instrument(skip(self, tracker, interface, catalog, connections), fields(interface_id = %interface.id))]
    async fn drive(
        &self,
        tracker: &ExecutionTracker,
        run_id: Uuid,
        interface: &InterfaceDefinition,
        catalog: &Catalog,
        connections: &Connections,
    ) -> ExecutionState {
        let log = RunLog { tracker, sink: self.sink.as_ref() };
        log.push(
            LogLevel::Info,
            format!("Starting interface '{}'", interface.name),
            Some(json!({ "runId": run_id, "steps": interface.steps.len() })),
        );

        // Authoritative copy of completed results; mirrored into the tracker.
        let mut results: Vec<ResultMap> = Vec::with_capacity(interface.steps.len());

        for (index, step) in interface.steps.iter().enumerate() {
            tracker.update(|s| s.current_step_index = Some(index));

            match self.run_step(&log, index + 1, step, &results, catalog, connections).await {
                Ok(result) => {
                    results.push(result.clone());
                    tracker.update(|s| s.results.push(result.clone()));
                    log.push(
                        LogLevel::Success,
                        format!("Step {} '{}' completed", index + 1, step.name),
                        Some(Value::Object(result)),
                    );
                }
                Err(err) => {
                    error!("step {} '{}' failed: {}", index + 1, step.name, err);
                    let message = err.to_string();
                    tracker.update(|s| {
                        s.is_running = false;
                        s.error = Some(message.clone());
                    });
                    log.push(
                        LogLevel::Error,
                        format!("Step {} '{}' failed: {}", index + 1, step.name, message),
                        Some(err.details()),
                    );
                    return tracker.snapshot();
                }
            }
        }

        tracker.update(|s| s.is_running = false);
        log.push(
            LogLevel::Success,
            format!(
                "Interface '{}' completed: {} step(s) executed",
                interface.name,
                results.len()
            ),
            None,
        );
        info!("interface '{}' run {} succeeded", interface.id, run_id);

        tracker.snapshot()
    }

    // -----------------------------------------------------------------------
    // Internal: one step
    // -----------------------------------------------------------------------

    async fn run_step(
        &self,
        log: &RunLog<'_>,
        position: usize,
        step: &Step,
        prior: &[ResultMap],
        catalog: &Catalog,
        connections: &Connections,
    ) -> Result<ResultMap, EngineError> {
        let resolution = resolve(&step.parameters, prior);

        for unresolved in &resolution.unresolved {
            if self.config.reference_mode == ReferenceMode::Strict {
                return Err(EngineError::UnresolvedParameterReference {
                    step: position,
                    parameter: unresolved.parameter.clone(),
                    reference: unresolved.reference(),
                });
            }
            log.push(
                LogLevel::Warning,
                format!("Step {position}: {unresolved}"),
                Some(json!({
                    "parameter": unresolved.parameter,
                    "reference": unresolved.reference(),
                })),
            );
        }

        match &step.step_type {
            StepType::Rpc => self.run_rpc(log, position, step, resolution.values, catalog, connections).await,
            StepType::Sql => self.run_sql(log, position, step, resolution.values, catalog, connections).await,
            StepType::Unsupported(other) => Err(EngineError::UnsupportedStepType {
                step: position,
                step_type: other.clone(),
            }),
        }
    }

    async fn run_rpc(
        &self,
        log: &RunLog<'_>,
        position: usize,
        step: &Step,
        values: ResultMap,
        catalog: &Catalog,
        connections: &Connections,
    ) -> Result<ResultMap, EngineError> {
        let connection = connections.rfc.as_ref().ok_or(EngineError::MissingConnection {
            step: position,
            kind: ConnectionKind::Rfc,
        })?;
        let function = catalog.find_rpc(&step.reference_id).ok_or_else(|| EngineError::UnknownReference {
            step: position,
            catalog: "RFC function",
            reference_id: step.reference_id.clone(),
        })?;

        let (imports, dropped) = function.shape_imports(values);
        if !dropped.is_empty() {
            log.push(
                LogLevel::Warning,
                format!(
                    "Step {position}: ignoring non-import parameter(s) of '{}': {}",
                    function.function_name,
                    dropped.join(", ")
                ),
                None,
            );
        }

        log.push(
            LogLevel::Info,
            format!("Step {position}: calling RFC function '{}'", function.function_name),
            Some(Value::Object(imports.clone())),
        );

        self.rfc
            .call(connection, &function.function_name, &imports)
            .await
            .map_err(|e| EngineError::RemoteCallFailed {
                step: position,
                function: function.function_name.clone(),
                message: e.to_string(),
            })
    }

    async fn run_sql(
        &self,
        log: &RunLog<'_>,
        position: usize,
        step: &Step,
        values: ResultMap,
        catalog: &Catalog,
        connections: &Connections,
    ) -> Result<ResultMap, EngineError> {
        let connection = connections.db.as_ref().ok_or(EngineError::MissingConnection {
            step: position,
            kind: ConnectionKind::Database,
        })?;
        let query = catalog.find_sql(&step.reference_id).ok_or_else(|| EngineError::UnknownReference {
            step: position,
            catalog: "SQL query",
            reference_id: step.reference_id.clone(),
        })?;

        let mut missing: Vec<String> = query
            .parameters
            .iter()
            .cloned()
            .chain(placeholders(&query.sql_text))
            .filter(|name| !values.contains_key(name))
            .collect();
        missing.sort();
        missing.dedup();
        if !missing.is_empty() {
            log.push(
                LogLevel::Warning,
                format!("Step {position}: no value for placeholder(s) {}", missing.join(", ")),
                None,
            );
        }

        let statement = build_statement(&query.sql_text, &values);
        log.push(
            LogLevel::Info,
            format!("Step {position}: executing SQL '{}'", query.name),
            Some(json!({ "statement": statement })),
        );

        self.sql
            .execute_statement(connection, &statement)
            .await
            .map_err(|e| EngineError::SqlExecutionFailed {
                step: position,
                message: e.to_string(),
            })
    }
}
