//! Mock transports: test doubles for [`RfcTransport`] and [`SqlTransport`].
//!
//! Both record every call they receive and count session opens/closes so
//! tests can assert on call order and session hygiene. A shared
//! [`CallJournal`] can be attached to several mocks to observe the
//! interleaving of calls across protocols.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    AdapterError, DbConnection, ResultMap, RfcConnection, RfcSession, RfcTransport, SqlOutcome,
    SqlSession, SqlTransport,
};

/// Start/finish markers written by mocks that share a journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    Started(String),
    Finished(String),
}

/// Append-only event log shared between mock transports.
#[derive(Debug, Clone, Default)]
pub struct CallJournal(Arc<Mutex<Vec<CallEvent>>>);

impl CallJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallEvent> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, event: CallEvent) {
        self.0.lock().unwrap().push(event);
    }
}

fn to_map(value: &Value) -> ResultMap {
    value.as_object().cloned().unwrap_or_default()
}

// ---------------------------------------------------------------------------
// RFC
// ---------------------------------------------------------------------------

/// What a mocked remote function does when called.
#[derive(Debug, Clone)]
pub enum RfcBehaviour {
    /// Return the given JSON object as the result map.
    Return(Value),
    /// Fail with [`AdapterError::Invocation`].
    Fail(String),
    /// Sleep, then return the given object.
    Delay(Duration, Value),
}

/// One call seen by [`MockRfcTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRfcCall {
    pub connection: String,
    pub function: String,
    pub imports: ResultMap,
}

#[derive(Default)]
struct RfcShared {
    behaviours: HashMap<String, RfcBehaviour>,
    calls: Mutex<Vec<RecordedRfcCall>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    logon_error: Option<String>,
    journal: Option<CallJournal>,
}

/// An RFC transport whose functions are scripted per name.
#[derive(Clone, Default)]
pub struct MockRfcTransport {
    shared: Arc<RfcShared>,
}

impl MockRfcTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the behaviour of `function`.
    pub fn with(mut self, function: impl Into<String>, behaviour: RfcBehaviour) -> Self {
        self.shared_mut().behaviours.insert(function.into(), behaviour);
        self
    }

    /// Make every logon fail with [`AdapterError::Connection`].
    pub fn refusing_logon(mut self, msg: impl Into<String>) -> Self {
        self.shared_mut().logon_error = Some(msg.into());
        self
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.shared_mut().journal = Some(journal);
        self
    }

    /// All calls received so far, in call order.
    pub fn calls(&self) -> Vec<RecordedRfcCall> {
        self.shared.calls.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn shared_mut(&mut self) -> &mut RfcShared {
        Arc::get_mut(&mut self.shared).expect("configure MockRfcTransport before cloning it")
    }
}

#[async_trait]
impl RfcTransport for MockRfcTransport {
    async fn open(&self, connection: &RfcConnection) -> Result<Box<dyn RfcSession>, AdapterError> {
        if let Some(msg) = &self.shared.logon_error {
            return Err(AdapterError::Connection(msg.clone()));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockRfcSession {
            connection: connection.name.clone(),
            shared: Arc::clone(&self.shared),
        }))
    }
}

struct MockRfcSession {
    connection: String,
    shared: Arc<RfcShared>,
}

#[async_trait]
impl RfcSession for MockRfcSession {
    async fn call(&mut self, function: &str, imports: &ResultMap) -> Result<ResultMap, AdapterError> {
        self.shared.calls.lock().unwrap().push(RecordedRfcCall {
            connection: self.connection.clone(),
            function: function.to_owned(),
            imports: imports.clone(),
        });
        if let Some(journal) = &self.shared.journal {
            journal.push(CallEvent::Started(function.to_owned()));
        }

        let outcome = match self.shared.behaviours.get(function) {
            Some(RfcBehaviour::Return(v)) => Ok(to_map(v)),
            Some(RfcBehaviour::Fail(msg)) => Err(AdapterError::Invocation(msg.clone())),
            Some(RfcBehaviour::Delay(delay, v)) => {
                tokio::time::sleep(*delay).await;
                Ok(to_map(v))
            }
            None => Err(AdapterError::Invocation(format!("function '{function}' is not mocked"))),
        };

        if let Some(journal) = &self.shared.journal {
            journal.push(CallEvent::Finished(function.to_owned()));
        }
        outcome
    }

    async fn close(self: Box<Self>) -> Result<(), AdapterError> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

/// What the mocked database does for the next statement.
#[derive(Debug, Clone)]
pub enum SqlBehaviour {
    /// Return these rows (each a JSON object).
    Rows(Vec<Value>),
    /// Report a data-modifying statement touching this many rows.
    Affected(u64),
    /// Fail with [`AdapterError::Invocation`].
    Fail(String),
    /// Sleep, then return these rows.
    Delay(Duration, Vec<Value>),
}

fn rows_outcome(rows: &[Value]) -> SqlOutcome {
    SqlOutcome {
        rows: rows.iter().map(to_map).collect(),
        rows_affected: rows.len() as u64,
    }
}

#[derive(Default)]
struct SqlShared {
    script: Mutex<VecDeque<SqlBehaviour>>,
    statements: Mutex<Vec<String>>,
    opened: AtomicUsize,
    closed: AtomicUsize,
    connect_error: Option<String>,
    journal: Option<CallJournal>,
}

/// A SQL transport answering statements from a FIFO script.
///
/// Once the script is exhausted every statement returns no rows.
#[derive(Clone, Default)]
pub struct MockSqlTransport {
    shared: Arc<SqlShared>,
}

impl MockSqlTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next unanswered statement.
    pub fn respond_with(self, behaviour: SqlBehaviour) -> Self {
        self.shared.script.lock().unwrap().push_back(behaviour);
        self
    }

    pub fn refusing_connect(mut self, msg: impl Into<String>) -> Self {
        self.shared_mut().connect_error = Some(msg.into());
        self
    }

    pub fn with_journal(mut self, journal: CallJournal) -> Self {
        self.shared_mut().journal = Some(journal);
        self
    }

    /// Every statement executed so far, exactly as received.
    pub fn statements(&self) -> Vec<String> {
        self.shared.statements.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.shared.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.shared.closed.load(Ordering::SeqCst)
    }

    fn shared_mut(&mut self) -> &mut SqlShared {
        Arc::get_mut(&mut self.shared).expect("configure MockSqlTransport before cloning it")
    }
}

#[async_trait]
impl SqlTransport for MockSqlTransport {
    async fn connect(&self, _connection: &DbConnection) -> Result<Box<dyn SqlSession>, AdapterError> {
        if let Some(msg) = &self.shared.connect_error {
            return Err(AdapterError::Connection(msg.clone()));
        }
        self.shared.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockSqlSession { shared: Arc::clone(&self.shared) }))
    }
}

struct MockSqlSession {
    shared: Arc<SqlShared>,
}

#[async_trait]
impl SqlSession for MockSqlSession {
    async fn execute(&mut self, statement: &str) -> Result<SqlOutcome, AdapterError> {
        self.shared.statements.lock().unwrap().push(statement.to_owned());
        if let Some(journal) = &self.shared.journal {
            journal.push(CallEvent::Started(statement.to_owned()));
        }

        let next = self.shared.script.lock().unwrap().pop_front();
        let outcome = match next {
            Some(SqlBehaviour::Rows(rows)) => Ok(rows_outcome(&rows)),
            Some(SqlBehaviour::Affected(n)) => Ok(SqlOutcome { rows: Vec::new(), rows_affected: n }),
            Some(SqlBehaviour::Fail(msg)) => Err(AdapterError::Invocation(msg)),
            Some(SqlBehaviour::Delay(delay, rows)) => {
                tokio::time::sleep(delay).await;
                Ok(rows_outcome(&rows))
            }
            None => Ok(SqlOutcome::default()),
        };

        if let Some(journal) = &self.shared.journal {
            journal.push(CallEvent::Finished(statement.to_owned()));
        }
        outcome
    }

    async fn close(self: Box<Self>) -> Result<(), AdapterError> {
        self.shared.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
