//! SQL Call Adapter and statement construction.
//!
//! Values are spliced into the template as SQL literals. This is plain text
//! substitution, not bind parameters; it matches how existing interfaces were
//! authored and is not a security boundary.

use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::{AdapterError, DbConnection, ResultMap, SqlOutcome, SqlTransport};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":([A-Za-z_][A-Za-z0-9_]*)").expect("placeholder regex is valid"));

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Keys the adapter always writes into a SQL step's result map.
pub const ROWS_KEY: &str = "rows";
pub const ROW_COUNT_KEY: &str = "rowCount";
pub const ROWS_AFFECTED_KEY: &str = "rowsAffected";

/// Render one JSON value as a SQL literal.
///
/// Strings are single-quoted with embedded quotes doubled, `null` becomes
/// `NULL`, numbers and booleans are written as-is. Arrays and objects are
/// written as a quoted JSON string.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        other => quote(&other.to_string()),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Normalise `template` and replace every `:name` placeholder that has a
/// value in `params` with its literal.
///
/// Trailing semicolons are stripped and whitespace runs collapse to a single
/// space before substitution, so substituted values keep their spacing.
/// Placeholders without a value are left untouched, as are `::type` casts.
///
/// Collapsing puts the whole template on one line, so a `-- comment` in a
/// template swallows everything after it. Use `/* ... */` comments instead.
pub fn build_statement(template: &str, params: &ResultMap) -> String {
    let normalized = WHITESPACE
        .replace_all(template.trim().trim_end_matches(|c: char| c == ';' || c.is_whitespace()), " ")
        .into_owned();

    PLACEHOLDER
        .replace_all(&normalized, |caps: &Captures| {
            let whole = caps.get(0).map(|m| m.as_str()).unwrap_or_default();
            let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
            if start > 0 && normalized.as_bytes()[start - 1] == b':' {
                return whole.to_string();
            }
            match params.get(&caps[1]) {
                Some(value) => sql_literal(value),
                None => whole.to_string(),
            }
        })
        .into_owned()
}

/// Names of every `:name` placeholder in `template`, in order of appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let start = caps.get(0).map(|m| m.start()).unwrap_or_default();
        if start > 0 && template.as_bytes()[start - 1] == b':' {
            continue;
        }
        let name = caps[1].to_string();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

impl SqlOutcome {
    /// Shape the raw outcome into a step result map: the first row's columns
    /// at top level, plus `rows`, `rowCount` and `rowsAffected`.
    pub fn into_result_map(self) -> ResultMap {
        let mut result = self.rows.first().cloned().unwrap_or_default();
        let row_count = self.rows.len();
        result.insert(
            ROWS_KEY.to_string(),
            Value::Array(self.rows.into_iter().map(Value::Object).collect()),
        );
        result.insert(ROW_COUNT_KEY.to_string(), Value::from(row_count));
        result.insert(ROWS_AFFECTED_KEY.to_string(), Value::from(self.rows_affected));
        result
    }
}

#[derive(Clone)]
pub struct SqlCallAdapter {
    transport: Arc<dyn SqlTransport>,
    timeout: Option<Duration>,
}

impl SqlCallAdapter {
    pub fn new(transport: Arc<dyn SqlTransport>) -> Self {
        Self { transport, timeout: None }
    }

    /// Bound each statement execution (not the connect) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the statement from `template` and `params`, then execute it.
    ///
    /// Convenience wrapper over [`build_statement`] and
    /// [`execute_statement`](Self::execute_statement). The engine calls those
    /// two separately so it can log the built statement before execution.
    pub async fn run(
        &self,
        connection: &DbConnection,
        template: &str,
        params: &ResultMap,
    ) -> Result<ResultMap, AdapterError> {
        let statement = build_statement(template, params);
        self.execute_statement(connection, &statement).await
    }

    /// Execute an already-built statement on a fresh session.
    ///
    /// The session is closed on every path; a close failure is logged and
    /// never masks the statement's own result.
    #[instrument(skip(self, connection, statement), fields(connection = %connection.name))]
    pub async fn execute_statement(
        &self,
        connection: &DbConnection,
        statement: &str,
    ) -> Result<ResultMap, AdapterError> {
        let mut session = self.transport.connect(connection).await?;
        debug!("executing: {}", statement);

        let outcome = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, session.execute(statement)).await {
                Ok(res) => res,
                Err(_) => Err(AdapterError::Timeout(limit)),
            },
            None => session.execute(statement).await,
        };

        if let Err(e) = session.close().await {
            warn!("closing database session failed: {}", e);
        }

        outcome.map(SqlOutcome::into_result_map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockSqlTransport, SqlBehaviour};
    use serde_json::json;

    fn params(value: Value) -> ResultMap {
        value.as_object().cloned().unwrap_or_default()
    }

    fn connection() -> DbConnection {
        DbConnection {
            name: "warehouse".into(),
            host: "localhost".into(),
            port: 5432,
            database: "dw".into(),
            user: "etl".into(),
            password: "pw".into(),
        }
    }

    #[test]
    fn string_values_are_quoted_with_doubled_quotes() {
        let stmt = build_statement("SELECT * FROM T WHERE ID = :id", &params(json!({ "id": "A'B" })));
        assert_eq!(stmt, "SELECT * FROM T WHERE ID = 'A''B'");
    }

    #[test]
    fn null_numbers_and_booleans_are_written_verbatim() {
        let stmt = build_statement(
            "UPDATE t SET a = :a, b = :b, c = :c WHERE d = :d",
            &params(json!({ "a": null, "b": 7, "c": true, "d": 1.5 })),
        );
        assert_eq!(stmt, "UPDATE t SET a = NULL, b = 7, c = true WHERE d = 1.5");
    }

    #[test]
    fn every_occurrence_is_replaced() {
        let stmt = build_statement(
            "SELECT * FROM t WHERE a = :x OR b = :x",
            &params(json!({ "x": "v" })),
        );
        assert_eq!(stmt, "SELECT * FROM t WHERE a = 'v' OR b = 'v'");
    }

    #[test]
    fn placeholder_prefix_does_not_match_longer_name() {
        let stmt = build_statement(
            "SELECT :id, :idx FROM t",
            &params(json!({ "id": 1 })),
        );
        assert_eq!(stmt, "SELECT 1, :idx FROM t");
    }

    #[test]
    fn casts_are_not_treated_as_placeholders() {
        let stmt = build_statement("SELECT :v::text", &params(json!({ "v": 3, "text": "no" })));
        assert_eq!(stmt, "SELECT 3::text");
    }

    #[test]
    fn trailing_semicolons_and_whitespace_are_normalised() {
        let stmt = build_statement(
            "  SELECT *\n\tFROM   t\n WHERE a = :a ;;\n",
            &params(json!({ "a": "two  spaces" })),
        );
        assert_eq!(stmt, "SELECT * FROM t WHERE a = 'two  spaces'");
    }

    #[test]
    fn structured_values_become_quoted_json() {
        let stmt = build_statement("SELECT :j", &params(json!({ "j": { "k": "it's" } })));
        assert_eq!(stmt, r#"SELECT '{"k":"it''s"}'"#);
    }

    #[test]
    fn placeholders_are_listed_once_in_order() {
        assert_eq!(
            placeholders("SELECT :b, :a, :b, x::int FROM t"),
            vec!["b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn outcome_flattens_first_row_and_keeps_reserved_keys() {
        let outcome = SqlOutcome {
            rows: vec![
                params(json!({ "NAME": "Ada", "rows": "shadowed" })),
                params(json!({ "NAME": "Bob", "rows": "shadowed" })),
            ],
            rows_affected: 0,
        };
        let result = outcome.into_result_map();

        assert_eq!(result["NAME"], "Ada");
        assert_eq!(result[ROW_COUNT_KEY], 2);
        assert_eq!(result[ROWS_AFFECTED_KEY], 0);
        assert_eq!(result[ROWS_KEY][1]["NAME"], "Bob");
    }

    #[tokio::test]
    async fn run_builds_statement_and_closes_session() {
        let transport = Arc::new(
            MockSqlTransport::new().respond_with(SqlBehaviour::Rows(vec![json!({ "TOTAL": 3 })])),
        );
        let adapter = SqlCallAdapter::new(transport.clone());

        let result = adapter
            .run(&connection(), "SELECT count(*) AS TOTAL FROM orders WHERE cust = :c;", &params(json!({ "c": 7 })))
            .await
            .expect("statement should succeed");

        assert_eq!(transport.statements(), vec!["SELECT count(*) AS TOTAL FROM orders WHERE cust = 7"]);
        assert_eq!(result["TOTAL"], 3);
        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.closed(), 1);
    }

    #[tokio::test]
    async fn failing_statement_still_closes_session() {
        let transport = Arc::new(
            MockSqlTransport::new().respond_with(SqlBehaviour::Fail("syntax error at or near \"FORM\"".into())),
        );
        let adapter = SqlCallAdapter::new(transport.clone());

        let err = adapter
            .execute_statement(&connection(), "SELECT * FORM t")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "syntax error at or near \"FORM\"");
        assert_eq!(transport.closed(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_statement_times_out_and_closes_session() {
        let transport = Arc::new(MockSqlTransport::new().respond_with(SqlBehaviour::Delay(
            Duration::from_secs(60),
            vec![json!({ "n": 1 })],
        )));
        let adapter = SqlCallAdapter::new(transport.clone()).with_timeout(Duration::from_secs(5));

        let err = adapter
            .execute_statement(&connection(), "SELECT pg_sleep(60)")
            .await
            .unwrap_err();

        assert_eq!(err, AdapterError::Timeout(Duration::from_secs(5)));
        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.closed(), 1);
    }

    #[tokio::test]
    async fn data_modifying_statement_reports_affected_rows() {
        let transport = Arc::new(MockSqlTransport::new().respond_with(SqlBehaviour::Affected(4)));
        let adapter = SqlCallAdapter::new(transport.clone());

        let result = adapter
            .run(&connection(), "UPDATE orders SET state = :s", &params(json!({ "s": "DONE" })))
            .await
            .expect("update should succeed");

        assert_eq!(result[ROWS_AFFECTED_KEY], 4);
        assert_eq!(result[ROW_COUNT_KEY], 0);
        assert_eq!(result[ROWS_KEY], json!([]));
        assert_eq!(transport.statements(), vec!["UPDATE orders SET state = 'DONE'"]);
    }

    #[test]
    fn line_comment_swallows_the_rest_after_collapsing() {
        let stmt = build_statement("SELECT a -- note\nFROM t", &ResultMap::new());
        assert_eq!(stmt, "SELECT a -- note FROM t");
    }

    #[tokio::test]
    async fn refused_connection_is_reported() {
        let transport = Arc::new(MockSqlTransport::new().refusing_connect("no route to host"));
        let adapter = SqlCallAdapter::new(transport.clone());

        let err = adapter.execute_statement(&connection(), "SELECT 1").await.unwrap_err();

        assert!(matches!(err, AdapterError::Connection(_)));
        assert!(transport.statements().is_empty());
    }
}
