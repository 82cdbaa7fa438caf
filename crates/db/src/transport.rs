//! Postgres-backed [`SqlTransport`].

use std::time::Duration;

use adapters::{AdapterError, DbConnection, ResultMap, SqlOutcome, SqlSession, SqlTransport};
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::{ConnectOptions, Connection, Either, Executor};
use tracing::{debug, info, instrument};

use crate::rows::row_to_map;
use crate::DbError;

/// Opens a fresh `PgConnection` for every session.
#[derive(Debug, Clone)]
pub struct PgSqlTransport {
    connect_timeout: Duration,
}

impl Default for PgSqlTransport {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl PgSqlTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

/// Build driver options from a connection descriptor.
pub fn connect_options(connection: &DbConnection) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&connection.host)
        .port(connection.port)
        .database(&connection.database)
        .username(&connection.user)
        .password(&connection.password)
        .application_name("interface-runner")
        .disable_statement_logging()
}

/// Fold one item of a statement's result stream into `outcome`: rows are
/// collected, command-tag counts are summed.
pub fn absorb(outcome: &mut SqlOutcome, item: Either<u64, ResultMap>) {
    match item {
        Either::Left(affected) => outcome.rows_affected += affected,
        Either::Right(row) => outcome.rows.push(row),
    }
}

#[async_trait]
impl SqlTransport for PgSqlTransport {
    #[instrument(skip(self, connection), fields(host = %connection.host, database = %connection.database))]
    async fn connect(&self, connection: &DbConnection) -> Result<Box<dyn SqlSession>, AdapterError> {
        info!("Connecting to database '{}'", connection.name);
        let options = connect_options(connection);

        let conn = match tokio::time::timeout(self.connect_timeout, PgConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(AdapterError::Connection(e.to_string())),
            Err(_) => {
                return Err(AdapterError::Connection(format!(
                    "connect timed out after {:?}",
                    self.connect_timeout
                )))
            }
        };

        Ok(Box::new(PgSqlSession { conn }))
    }
}

struct PgSqlSession {
    conn: PgConnection,
}

impl PgSqlSession {
    async fn run(&mut self, statement: &str) -> Result<SqlOutcome, DbError> {
        let mut outcome = SqlOutcome::default();
        let mut stream = (&mut self.conn).fetch_many(statement);
        while let Some(item) = stream.try_next().await? {
            let item = match item {
                Either::Left(done) => Either::Left(done.rows_affected()),
                Either::Right(row) => Either::Right(row_to_map(&row)?),
            };
            absorb(&mut outcome, item);
        }
        debug!(
            "statement returned {} rows, affected {}",
            outcome.rows.len(),
            outcome.rows_affected
        );
        Ok(outcome)
    }
}

#[async_trait]
impl SqlSession for PgSqlSession {
    async fn execute(&mut self, statement: &str) -> Result<SqlOutcome, AdapterError> {
        Ok(self.run(statement).await?)
    }

    async fn close(self: Box<Self>) -> Result<(), AdapterError> {
        self.conn.close().await.map_err(DbError::from)?;
        Ok(())
    }
}
