//! Remote Call Adapter.
//!
//! Opens a session right before the call and closes it afterwards on every
//! path, including failure and timeout.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::{AdapterError, ResultMap, RfcConnection, RfcTransport};

#[derive(Clone)]
pub struct RemoteCallAdapter {
    transport: Arc<dyn RfcTransport>,
    timeout: Option<Duration>,
}

impl RemoteCallAdapter {
    pub fn new(transport: Arc<dyn RfcTransport>) -> Self {
        Self { transport, timeout: None }
    }

    /// Bound each remote call (not the logon) by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Invoke `procedure` with `imports` and return the merged export/table
    /// payload.
    ///
    /// # Errors
    /// Whatever the transport reports for logon or the call, or
    /// [`AdapterError::Timeout`]. A failure to close the session is logged
    /// and never masks the call's own result.
    #[instrument(skip(self, connection, imports), fields(connection = %connection.name))]
    pub async fn call(
        &self,
        connection: &RfcConnection,
        procedure: &str,
        imports: &ResultMap,
    ) -> Result<ResultMap, AdapterError> {
        let mut session = self.transport.open(connection).await?;
        debug!("session opened, calling '{}'", procedure);

        let result = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, session.call(procedure, imports)).await {
                Ok(res) => res,
                Err(_) => Err(AdapterError::Timeout(limit)),
            },
            None => session.call(procedure, imports).await,
        };

        if let Err(e) = session.close().await {
            warn!("closing RFC session after '{}' failed: {}", procedure, e);
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockRfcTransport, RfcBehaviour};
    use serde_json::json;

    fn connection() -> RfcConnection {
        RfcConnection {
            name: "dev".into(),
            ashost: "host".into(),
            sysnr: "00".into(),
            client: "100".into(),
            user: "u".into(),
            password: "p".into(),
            language: "EN".into(),
        }
    }

    fn imports(value: serde_json::Value) -> ResultMap {
        value.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn successful_call_returns_payload_and_closes_session() {
        let transport = Arc::new(MockRfcTransport::new().with(
            "Z_GET_CUSTOMER",
            RfcBehaviour::Return(json!({ "CUSTOMER_ID": 7, "ET_ITEMS": [] })),
        ));
        let adapter = RemoteCallAdapter::new(transport.clone());

        let result = adapter
            .call(&connection(), "Z_GET_CUSTOMER", &imports(json!({ "CUST": "C1" })))
            .await
            .expect("call should succeed");

        assert_eq!(result["CUSTOMER_ID"], 7);
        assert_eq!(transport.opened(), 1);
        assert_eq!(transport.closed(), 1);
        assert_eq!(transport.calls()[0].imports["CUST"], "C1");
    }

    #[tokio::test]
    async fn failed_call_still_closes_session() {
        let transport = Arc::new(
            MockRfcTransport::new().with("Z_BROKEN", RfcBehaviour::Fail("FUNCTION_NOT_FOUND".into())),
        );
        let adapter = RemoteCallAdapter::new(transport.clone());

        let err = adapter
            .call(&connection(), "Z_BROKEN", &ResultMap::new())
            .await
            .unwrap_err();

        assert_eq!(err, AdapterError::Invocation("FUNCTION_NOT_FOUND".into()));
        assert_eq!(transport.closed(), 1);
    }

    #[tokio::test]
    async fn logon_failure_never_opens_a_session() {
        let transport = Arc::new(MockRfcTransport::new().refusing_logon("wrong password"));
        let adapter = RemoteCallAdapter::new(transport.clone());

        let err = adapter
            .call(&connection(), "Z_ANY", &ResultMap::new())
            .await
            .unwrap_err();

        assert!(matches!(err, AdapterError::Connection(_)));
        assert_eq!(transport.opened(), 0);
        assert_eq!(transport.closed(), 0);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn slow_call_times_out_and_closes_session() {
        let transport = Arc::new(MockRfcTransport::new().with(
            "Z_SLOW",
            RfcBehaviour::Delay(Duration::from_secs(60), json!({})),
        ));
        let adapter = RemoteCallAdapter::new(transport.clone()).with_timeout(Duration::from_secs(5));

        let err = adapter
            .call(&connection(), "Z_SLOW", &ResultMap::new())
            .await
            .unwrap_err();

        assert_eq!(err, AdapterError::Timeout(Duration::from_secs(5)));
        assert_eq!(transport.closed(), 1);
    }
}
