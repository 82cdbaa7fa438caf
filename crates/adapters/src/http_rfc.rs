//! RFC transport over an HTTP/JSON gateway.
//!
//! The gateway holds the native RFC library and exposes logon sessions as
//! resources:
//!
//! - `POST   {gateway}/sessions`           → `{"sessionId": "..."}`
//! - `POST   {gateway}/sessions/{id}/call` → `{"result": {...}}`
//! - `DELETE {gateway}/sessions/{id}`
//!
//! Non-2xx answers carry `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{AdapterError, ResultMap, RfcConnection, RfcSession, RfcTransport};

/// Configuration for [`HttpRfcTransport`].
#[derive(Debug, Clone)]
pub struct HttpRfcTransportConfig {
    /// Base URL of the RFC gateway.
    pub gateway_url: String,
    /// Timeout in seconds for each HTTP request.
    pub timeout_secs: u64,
}

impl Default for HttpRfcTransportConfig {
    fn default() -> Self {
        Self {
            gateway_url: "http://localhost:8095".to_string(),
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize)]
struct LogonRequest<'a> {
    ashost: &'a str,
    sysnr: &'a str,
    client: &'a str,
    user: &'a str,
    passwd: &'a str,
    lang: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LogonResponse {
    session_id: String,
}

#[derive(Debug, Serialize)]
struct CallRequest<'a> {
    function: &'a str,
    parameters: &'a ResultMap,
}

#[derive(Debug, Deserialize)]
struct CallResponse {
    #[serde(default)]
    result: ResultMap,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Read the gateway's error message from a non-2xx response.
async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ErrorResponse>(&body) {
        Ok(err) => err.error,
        Err(_) if body.is_empty() => format!("gateway answered {status}"),
        Err(_) => format!("gateway answered {status}: {body}"),
    }
}

#[derive(Debug, Clone)]
pub struct HttpRfcTransport {
    config: HttpRfcTransportConfig,
    client: Client,
}

impl HttpRfcTransport {
    pub fn new(config: HttpRfcTransportConfig) -> Result<Self, AdapterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.gateway_url.trim_end_matches('/'), path)
    }
}

#[async_trait]
impl RfcTransport for HttpRfcTransport {
    #[instrument(skip(self, connection), fields(ashost = %connection.ashost))]
    async fn open(&self, connection: &RfcConnection) -> Result<Box<dyn RfcSession>, AdapterError> {
        let request = LogonRequest {
            ashost: &connection.ashost,
            sysnr: &connection.sysnr,
            client: &connection.client,
            user: &connection.user,
            passwd: &connection.password,
            lang: &connection.language,
        };

        let response = self.client.post(self.url("sessions")).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::Connection(error_message(response).await));
        }

        let logon: LogonResponse = response.json().await?;
        debug!("gateway session {} opened", logon.session_id);

        Ok(Box::new(HttpRfcSession {
            client: self.client.clone(),
            session_url: self.url(&format!("sessions/{}", logon.session_id)),
        }))
    }
}

struct HttpRfcSession {
    client: Client,
    session_url: String,
}

#[async_trait]
impl RfcSession for HttpRfcSession {
    async fn call(&mut self, function: &str, imports: &ResultMap) -> Result<ResultMap, AdapterError> {
        let response = self
            .client
            .post(format!("{}/call", self.session_url))
            .json(&CallRequest { function, parameters: imports })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AdapterError::Invocation(error_message(response).await));
        }

        let body: CallResponse = response.json().await?;
        Ok(body.result)
    }

    async fn close(self: Box<Self>) -> Result<(), AdapterError> {
        let response = self.client.delete(&self.session_url).send().await?;
        if !response.status().is_success() {
            return Err(AdapterError::Protocol(error_message(response).await));
        }
        Ok(())
    }
}
