//! HTTP transport for signed requests

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{GateKeyError, Result};
use crate::types::{Reply, RequestBody, SignedRequest};

/// Default `User-Agent`, versioned with the crate
pub const DEFAULT_USER_AGENT: &str = concat!("gatekey-client/", env!("CARGO_PKG_VERSION"));

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Whole-exchange timeout; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Skip TLS certificate verification. Opt-in only.
    pub accept_invalid_certs: bool,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            accept_invalid_certs: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Sends one signed POST and returns the decoded reply
///
/// Implementations must not retry.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: SignedRequest) -> Result<Reply>;
}

/// reqwest-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));

        let mut builder = Client::builder()
            .default_headers(headers)
            .user_agent(config.user_agent.as_str());

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if config.accept_invalid_certs {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        let client = builder.build().map_err(|e| {
            GateKeyError::Configuration(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: SignedRequest) -> Result<Reply> {
        let mut builder = self.client.post(&request.url);
        if let Some(ref authorization) = request.authorization {
            builder = builder.header(header::AUTHORIZATION, authorization);
        }
        builder = match request.body {
            RequestBody::Form(ref pairs) => builder.form(pairs),
            RequestBody::Json(ref value) => builder.json(value),
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let text = response.text().await?;
        debug!(status, bytes = text.len(), "reply received");

        // Non-200 bodies are kept verbatim for the transport error
        let body = match serde_json::from_str::<Value>(&text) {
            Ok(value) => value,
            Err(_) if status != 200 => Value::String(text),
            Err(e) => {
                warn!(error = %e, bytes = text.len(), "reply body is not JSON");
                return Err(GateKeyError::UnexpectedResponse("body".into()));
            }
        };

        Ok(Reply {
            http_status: status,
            body,
        })
    }
}
