//! Request/response transport
//!
//! [`Transport`] is the single HTTP-performing primitive the gateway depends
//! on. Response bodies are always decoded as JSON: an empty body becomes
//! `null` and a non-JSON body becomes a JSON string, so callers never deal
//! with raw bytes.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace};

/// Errors raised before a status code was received
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// Request body variants the provisioning API accepts
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    /// Raw upload (backup files, file prompt answers)
    Bytes {
        data: Bytes,
        content_type: Option<String>,
    },
}

/// One request to perform
#[derive(Debug, Clone, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<RequestBody>,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
}

impl TransportRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            body: None,
            headers: Vec::new(),
            query: Vec::new(),
        }
    }

    pub fn with_json(mut self, body: Value) -> Self {
        self.body = Some(RequestBody::Json(body));
        self
    }

    pub fn with_bytes(mut self, data: Bytes, content_type: Option<String>) -> Self {
        self.body = Some(RequestBody::Bytes { data, content_type });
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }
}

/// Decoded response body paired with its status
#[derive(Debug, Clone, PartialEq)]
pub struct RequestResult {
    pub body: Value,
    pub status: u16,
}

impl RequestResult {
    pub fn new(body: Value, status: u16) -> Self {
        Self { body, status }
    }

    /// 2xx and 3xx count as success
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }
}

/// The HTTP-performing primitive
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`; any received status is returned as `Ok`
    async fn perform(&self, request: TransportRequest) -> Result<RequestResult, TransportError>;
}

/// Decode a response body the way every provisioning endpoint expects
pub fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// [`Transport`] backed by reqwest
///
/// No request timeout is configured; reqwest's defaults apply.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("provisioner/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn perform(&self, request: TransportRequest) -> Result<RequestResult, TransportError> {
        let TransportRequest {
            method,
            url,
            body,
            headers,
            query,
        } = request;

        debug!(method = %method, url = %url, "[Transport] Sending request");

        let mut builder = self.client.request(method.clone(), &url);
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder = match body {
            Some(RequestBody::Json(value)) => builder.json(&value),
            Some(RequestBody::Bytes { data, content_type }) => {
                if let Some(content_type) = content_type {
                    builder = builder.header(CONTENT_TYPE, content_type);
                }
                builder.body(data)
            }
            None => builder,
        };

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))?;
        let status = response.status().as_u16();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        trace!(method = %method, url = %url, status, bytes = bytes.len(), "[Transport] Response received");

        Ok(RequestResult::new(decode_body(&bytes), status))
    }
}
