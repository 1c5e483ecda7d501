use std::time::Duration;

use apiflow_core::error::{Classify, ErrorKind};
use async_trait::async_trait;

/// A fully templated request, ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreparedRequest {
    pub method: String,
    pub url: String,
    /// Order and duplicates are preserved.
    pub headers: Vec<(String, String)>,
    pub queries: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl PreparedRequest {
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    /// Receive order, duplicates kept.
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum HttpError {
    #[error("dispatch failed: timeout")]
    Timeout,
    #[error("dispatch failed: connect/dns/tls error: {0}")]
    Network(String),
    #[error("dispatch failed: response too large (>{max_bytes} bytes)")]
    ResponseTooLarge { max_bytes: usize },
    #[error("dispatch failed: {0}")]
    Other(String),
}

impl Classify for HttpError {
    fn kind(&self) -> ErrorKind {
        match self {
            HttpError::Timeout => ErrorKind::DeadlineExceeded,
            _ => ErrorKind::Internal,
        }
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(
        &self,
        req: PreparedRequest,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<HttpResponse, HttpError>;
}

pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("apiflow-exec/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "custom http client rejected, using defaults");
                reqwest::Client::new()
            });
        Self { client }
    }
}

impl ReqwestHttpClient {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn send(
        &self,
        req: PreparedRequest,
        timeout: Duration,
        max_response_bytes: usize,
    ) -> Result<HttpResponse, HttpError> {
        let method = reqwest::Method::from_bytes(req.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| HttpError::Other(format!("method {:?}: {e}", req.method)))?;
        let mut rb = self.client.request(method, &req.url).timeout(timeout);
        if !req.queries.is_empty() {
            rb = rb.query(&req.queries);
        }
        for (k, v) in &req.headers {
            rb = rb.header(k, v);
        }
        rb = rb.body(req.body);

        let mut resp = rb.send().await.map_err(map_reqwest_error)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .map(|(k, v)| (k.to_string(), String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();

        // Drain the stream fully; the cap is enforced while reading.
        let mut body = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(map_reqwest_error)? {
            if body.len() + chunk.len() > max_response_bytes {
                return Err(HttpError::ResponseTooLarge {
                    max_bytes: max_response_bytes,
                });
            }
            body.extend_from_slice(&chunk);
        }

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> HttpError {
    if e.is_timeout() {
        return HttpError::Timeout;
    }
    if e.is_connect() || e.is_request() {
        return HttpError::Network(e.to_string());
    }
    HttpError::Other(e.to_string())
}
