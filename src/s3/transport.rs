//! HTTP dispatch layer.
//!
//! The client signs a request and hands it to a [`Transport`] for a single
//! attempt; no retries happen at this layer. Production use goes through
//! hyper with native TLS. Tests substitute an in-memory fake so dispatches
//! can be observed (and counted) without a network.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::HeaderMap;
use hyper::{Method, Request, StatusCode};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client as HyperClient;
use hyper_util::rt::TokioExecutor;
use native_tls::TlsConnector;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;

/// Status, headers and body of one completed exchange
#[derive(Debug)]
pub struct WireResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Failures that happen before a response is available
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("TLS setup error: {0}")]
    Tls(String),

    #[error("request build error: {0}")]
    BuildRequest(String),

    #[error("connection error: {0}")]
    Connect(String),

    #[error("response body error: {0}")]
    Body(String),
}

/// One-shot HTTP execution, injectable so tests can observe dispatches
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<WireResponse, TransportError>;
}

/// Hyper-backed transport over native TLS.
///
/// Created once at client construction and shared across operations; the
/// underlying hyper client is safe for concurrent in-flight requests.
pub struct HttpTransport {
    client: HyperClient<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let mut http = HttpConnector::new();
        http.set_nodelay(true);
        http.enforce_http(false);
        http.set_connect_timeout(Some(Duration::from_secs(10)));
        http.set_keepalive(Some(Duration::from_secs(90)));

        let tls = TlsConnector::new().map_err(|e| TransportError::Tls(e.to_string()))?;
        let https = HttpsConnector::from((http, tls.into()));

        let client = HyperClient::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .set_host(true)
            .build(https);

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        method: Method,
        url: &str,
        headers: &BTreeMap<String, String>,
        body: Bytes,
    ) -> Result<WireResponse, TransportError> {
        let mut req = Request::builder().method(method).uri(url);
        for (key, value) in headers {
            req = req.header(key, value);
        }

        let request = req
            .body(Full::new(body))
            .map_err(|e| TransportError::BuildRequest(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status();
        let resp_headers = response.headers().clone();

        // Always collect the body so the connection returns to the pool
        let body = response
            .collect()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?
            .to_bytes();

        Ok(WireResponse {
            status,
            headers: resp_headers,
            body,
        })
    }
}
