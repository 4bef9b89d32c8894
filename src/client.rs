//! HTTP transport with process-wide rate limiting

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Empty};
use hyper::header::{ACCEPT, USER_AGENT};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use crate::error::{Result, VkError};
use crate::rate_limiter::RateLimiter;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

/// A single outbound GET request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: Url,
    /// Upper bound on the whole exchange, response body included
    pub timeout: Duration,
}

impl Request {
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self { url, timeout }
    }
}

/// Sends requests to VK and decodes JSON responses
///
/// Errors are returned as-is; retry policy belongs to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Value>;
}

/// hyper-based transport over rustls
pub struct HttpTransport {
    client: HttpsClient,
}

impl HttpTransport {
    /// Build a client trusting the platform's native roots
    pub fn new() -> Result<Self> {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_native_roots()
            .map_err(|e| VkError::Config(format!("Failed to load TLS roots: {}", e)))?
            .https_or_http()
            .enable_http1()
            .build();

        Ok(Self::from_connector(connector))
    }

    /// Build a client with an explicit rustls configuration
    pub fn with_tls_config(config: rustls::ClientConfig) -> Self {
        let connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(config)
            .https_or_http()
            .enable_http1()
            .build();

        Self::from_connector(connector)
    }

    fn from_connector(connector: HttpsConnector<HttpConnector>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    async fn execute(&self, url: &Url) -> Result<Value> {
        let http_request = hyper::Request::get(url.as_str())
            .header(USER_AGENT, concat!("vk-mark-important/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, "application/json")
            .body(Empty::<Bytes>::new())?;

        let response = self.client.request(http_request).await?;
        let status = response.status();
        let body = response.into_body().collect().await?.to_bytes();

        if !status.is_success() {
            return Err(VkError::HttpStatus {
                status: status.as_u16(),
                message: status.canonical_reason().unwrap_or("Unknown").to_string(),
            });
        }

        trace!("Response body: {} bytes", body.len());
        serde_json::from_slice(&body).map_err(|e| {
            VkError::InvalidResponse(format!("Response is not valid JSON: {}", e))
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Value> {
        debug!("GET {}{}", request.url.host_str().unwrap_or(""), request.url.path());

        match tokio::time::timeout(request.timeout, self.execute(&request.url)).await {
            Ok(result) => result,
            Err(_) => Err(VkError::Timeout(request.timeout)),
        }
    }
}

/// Transport decorator that takes a slot from the shared limiter first
pub struct RateLimitedTransport<T> {
    inner: T,
    limiter: RateLimiter,
}

impl<T> RateLimitedTransport<T>
where
    T: Transport,
{
    pub fn new(inner: T, limiter: RateLimiter) -> Self {
        Self { inner, limiter }
    }

    /// Get the shared limiter handle
    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }
}

#[async_trait]
impl<T> Transport for RateLimitedTransport<T>
where
    T: Transport,
{
    async fn send(&self, request: Request) -> Result<Value> {
        self.limiter.acquire().await;
        self.inner.send(request).await
    }
}

// Shared ownership: every account holds an Arc to the same transport
#[async_trait]
impl<T> Transport for Arc<T>
where
    T: Transport + ?Sized,
{
    async fn send(&self, request: Request) -> Result<Value> {
        self.as_ref().send(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    struct CountingTransport {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Transport for CountingTransport {
        async fn send(&self, _request: Request) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"response": 1}))
        }
    }

    fn request() -> Request {
        Request::get(
            Url::parse("https://api.vk.com/method/users.get").unwrap(),
            Duration::from_secs(30),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_transport_delegates() {
        let transport = RateLimitedTransport::new(
            CountingTransport {
                calls: AtomicU32::new(0),
            },
            RateLimiter::new(3, Duration::from_secs(1)),
        );

        let value = transport.send(request()).await.unwrap();
        assert_eq!(value, json!({"response": 1}));
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transport.limiter().stats().await.total_operations, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_transport_throttles() {
        let transport = RateLimitedTransport::new(
            CountingTransport {
                calls: AtomicU32::new(0),
            },
            RateLimiter::new(2, Duration::from_secs(1)),
        );
        let start = Instant::now();

        for _ in 0..3 {
            transport.send(request()).await.unwrap();
        }

        assert!(start.elapsed() >= Duration::from_secs(1));
        assert_eq!(transport.inner.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_arc_dyn_transport() {
        let transport: Arc<dyn Transport> = Arc::new(CountingTransport {
            calls: AtomicU32::new(0),
        });
        assert!(transport.send(request()).await.is_ok());
    }
}
