//! HTTP transport abstraction
//!
//! The client hands fully addressed and signed [`WireRequest`]s to a
//! [`Transport`]. [`HttpTransport`] is the reqwest-backed implementation;
//! tests plug in an in-memory store instead.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::Method;
use quiver_core::config::TransportSettings;
use quiver_core::{Error, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

/// A request ready to be put on the wire
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub use_ssl: bool,
    /// Host without port; IPv6 literals keep their brackets
    pub host: String,
    pub port: u16,
    /// Escaped path including the query string
    pub path: String,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl WireRequest {
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Streamed response body
pub struct ResponseBody(BoxStream<'static, Result<Bytes>>);

impl ResponseBody {
    pub fn from_stream(stream: BoxStream<'static, Result<Bytes>>) -> Self {
        Self(stream)
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Self::empty();
        }
        Self(stream::once(async move { Ok(bytes) }).boxed())
    }

    pub fn empty() -> Self {
        Self(stream::empty().boxed())
    }

    /// Collect the whole body
    pub async fn bytes(self) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        let mut stream = self.0;
        while let Some(chunk) = stream.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    pub async fn text(self) -> Result<String> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Protocol(format!("response body is not UTF-8: {}", e)))
    }

    pub fn into_stream(self) -> BoxStream<'static, Result<Bytes>> {
        self.0
    }

    pub fn into_async_read(self) -> impl AsyncRead + Send + Unpin {
        StreamReader::new(
            self.0
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
        )
    }
}

impl std::fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ResponseBody")
    }
}

#[derive(Debug)]
pub struct WireResponse {
    pub status: u16,
    /// Lower-cased header names
    pub headers: BTreeMap<String, String>,
    pub body: ResponseBody,
}

impl WireResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// Sends signed requests to the store
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(settings: &TransportSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
            .pool_max_idle_per_host(settings.pool_idle_per_host)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self { client })
    }

    fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap> {
        let mut map = HeaderMap::with_capacity(headers.len());
        for (name, value) in headers {
            // reqwest derives these from the URL and the body
            if name == "host" || name == "content-length" {
                continue;
            }
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidArgument(format!("header {}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidArgument(format!("header {}: {}", name, e)))?;
            map.insert(name, value);
        }
        Ok(map)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let headers = Self::header_map(&request.headers)?;

        let response = self
            .client
            .request(request.method.clone(), request.url())
            .headers(headers)
            .body(request.body)
            .send()
            .await
            .map_err(|e| Error::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let body = response
            .bytes_stream()
            .map_err(|e| Error::Transport(e.to_string()))
            .boxed();

        Ok(WireResponse {
            status,
            headers,
            body: ResponseBody::from_stream(body),
        })
    }
}
