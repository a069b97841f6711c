//! Client facade and request execution

use chrono::Utc;
use http::Method;
use quiver_auth::{redact_signature, Credentials};
use quiver_core::{ClientConfig, Error, Result, S3Error, DEFAULT_REGION};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::region::{MemoryRegionCache, RegionCache};
use crate::request::{RequestBuilder, S3Request};
use crate::transport::{HttpTransport, Transport, WireResponse};

/// Builder for [`Client`]
pub struct ClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    region_cache: Option<Arc<dyn RegionCache>>,
}

impl ClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            region_cache: None,
        }
    }

    /// Replace the reqwest transport
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share a region cache between clients
    pub fn region_cache(mut self, cache: Arc<dyn RegionCache>) -> Self {
        self.region_cache = Some(cache);
        self
    }

    /// Application name and version appended to the user agent
    pub fn app_info(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.config.app_name = Some(name.into());
        self.config.app_version = Some(version.into());
        self
    }

    pub fn build(self) -> Result<Client> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(&self.config.transport)?),
        };
        let region_cache = self
            .region_cache
            .unwrap_or_else(|| Arc::new(MemoryRegionCache::new()));

        Ok(Client {
            inner: Arc::new(ClientInner {
                credentials: Credentials::from_config(&self.config),
                builder: RequestBuilder::new(&self.config),
                config: self.config,
                transport,
                region_cache,
            }),
        })
    }
}

struct ClientInner {
    config: ClientConfig,
    credentials: Credentials,
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
    region_cache: Arc<dyn RegionCache>,
}

/// S3-compatible object storage client.
///
/// Cheap to clone; clones share the transport and the region cache.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("endpoint", &self.inner.config.endpoint)
            .field("credentials", &self.inner.credentials)
            .finish()
    }
}

impl Client {
    /// Client with the reqwest transport and an in-memory region cache
    pub fn new(config: ClientConfig) -> Result<Self> {
        ClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> ClientBuilder {
        ClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn region_cache(&self) -> &Arc<dyn RegionCache> {
        &self.inner.region_cache
    }

    pub(crate) fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    pub(crate) fn request_builder(&self) -> &RequestBuilder {
        &self.inner.builder
    }

    pub fn is_anonymous(&self) -> bool {
        self.inner.credentials.is_anonymous()
    }

    /// Signing region for a request on `bucket`
    pub(crate) async fn region_for(&self, bucket: Option<&str>) -> Result<String> {
        match bucket {
            Some(bucket) => self.get_bucket_region(bucket).await,
            None => Ok(self
                .inner
                .config
                .region
                .clone()
                .unwrap_or_else(|| DEFAULT_REGION.to_string())),
        }
    }

    /// Run `request`, resolving its signing region first
    pub(crate) async fn execute(&self, request: S3Request) -> Result<WireResponse> {
        let region = match &request.region {
            Some(region) => region.clone(),
            None => self.region_for(request.bucket.as_deref()).await?,
        };
        self.execute_in_region(request, &region).await
    }

    /// Sign `request` for `region`, send it and check the status.
    ///
    /// Any failure evicts the bucket from the region cache so the next call
    /// looks its region up again.
    pub(crate) async fn execute_in_region(
        &self,
        request: S3Request,
        region: &str,
    ) -> Result<WireResponse> {
        let wire = self.inner.builder.build(&request, region, &Utc::now())?;

        debug!(
            method = %wire.method,
            url = %wire.url(),
            region = %region,
            authorization = %wire
                .header("authorization")
                .map(redact_signature)
                .unwrap_or_default(),
            "Sending request"
        );

        let response = match self.inner.transport.send(wire).await {
            Ok(response) => response,
            Err(err) => {
                warn!(resource = %request.resource(), error = %err, "Request failed");
                self.evict(&request);
                return Err(err);
            }
        };

        debug!(status = response.status, resource = %request.resource(), "Received response");

        if response.status == request.expected_status {
            return Ok(response);
        }

        self.evict(&request);
        Err(self.response_error(&request, response).await)
    }

    fn evict(&self, request: &S3Request) {
        if let Some(bucket) = &request.bucket {
            self.inner.region_cache.remove(bucket);
        }
    }

    /// Structured error for a response with an unexpected status
    async fn response_error(&self, request: &S3Request, response: WireResponse) -> Error {
        let status = response.status;
        let request_id = response.header("x-amz-request-id").map(String::from);
        let id_2 = response.header("x-amz-id-2").map(String::from);

        let body = if request.method == Method::HEAD {
            String::new()
        } else {
            match response.body.text().await {
                Ok(body) => body,
                Err(err) => return err,
            }
        };

        let from_status = || {
            S3Error::from_status(status, request.bucket.as_deref(), request.object.as_deref())
                .with_resource(request.resource())
        };
        let mut error = if body.trim().is_empty() {
            from_status()
        } else {
            match S3Error::from_xml(&body) {
                Ok(error) => error,
                Err(err) => {
                    debug!(status = status, error = %err, "Error body is not XML");
                    let mut error = from_status();
                    error.message = body.trim().to_string();
                    error
                }
            }
        };

        error.status = status;
        if error.request_id.is_none() {
            error.request_id = request_id.clone();
        }
        error.amz_request_id = request_id;
        error.amz_id_2 = id_2;

        debug!(code = %error.code, status = status, "Store returned error");
        error.into()
    }
}
