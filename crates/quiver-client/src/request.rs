//! Logical operations and their translation into signed wire requests

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::Method;
use quiver_auth::{sign_v4, Credentials, UNSIGNED_PAYLOAD};
use quiver_core::utils::{
    amazon_endpoint, format_amz_date, is_amazon_endpoint, is_virtual_host_compatible,
    uri_resource_escape, validate_bucket_name, validate_object_name,
};
use quiver_core::{ClientConfig, Result};
use quiver_crypto::{md5_base64, sha256_hex};
use std::collections::BTreeMap;

use crate::transport::WireRequest;

/// One S3 call before addressing and signing
#[derive(Debug, Clone)]
pub struct S3Request {
    pub method: Method,
    pub bucket: Option<String>,
    pub object: Option<String>,
    /// Already escaped query string, without the leading `?`
    pub query: Option<String>,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
    /// Hex SHA-256 of the body when the caller already computed it
    pub content_sha256: Option<String>,
    /// Sign for this region instead of resolving the bucket's region
    pub region: Option<String>,
    /// Force path-style addressing
    pub path_style: bool,
    pub expected_status: u16,
}

impl S3Request {
    pub fn new(method: Method) -> Self {
        Self {
            method,
            bucket: None,
            object: None,
            query: None,
            headers: BTreeMap::new(),
            body: Bytes::new(),
            content_sha256: None,
            region: None,
            path_style: false,
            expected_status: 200,
        }
    }

    pub fn bucket(mut self, bucket: impl Into<String>) -> Self {
        self.bucket = Some(bucket.into());
        self
    }

    pub fn object(mut self, object: impl Into<String>) -> Self {
        self.object = Some(object.into());
        self
    }

    pub fn query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.query = (!query.is_empty()).then_some(query);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in headers {
            self.headers.insert(name.into(), value.into());
        }
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    pub fn content_sha256(mut self, digest: Option<String>) -> Self {
        self.content_sha256 = digest;
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn path_style(mut self) -> Self {
        self.path_style = true;
        self
    }

    pub fn expect(mut self, status: u16) -> Self {
        self.expected_status = status;
        self
    }

    /// `bucket/object` for log lines and error resources
    pub fn resource(&self) -> String {
        match (&self.bucket, &self.object) {
            (Some(b), Some(o)) => format!("/{}/{}", b, o),
            (Some(b), None) => format!("/{}", b),
            _ => "/".to_string(),
        }
    }
}

/// Where a request is sent: host header value and escaped path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    pub host: String,
    pub port: u16,
    /// `host` header value, with the port when it is not the scheme default
    pub host_header: String,
    pub path: String,
}

/// Turns [`S3Request`]s into signed [`WireRequest`]s for one endpoint
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    host: String,
    port: u16,
    default_port: u16,
    use_ssl: bool,
    virtual_host_style: bool,
    enable_sha256: bool,
    credentials: Credentials,
    user_agent: String,
}

impl RequestBuilder {
    pub fn new(config: &ClientConfig) -> Self {
        let mut user_agent = format!(
            "Quiver ({}; {}) quiver-rs/{}",
            std::env::consts::OS,
            std::env::consts::ARCH,
            quiver_core::VERSION
        );
        if let (Some(name), Some(version)) = (&config.app_name, &config.app_version) {
            user_agent.push_str(&format!(" {}/{}", name, version));
        }

        // IPv6 literals need brackets in both the URL and the host header
        let host = if config.endpoint.contains(':') && !config.endpoint.starts_with('[') {
            format!("[{}]", config.endpoint)
        } else {
            config.endpoint.clone()
        };

        Self {
            host,
            port: config.effective_port(),
            default_port: config.default_port(),
            use_ssl: config.use_ssl,
            virtual_host_style: config.virtual_host_style,
            enable_sha256: config.enable_sha256(),
            credentials: Credentials::from_config(config),
            user_agent,
        }
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn scheme(&self) -> &'static str {
        if self.use_ssl {
            "https"
        } else {
            "http"
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Resolve host and path for `request` targeting `region`
    pub fn address(&self, request: &S3Request, region: &str) -> Result<Address> {
        if let Some(bucket) = &request.bucket {
            validate_bucket_name(bucket)?;
        }
        if let Some(object) = &request.object {
            validate_object_name(object)?;
        }

        let mut host = self.host.clone();
        if is_amazon_endpoint(&host) && !region.is_empty() {
            host = amazon_endpoint(region);
        }

        let virtual_style = match &request.bucket {
            Some(bucket) => {
                self.virtual_host_style
                    && !request.path_style
                    && is_virtual_host_compatible(bucket, self.use_ssl)
            }
            None => false,
        };

        let mut path = String::new();
        match (&request.bucket, virtual_style) {
            (Some(bucket), true) => host = format!("{}.{}", bucket, host),
            (Some(bucket), false) => {
                path.push('/');
                path.push_str(bucket);
            }
            (None, _) => {}
        }
        if let Some(object) = &request.object {
            path.push('/');
            path.push_str(&uri_resource_escape(object));
        }
        if path.is_empty() {
            path.push('/');
        }
        if let Some(query) = &request.query {
            path.push('?');
            path.push_str(query);
        }

        let host_header = if self.port == self.default_port {
            host.clone()
        } else {
            format!("{}:{}", host, self.port)
        };

        Ok(Address {
            host,
            port: self.port,
            host_header,
            path,
        })
    }

    /// Address, add the standard headers and sign `request`
    pub fn build(
        &self,
        request: &S3Request,
        region: &str,
        request_date: &DateTime<Utc>,
    ) -> Result<WireRequest> {
        let address = self.address(request, region)?;

        let mut headers: BTreeMap<String, String> = request
            .headers
            .iter()
            .map(|(k, v)| (k.to_lowercase(), v.clone()))
            .collect();
        headers.insert("host".into(), address.host_header.clone());
        headers.insert("user-agent".into(), self.user_agent.clone());

        if matches!(request.method, Method::PUT | Method::POST | Method::DELETE) {
            headers.insert("content-length".into(), request.body.len().to_string());
        }
        if !self.enable_sha256 && !request.body.is_empty() && !headers.contains_key("content-md5")
        {
            headers.insert("content-md5".into(), md5_base64(&request.body));
        }

        if !self.credentials.is_anonymous() {
            let payload_hash = if self.enable_sha256 {
                request
                    .content_sha256
                    .clone()
                    .unwrap_or_else(|| sha256_hex(&request.body))
            } else {
                UNSIGNED_PAYLOAD.to_string()
            };
            headers.insert("x-amz-date".into(), format_amz_date(request_date));
            headers.insert("x-amz-content-sha256".into(), payload_hash);
            if let Some(token) = &self.credentials.session_token {
                headers.insert("x-amz-security-token".into(), token.clone());
            }

            let authorization = sign_v4(
                request.method.as_str(),
                &address.path,
                &headers,
                &self.credentials,
                region,
                request_date,
            )?;
            headers.insert("authorization".into(), authorization);
        }

        Ok(WireRequest {
            method: request.method.clone(),
            use_ssl: self.use_ssl,
            host: address.host,
            port: address.port,
            path: address.path,
            headers,
            body: request.body.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use quiver_core::Error;

    fn date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 8, 11, 17, 26, 34).unwrap()
    }

    fn plaintext_config() -> ClientConfig {
        ClientConfig::new("localhost")
            .with_port(9000)
            .with_ssl(false)
            .with_credentials("minio", "minio123")
    }

    #[test]
    fn test_path_style_addressing() {
        let builder = RequestBuilder::new(&plaintext_config());
        let request = S3Request::new(Method::GET)
            .bucket("photos")
            .object("2017/summer holiday+1.jpg")
            .query("uploadId=abc");

        let wire = builder.build(&request, "us-east-1", &date()).unwrap();
        assert_eq!(wire.host, "localhost");
        assert_eq!(wire.path, "/photos/2017/summer%20holiday%2B1.jpg?uploadId=abc");
        assert_eq!(wire.header("host"), Some("localhost:9000"));
        assert_eq!(wire.header("x-amz-date"), Some("20170811T172634Z"));
        assert_eq!(wire.header("x-amz-content-sha256"), Some(quiver_crypto::EMPTY_SHA256));
        assert!(wire.header("authorization").unwrap().starts_with(
            "AWS4-HMAC-SHA256 Credential=minio/20170811/us-east-1/s3/aws4_request"
        ));
        assert!(wire.header("content-length").is_none());
        assert!(wire.header("user-agent").unwrap().starts_with("Quiver ("));
    }

    #[test]
    fn test_virtual_host_addressing() {
        let config = ClientConfig::new("s3.amazonaws.com")
            .with_credentials("ak", "sk")
            .with_virtual_host_style(true);
        let builder = RequestBuilder::new(&config);

        let request = S3Request::new(Method::GET).bucket("photos").object("a.jpg");
        let address = builder.address(&request, "eu-west-1").unwrap();
        assert_eq!(address.host_header, "photos.s3.eu-west-1.amazonaws.com");
        assert_eq!(address.path, "/a.jpg");

        // Dotted buckets break TLS wildcard certificates
        let request = S3Request::new(Method::GET).bucket("my.photos").object("a.jpg");
        let address = builder.address(&request, "eu-west-1").unwrap();
        assert_eq!(address.host_header, "s3.eu-west-1.amazonaws.com");
        assert_eq!(address.path, "/my.photos/a.jpg");

        let request = S3Request::new(Method::GET)
            .bucket("photos")
            .query("location")
            .path_style();
        let address = builder.address(&request, "us-east-1").unwrap();
        assert_eq!(address.host_header, "s3.amazonaws.com");
        assert_eq!(address.path, "/photos?location");
    }

    #[test]
    fn test_tls_uses_unsigned_payload_and_md5() {
        let config = ClientConfig::new("play.min.io").with_credentials("ak", "sk");
        let builder = RequestBuilder::new(&config);
        let request = S3Request::new(Method::PUT)
            .bucket("bkt")
            .object("k")
            .body(Bytes::from_static(b"hello"));

        let wire = builder.build(&request, "us-east-1", &date()).unwrap();
        assert_eq!(wire.header("host"), Some("play.min.io"));
        assert_eq!(wire.header("x-amz-content-sha256"), Some("UNSIGNED-PAYLOAD"));
        assert_eq!(wire.header("content-md5"), Some("XUFAKrxLKna5cZ2REBfFkg=="));
        assert_eq!(wire.header("content-length"), Some("5"));
    }

    #[test]
    fn test_anonymous_requests_are_unsigned() {
        let builder = RequestBuilder::new(&ClientConfig::new("play.min.io"));
        let request = S3Request::new(Method::GET).bucket("public").object("file");
        let wire = builder.build(&request, "us-east-1", &date()).unwrap();
        assert!(wire.header("authorization").is_none());
        assert!(wire.header("x-amz-date").is_none());
    }

    #[test]
    fn test_session_token_and_app_info() {
        let mut config = plaintext_config().with_session_token("token");
        config.app_name = Some("backup".into());
        config.app_version = Some("1.2".into());
        let builder = RequestBuilder::new(&config);
        assert!(builder.user_agent().ends_with(" backup/1.2"));

        let wire = builder
            .build(&S3Request::new(Method::GET), "us-east-1", &date())
            .unwrap();
        assert_eq!(wire.path, "/");
        assert_eq!(wire.header("x-amz-security-token"), Some("token"));
        assert!(wire
            .header("authorization")
            .unwrap()
            .contains("x-amz-security-token"));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let builder = RequestBuilder::new(&plaintext_config());
        let err = builder
            .build(&S3Request::new(Method::GET).bucket("Bad_Bucket"), "us-east-1", &date())
            .unwrap_err();
        assert!(matches!(err, Error::InvalidBucketName(_)));

        let err = builder
            .build(
                &S3Request::new(Method::GET).bucket("bucket").object(""),
                "us-east-1",
                &date(),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidObjectName(_)));
    }
}
