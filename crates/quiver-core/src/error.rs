//! Error types for Quiver

use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // Argument Errors
    #[error("Invalid bucket name: {0}")]
    InvalidBucketName(String),

    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    #[error("Invalid prefix: {0}")]
    InvalidPrefix(String),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("Invalid port: {0}")]
    InvalidPort(String),

    #[error("Invalid expiry: {0}")]
    InvalidExpiry(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // Credential Errors
    #[error("Unable to sign {0} request without credentials")]
    AnonymousRequest(String),

    // Store Errors
    #[error("{0}")]
    S3(Box<S3Error>),

    #[error("Transport error: {0}")]
    Transport(String),

    // Transfer Errors
    #[error("Stream size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },

    #[error("Downloaded size mismatch: expected {expected} bytes, got {actual}")]
    IntegrityMismatch { expected: u64, actual: u64 },

    // Protocol Errors
    #[error("Malformed XML response: {0}")]
    InvalidXml(String),

    #[error("Missing field in response: {0}")]
    MissingField(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Coarse classification of [`Error`] used for control flow by callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input caught before any network call
    Argument,
    /// The client holds no credentials
    AnonymousAccess,
    /// Signing region mismatch or credential rejection
    Authorization,
    /// Transport failure or unexpected status
    Network,
    /// Declared size does not match the stream
    Size,
    /// Downloaded data disagrees with the remote object
    Integrity,
    /// Unexpected or missing field in a response
    Protocol,
    /// Local filesystem failure
    Filesystem,
}

const AUTHORIZATION_CODES: &[&str] = &[
    "AuthorizationHeaderMalformed",
    "AccessDenied",
    "SignatureDoesNotMatch",
    "InvalidAccessKeyId",
    "ExpiredToken",
    "InvalidToken",
];

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidBucketName(_)
            | Error::InvalidObjectName(_)
            | Error::InvalidPrefix(_)
            | Error::InvalidEndpoint(_)
            | Error::InvalidPort(_)
            | Error::InvalidExpiry(_)
            | Error::InvalidArgument(_) => ErrorKind::Argument,

            Error::AnonymousRequest(_) => ErrorKind::AnonymousAccess,

            Error::S3(err) if AUTHORIZATION_CODES.contains(&err.code.as_str()) => {
                ErrorKind::Authorization
            }
            Error::S3(_) | Error::Transport(_) => ErrorKind::Network,

            Error::SizeMismatch { .. } => ErrorKind::Size,
            Error::IntegrityMismatch { .. } => ErrorKind::Integrity,

            Error::InvalidXml(_)
            | Error::MissingField(_)
            | Error::Protocol(_)
            | Error::Json(_) => ErrorKind::Protocol,

            Error::Io(_) => ErrorKind::Filesystem,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Error::InvalidBucketName(_) => "InvalidBucketName",
            Error::InvalidObjectName(_) => "InvalidObjectName",
            Error::InvalidPrefix(_) => "InvalidPrefix",
            Error::InvalidEndpoint(_) => "InvalidEndpoint",
            Error::InvalidPort(_) => "InvalidPort",
            Error::InvalidExpiry(_) => "InvalidExpiry",
            Error::InvalidArgument(_) => "InvalidArgument",
            Error::AnonymousRequest(_) => "AnonymousRequest",
            Error::S3(err) => &err.code,
            Error::Transport(_) => "TransportError",
            Error::SizeMismatch { .. } => "IncompleteBody",
            Error::IntegrityMismatch { .. } => "SizeMismatch",
            Error::InvalidXml(_) | Error::Json(_) => "InvalidXML",
            Error::MissingField(_) | Error::Protocol(_) => "ProtocolError",
            Error::Io(_) => "FilesystemError",
        }
    }

    /// The structured store error, if the store produced one.
    pub fn as_s3(&self) -> Option<&S3Error> {
        match self {
            Error::S3(err) => Some(&**err),
            _ => None,
        }
    }

    pub fn has_code(&self, code: &str) -> bool {
        self.as_s3().map(|e| e.code == code).unwrap_or(false)
    }

    /// Region carried by an `AuthorizationHeaderMalformed` response.
    pub fn corrected_region(&self) -> Option<&str> {
        self.as_s3()
            .filter(|e| e.code == "AuthorizationHeaderMalformed")
            .and_then(|e| e.region.as_deref())
            .filter(|r| !r.is_empty())
    }
}

impl From<S3Error> for Error {
    fn from(err: S3Error) -> Self {
        Error::S3(Box::new(err))
    }
}

impl From<quick_xml::DeError> for Error {
    fn from(err: quick_xml::DeError) -> Self {
        Error::InvalidXml(err.to_string())
    }
}

/// S3 Error Response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct S3Error {
    pub code: String,
    pub message: String,
    pub resource: Option<String>,
    pub request_id: Option<String>,
    pub host_id: Option<String>,
    pub bucket_name: Option<String>,
    pub key: Option<String>,
    pub region: Option<String>,
    /// HTTP status of the response that carried the error
    pub status: u16,
    /// `x-amz-request-id` response header
    pub amz_request_id: Option<String>,
    /// `x-amz-id-2` response header
    pub amz_id_2: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorXml {
    code: Option<String>,
    message: Option<String>,
    bucket_name: Option<String>,
    key: Option<String>,
    resource: Option<String>,
    request_id: Option<String>,
    host_id: Option<String>,
    region: Option<String>,
}

impl S3Error {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Parse an `<Error>` document returned by the store.
    pub fn from_xml(body: &str) -> std::result::Result<Self, quick_xml::DeError> {
        let parsed: ErrorXml = quick_xml::de::from_str(body)?;
        Ok(Self {
            code: parsed.code.unwrap_or_default(),
            message: parsed.message.unwrap_or_default(),
            resource: parsed.resource,
            request_id: parsed.request_id,
            host_id: parsed.host_id,
            bucket_name: parsed.bucket_name,
            key: parsed.key,
            region: parsed.region,
            ..Default::default()
        })
    }

    /// Synthesize an error for responses without a body (HEAD requests).
    pub fn from_status(status: u16, bucket: Option<&str>, key: Option<&str>) -> Self {
        let (code, message) = match status {
            301 => ("MovedPermanently", "Moved Permanently".to_string()),
            307 => (
                "TemporaryRedirect",
                "Are you using the correct endpoint URL?".to_string(),
            ),
            403 => (
                "AccessDenied",
                "Valid and authorized credentials required".to_string(),
            ),
            404 if key.is_some() => ("NoSuchKey", "The specified key does not exist.".to_string()),
            404 if bucket.is_some() => (
                "NoSuchBucket",
                "The specified bucket does not exist.".to_string(),
            ),
            404 => ("NotFound", "Not Found".to_string()),
            405 | 501 => ("MethodNotAllowed", "Method Not Allowed".to_string()),
            _ => ("UnknownError", format!("Unexpected status {}", status)),
        };

        Self {
            code: code.to_string(),
            message,
            bucket_name: bucket.map(String::from),
            key: key.map(String::from),
            status,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn to_xml(&self) -> String {
        let mut xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8"?>"#,
                "<Error><Code>{}</Code><Message>{}</Message>",
                "<Resource>{}</Resource><RequestId>{}</RequestId>"
            ),
            xml_escape(&self.code),
            xml_escape(&self.message),
            xml_escape(self.resource.as_deref().unwrap_or("")),
            xml_escape(self.request_id.as_deref().unwrap_or(""))
        );
        if let Some(region) = &self.region {
            xml.push_str(&format!("<Region>{}</Region>", xml_escape(region)));
        }
        xml.push_str("</Error>");
        xml
    }
}

impl fmt::Display for S3Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)?;
        if let Some(resource) = &self.resource {
            write!(f, " (resource: {})", resource)?;
        }
        Ok(())
    }
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_xml() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AuthorizationHeaderMalformed</Code><Message>the region 'us-east-1' is wrong; expecting 'eu-west-1'</Message><Region>eu-west-1</Region><RequestId>4442587FB7D0A2F9</RequestId></Error>"#;

        let err = S3Error::from_xml(body).unwrap();
        assert_eq!(err.code, "AuthorizationHeaderMalformed");
        assert_eq!(err.region.as_deref(), Some("eu-west-1"));
        assert_eq!(err.request_id.as_deref(), Some("4442587FB7D0A2F9"));

        let err: Error = err.with_status(400).into();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(err.corrected_region(), Some("eu-west-1"));
    }

    #[test]
    fn test_xml_round_trip() {
        let original = S3Error::new("NoSuchKey", "The specified key does not exist.")
            .with_resource("/bucket/a&b")
            .with_request_id("ABC")
            .with_region("us-west-2");

        let parsed = S3Error::from_xml(&original.to_xml()).unwrap();
        assert_eq!(parsed, original);
    }

    #[test]
    fn test_from_status() {
        assert_eq!(S3Error::from_status(404, Some("b"), Some("k")).code, "NoSuchKey");
        assert_eq!(S3Error::from_status(404, Some("b"), None).code, "NoSuchBucket");
        assert_eq!(S3Error::from_status(404, None, None).code, "NotFound");
        assert_eq!(S3Error::from_status(403, None, None).code, "AccessDenied");
        assert_eq!(S3Error::from_status(501, None, None).code, "MethodNotAllowed");
        assert_eq!(S3Error::from_status(502, None, None).code, "UnknownError");
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(Error::InvalidBucketName("x".into()).kind(), ErrorKind::Argument);
        assert_eq!(
            Error::AnonymousRequest("GET".into()).kind(),
            ErrorKind::AnonymousAccess
        );
        assert_eq!(
            Error::SizeMismatch { expected: 1, actual: 2 }.kind(),
            ErrorKind::Size
        );
        assert_eq!(Error::MissingField("UploadId".into()).kind(), ErrorKind::Protocol);
        assert_eq!(
            Error::from(S3Error::new("NoSuchBucket", "gone")).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn test_converted_errors_are_typed() {
        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json);
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.code(), "InvalidXML");

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io);
        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert_eq!(err.code(), "FilesystemError");
    }
}
