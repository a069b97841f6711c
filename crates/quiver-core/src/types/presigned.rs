//! Pre-signed URL types
//!
//! A pre-signed URL embeds the credential scope and signature in its query
//! string, so whoever holds it can perform the request until it expires.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Error, Result};

/// HTTP methods supported for pre-signed URLs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PresignedMethod {
    Get,
    Put,
    Post,
    Delete,
    Head,
}

impl PresignedMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Put => "PUT",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
        }
    }
}

impl std::fmt::Display for PresignedMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Limits for pre-signed URLs
pub struct PresignedLimits;

impl PresignedLimits {
    /// Minimum expiration time (1 second)
    pub const MIN_EXPIRES: u64 = 1;

    /// Maximum expiration time (7 days)
    pub const MAX_EXPIRES: u64 = 7 * 24 * 60 * 60;

    /// Expiration used when the caller gives none (7 days)
    pub const DEFAULT_EXPIRES: u64 = Self::MAX_EXPIRES;

    pub fn validate_expires(seconds: u64) -> Result<u64> {
        if seconds < Self::MIN_EXPIRES {
            Err(Error::InvalidExpiry(format!(
                "expiration must be at least {} second",
                Self::MIN_EXPIRES
            )))
        } else if seconds > Self::MAX_EXPIRES {
            Err(Error::InvalidExpiry(format!(
                "expiration cannot exceed {} seconds (7 days)",
                Self::MAX_EXPIRES
            )))
        } else {
            Ok(seconds)
        }
    }
}

/// Query parameters a pre-signed GET may use to override response headers
pub const RESPONSE_OVERRIDE_PARAMS: &[&str] = &[
    "response-content-type",
    "response-content-language",
    "response-expires",
    "response-cache-control",
    "response-content-disposition",
    "response-content-encoding",
];

pub fn validate_response_params(params: &BTreeMap<String, String>) -> Result<()> {
    match params
        .keys()
        .find(|k| !RESPONSE_OVERRIDE_PARAMS.contains(&k.as_str()))
    {
        Some(key) => Err(Error::InvalidArgument(format!(
            "{} is not a supported response header override",
            key
        ))),
        None => Ok(()),
    }
}

/// Options for generating a pre-signed URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresignOptions {
    /// Validity in seconds
    pub expires: u64,
    /// Extra query parameters included in the signature
    pub params: BTreeMap<String, String>,
    /// Signing time; defaults to now
    pub request_date: Option<DateTime<Utc>>,
}

impl Default for PresignOptions {
    fn default() -> Self {
        Self {
            expires: PresignedLimits::DEFAULT_EXPIRES,
            params: BTreeMap::new(),
            request_date: None,
        }
    }
}

impl PresignOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expires_in(mut self, seconds: u64) -> Self {
        self.expires = seconds;
        self
    }

    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn request_date(mut self, date: DateTime<Utc>) -> Self {
        self.request_date = Some(date);
        self
    }
}

/// Pre-signed URL response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresignedUrl {
    pub url: String,
    pub method: PresignedMethod,
    pub expires_at: DateTime<Utc>,
}

impl PresignedUrl {
    pub fn new(url: String, method: PresignedMethod, signed_at: DateTime<Utc>, expires: u64) -> Self {
        Self {
            url,
            method,
            expires_at: signed_at + Duration::seconds(expires as i64),
        }
    }
}
