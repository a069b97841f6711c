//! Object types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::utils::format_http_datetime;

/// User metadata and standard content headers, keyed by header name
pub type Metadata = BTreeMap<String, String>;

/// Prefix carried by user-defined metadata headers
pub const USER_METADATA_PREFIX: &str = "x-amz-meta-";

const SUPPORTED_HEADERS: &[&str] = &[
    "content-type",
    "cache-control",
    "content-encoding",
    "content-disposition",
    "content-language",
    "expires",
    "x-amz-website-redirect-location",
    "x-amz-storage-class",
];

fn is_amz_header(key: &str) -> bool {
    key.starts_with(USER_METADATA_PREFIX)
        || key == "x-amz-acl"
        || key.starts_with("x-amz-server-side-encryption")
}

fn is_supported_header(key: &str) -> bool {
    SUPPORTED_HEADERS.contains(&key)
}

/// Turn caller metadata into request headers.
///
/// Keys that are neither standard content headers nor `x-amz-*` storage
/// headers become user metadata (`X-Amz-Meta-<key>`).
pub fn prepend_amz_meta(metadata: &Metadata) -> Metadata {
    metadata
        .iter()
        .map(|(key, value)| {
            let lower = key.to_lowercase();
            if is_amz_header(&lower) || is_supported_header(&lower) {
                (key.clone(), value.clone())
            } else {
                (format!("X-Amz-Meta-{}", key), value.clone())
            }
        })
        .collect()
}

/// Collect metadata from response headers.
///
/// User metadata loses its `x-amz-meta-` prefix; standard content headers are
/// kept under their lower-cased name.
pub fn extract_metadata<'a, I>(headers: I) -> Metadata
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut metadata = Metadata::new();
    for (name, value) in headers {
        let lower = name.to_lowercase();
        if let Some(user_key) = lower.strip_prefix(USER_METADATA_PREFIX) {
            metadata.insert(user_key.to_string(), value.to_string());
        } else if is_amz_header(&lower) || is_supported_header(&lower) {
            metadata.insert(lower, value.to_string());
        }
    }
    metadata
}

/// One object as returned by a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub etag: String,
    pub size: u64,
    pub storage_class: Option<String>,
}

/// An entry yielded by object listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ListEntry {
    Object(ObjectInfo),
    /// A common prefix rolled up by the delimiter
    Prefix { prefix: String },
}

impl ListEntry {
    /// Key or prefix of the entry
    pub fn name(&self) -> &str {
        match self {
            ListEntry::Object(obj) => &obj.key,
            ListEntry::Prefix { prefix } => prefix,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectInfo> {
        match self {
            ListEntry::Object(obj) => Some(obj),
            ListEntry::Prefix { .. } => None,
        }
    }
}

/// Result of a HEAD request on an object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectStat {
    pub size: u64,
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub metadata: Metadata,
}

/// Outcome of a completed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub etag: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyObjectResult {
    pub etag: String,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Per-key failure reported by a bulk delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// Preconditions for a server-side copy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyConditions {
    modified_since: Option<DateTime<Utc>>,
    unmodified_since: Option<DateTime<Utc>>,
    match_etag: Option<String>,
    match_etag_except: Option<String>,
}

impl CopyConditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_modified(&mut self, date: DateTime<Utc>) -> &mut Self {
        self.modified_since = Some(date);
        self
    }

    pub fn set_unmodified(&mut self, date: DateTime<Utc>) -> &mut Self {
        self.unmodified_since = Some(date);
        self
    }

    pub fn set_match_etag(&mut self, etag: impl Into<String>) -> &mut Self {
        self.match_etag = Some(etag.into());
        self
    }

    pub fn set_match_etag_except(&mut self, etag: impl Into<String>) -> &mut Self {
        self.match_etag_except = Some(etag.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// `x-amz-copy-source-*` request headers
    pub fn headers(&self) -> Vec<(String, String)> {
        let mut headers = Vec::new();
        if let Some(date) = &self.modified_since {
            headers.push((
                "x-amz-copy-source-if-modified-since".to_string(),
                format_http_datetime(date),
            ));
        }
        if let Some(date) = &self.unmodified_since {
            headers.push((
                "x-amz-copy-source-if-unmodified-since".to_string(),
                format_http_datetime(date),
            ));
        }
        if let Some(etag) = &self.match_etag {
            headers.push(("x-amz-copy-source-if-match".to_string(), etag.clone()));
        }
        if let Some(etag) = &self.match_etag_except {
            headers.push(("x-amz-copy-source-if-none-match".to_string(), etag.clone()));
        }
        headers
    }
}

/// Byte range requested from an object; `length == 0` reads to the end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    pub fn new(offset: u64, length: u64) -> Self {
        Self { offset, length }
    }

    pub fn from_offset(offset: u64) -> Self {
        Self { offset, length: 0 }
    }

    /// `Range` header value, or `None` when the whole object is requested
    pub fn to_header(&self) -> Option<String> {
        match (self.offset, self.length) {
            (0, 0) => None,
            (offset, 0) => Some(format!("bytes={}-", offset)),
            (offset, length) => Some(format!("bytes={}-{}", offset, offset + length - 1)),
        }
    }
}
