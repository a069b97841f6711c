//! Utility functions

mod validation;

pub use validation::*;

use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

/// Characters left intact by [`uri_escape`] (RFC 3986 unreserved set).
const URI_ESCAPE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Same as [`URI_ESCAPE_SET`] but keeps path separators.
const URI_RESOURCE_ESCAPE_SET: &AsciiSet = &URI_ESCAPE_SET.remove(b'/');

/// Percent-encode everything outside the unreserved set
pub fn uri_escape(s: &str) -> String {
    utf8_percent_encode(s, URI_ESCAPE_SET).to_string()
}

/// Percent-encode an object path, keeping `/` separators
pub fn uri_resource_escape(s: &str) -> String {
    utf8_percent_encode(s, URI_RESOURCE_ESCAPE_SET).to_string()
}

/// Parse ETag (remove quotes, including XML-escaped ones)
pub fn parse_etag(etag: &str) -> String {
    let mut etag = etag.trim();
    for quote in ["\"", "&quot;", "&#34;"] {
        etag = etag.strip_prefix(quote).unwrap_or(etag);
        etag = etag.strip_suffix(quote).unwrap_or(etag);
    }
    etag.to_string()
}

/// XML escape string
pub fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// `x-amz-date` timestamp, e.g. `20130524T000000Z`
pub fn format_amz_date(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Credential scope date, e.g. `20130524`
pub fn format_amz_date_short(dt: &DateTime<Utc>) -> String {
    dt.format("%Y%m%d").to_string()
}

/// Parse an `x-amz-date` timestamp
pub fn parse_amz_date(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y%m%dT%H%M%SZ")
        .ok()
        .map(|dt| dt.and_utc())
}

/// Format datetime for S3 documents
pub fn format_s3_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Format datetime for HTTP headers
pub fn format_http_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Parse an ISO-8601 timestamp as found in listing documents
pub fn parse_s3_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parse an RFC 1123 timestamp as found in `Last-Modified` headers
pub fn parse_http_datetime(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(s.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
