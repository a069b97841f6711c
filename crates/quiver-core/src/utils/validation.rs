//! Naming rules for buckets, objects and endpoints

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::IpAddr;

use crate::{Error, Result};

static BUCKET_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9.-]+[a-z0-9]$").expect("static regex"));

static IPV4_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9]+\.[0-9]+\.[0-9]+\.[0-9]+$").expect("static regex"));

static DOMAIN_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_]([A-Za-z0-9_-]*[A-Za-z0-9_])?$").expect("static regex"));

pub fn validate_bucket_name(name: &str) -> Result<()> {
    if name.len() < crate::MIN_BUCKET_NAME_LENGTH {
        return Err(Error::InvalidBucketName(format!(
            "{}: too short (min {} characters)",
            name,
            crate::MIN_BUCKET_NAME_LENGTH
        )));
    }
    if name.len() > crate::MAX_BUCKET_NAME_LENGTH {
        return Err(Error::InvalidBucketName(format!(
            "{}: too long (max {} characters)",
            name,
            crate::MAX_BUCKET_NAME_LENGTH
        )));
    }
    if name.contains("..") || name.contains(".-") || name.contains("-.") {
        return Err(Error::InvalidBucketName(format!(
            "{}: consecutive separators",
            name
        )));
    }
    if IPV4_LIKE.is_match(name) {
        return Err(Error::InvalidBucketName(format!(
            "{}: formatted as an IP address",
            name
        )));
    }
    if !BUCKET_NAME.is_match(name) {
        return Err(Error::InvalidBucketName(format!(
            "{}: only lowercase letters, digits, '.' and '-' are allowed",
            name
        )));
    }
    Ok(())
}

pub fn validate_object_name(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidObjectName("key cannot be empty".into()));
    }
    if key.len() > crate::MAX_KEY_LENGTH {
        return Err(Error::InvalidObjectName(format!(
            "key too long (max {} bytes)",
            crate::MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

pub fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.len() > crate::MAX_KEY_LENGTH {
        return Err(Error::InvalidPrefix(format!(
            "prefix too long (max {} bytes)",
            crate::MAX_KEY_LENGTH
        )));
    }
    Ok(())
}

/// A host name without scheme, path or port
pub fn is_valid_domain(host: &str) -> bool {
    if host.is_empty() || host.len() > 255 {
        return false;
    }
    host.split('.').all(|label| label.len() <= 63 && DOMAIN_LABEL.is_match(label))
}

pub fn is_valid_ip(host: &str) -> bool {
    host.trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<IpAddr>()
        .is_ok()
}

pub fn validate_endpoint(host: &str) -> Result<()> {
    if host.contains("://") {
        return Err(Error::InvalidEndpoint(format!(
            "{}: endpoint must not include a scheme",
            host
        )));
    }
    if !is_valid_domain(host) && !is_valid_ip(host) {
        return Err(Error::InvalidEndpoint(host.to_string()));
    }
    Ok(())
}

pub fn is_amazon_endpoint(host: &str) -> bool {
    host == "s3.amazonaws.com"
        || host == "s3.cn-north-1.amazonaws.com.cn"
        || (host.starts_with("s3") && host.ends_with(".amazonaws.com"))
        || (host.starts_with("s3") && host.ends_with(".amazonaws.com.cn"))
}

/// Regional Amazon S3 host for `region`
pub fn amazon_endpoint(region: &str) -> String {
    match region {
        "us-east-1" | "" => "s3.amazonaws.com".to_string(),
        r if r.starts_with("cn-") => format!("s3.{}.amazonaws.com.cn", r),
        r => format!("s3.{}.amazonaws.com", r),
    }
}

/// Buckets with dots break wildcard TLS certificates for virtual-host addressing.
pub fn is_virtual_host_compatible(bucket: &str, use_ssl: bool) -> bool {
    validate_bucket_name(bucket).is_ok() && !(use_ssl && bucket.contains('.'))
}
