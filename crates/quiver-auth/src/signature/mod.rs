//! AWS Signature V4 header signing

use chrono::{DateTime, NaiveDate, Utc};
use quiver_core::utils::{format_amz_date, format_amz_date_short};
use quiver_core::{Error, Result};
use quiver_crypto::{hmac_sha256, hmac_sha256_hex, sha256_hex};
use std::collections::BTreeMap;
use tracing::trace;

use crate::Credentials;

pub const SIGN_V4_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Headers that proxies and clients are free to rewrite
const IGNORED_HEADERS: &[&str] = &["authorization", "content-length", "content-type", "user-agent"];

/// `<date>/<region>/s3/aws4_request`
pub fn get_scope(region: &str, date: &DateTime<Utc>) -> String {
    format!("{}/{}/s3/aws4_request", format_amz_date_short(date), region)
}

pub fn get_credential(access_key: &str, region: &str, date: &DateTime<Utc>) -> String {
    format!("{}/{}", access_key, get_scope(region, date))
}

pub fn get_signing_key(secret_key: &str, region: &str, date: &DateTime<Utc>) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        format_amz_date_short(date).as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, b"s3");
    hmac_sha256(&k_service, b"aws4_request")
}

/// Lower-cased names of the headers covered by the signature, sorted
pub(crate) fn signed_header_names(headers: &BTreeMap<String, String>) -> Vec<String> {
    let mut names: Vec<String> = headers
        .keys()
        .map(|k| k.to_lowercase())
        .filter(|k| !IGNORED_HEADERS.contains(&k.as_str()))
        .collect();
    names.sort();
    names.dedup();
    names
}

fn canonical_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Sort query elements, giving bare keys an empty value
fn canonical_query(query: &str) -> String {
    let mut parts: Vec<String> = query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.contains('=') {
                p.to_string()
            } else {
                format!("{}=", p)
            }
        })
        .collect();
    parts.sort();
    parts.join("&")
}

pub(crate) fn canonical_request(
    method: &str,
    path: &str,
    headers: &BTreeMap<String, String>,
    signed_headers: &[String],
    payload_hash: &str,
) -> String {
    let (resource, query) = path.split_once('?').unwrap_or((path, ""));

    let lowered: BTreeMap<String, &str> = headers
        .iter()
        .map(|(k, v)| (k.to_lowercase(), v.as_str()))
        .collect();

    let mut canonical_headers = String::new();
    for name in signed_headers {
        let value = lowered.get(name).copied().unwrap_or("");
        canonical_headers.push_str(name);
        canonical_headers.push(':');
        canonical_headers.push_str(&canonical_header_value(value));
        canonical_headers.push('\n');
    }

    format!(
        "{}\n{}\n{}\n{}\n{}\n{}",
        method,
        resource,
        canonical_query(query),
        canonical_headers,
        signed_headers.join(";"),
        payload_hash
    )
}

pub(crate) fn string_to_sign(canonical_request: &str, region: &str, date: &DateTime<Utc>) -> String {
    format!(
        "{}\n{}\n{}\n{}",
        SIGN_V4_ALGORITHM,
        format_amz_date(date),
        get_scope(region, date),
        sha256_hex(canonical_request.as_bytes())
    )
}

/// Compute the `Authorization` header for a request.
///
/// `path` is the escaped resource including its query string. The payload
/// hash is taken from the `x-amz-content-sha256` header.
pub fn sign_v4(
    method: &str,
    path: &str,
    headers: &BTreeMap<String, String>,
    credentials: &Credentials,
    region: &str,
    request_date: &DateTime<Utc>,
) -> Result<String> {
    if credentials.is_anonymous() {
        return Err(Error::AnonymousRequest(method.to_string()));
    }

    let payload_hash = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("x-amz-content-sha256"))
        .map(|(_, v)| v.as_str())
        .ok_or_else(|| Error::MissingField("x-amz-content-sha256".into()))?;

    let signed_headers = signed_header_names(headers);
    let canonical = canonical_request(method, path, headers, &signed_headers, payload_hash);
    trace!("Canonical request:\n{}", canonical);

    let to_sign = string_to_sign(&canonical, region, request_date);
    let signing_key = get_signing_key(&credentials.secret_key, region, request_date);
    let signature = hmac_sha256_hex(&signing_key, to_sign.as_bytes());

    Ok(format!(
        "{} Credential={}, SignedHeaders={}, Signature={}",
        SIGN_V4_ALGORITHM,
        get_credential(&credentials.access_key, region, request_date),
        signed_headers.join(";"),
        signature
    ))
}

/// Parsed `Authorization` header
#[derive(Debug, Clone)]
pub struct SignatureV4 {
    pub access_key: String,
    pub signature: String,
    pub signed_headers: Vec<String>,
    pub date: NaiveDate,
    pub region: String,
    pub service: String,
}

impl SignatureV4 {
    pub fn parse(auth_header: &str) -> Result<Self> {
        let rest = auth_header
            .strip_prefix(SIGN_V4_ALGORITHM)
            .map(str::trim_start)
            .ok_or_else(|| Error::InvalidArgument("Invalid authorization header".into()))?;

        let mut credential = None;
        let mut signed_headers = None;
        let mut signature = None;

        for part in rest.split(',').map(str::trim) {
            if let Some(val) = part.strip_prefix("Credential=") {
                credential = Some(val);
            } else if let Some(val) = part.strip_prefix("SignedHeaders=") {
                signed_headers = Some(val);
            } else if let Some(val) = part.strip_prefix("Signature=") {
                signature = Some(val);
            }
        }

        let credential = credential.ok_or_else(|| Error::MissingField("Credential".into()))?;
        let signed_headers =
            signed_headers.ok_or_else(|| Error::MissingField("SignedHeaders".into()))?;
        let signature = signature.ok_or_else(|| Error::MissingField("Signature".into()))?;

        // access_key/date/region/service/aws4_request
        let cred_parts: Vec<&str> = credential.split('/').collect();
        if cred_parts.len() != 5 {
            return Err(Error::InvalidArgument("Invalid credential format".into()));
        }

        let date = NaiveDate::parse_from_str(cred_parts[1], "%Y%m%d")
            .map_err(|_| Error::InvalidArgument("Invalid credential date".into()))?;

        Ok(SignatureV4 {
            access_key: cred_parts[0].to_string(),
            signature: signature.to_string(),
            signed_headers: signed_headers.split(';').map(String::from).collect(),
            date,
            region: cred_parts[2].to_string(),
            service: cred_parts[3].to_string(),
        })
    }
}

/// Replace the signature in an `Authorization` header value for logging
pub fn redact_signature(auth_header: &str) -> String {
    match auth_header.find("Signature=") {
        Some(idx) => format!("{}Signature=**REDACTED**", &auth_header[..idx]),
        None => auth_header.to_string(),
    }
}
