//! Query-string (pre-signed URL) and POST policy signatures

use chrono::{DateTime, Utc};
use quiver_core::types::PresignedLimits;
use quiver_core::utils::{format_amz_date, uri_escape};
use quiver_core::{Error, Result};
use quiver_crypto::hmac_sha256_hex;
use std::collections::BTreeMap;
use tracing::trace;

use crate::signature::{
    canonical_request, get_credential, get_signing_key, signed_header_names, string_to_sign,
    SIGN_V4_ALGORITHM,
};
use crate::Credentials;

const X_AMZ_ALGORITHM: &str = "X-Amz-Algorithm";
const X_AMZ_CREDENTIAL: &str = "X-Amz-Credential";
const X_AMZ_DATE: &str = "X-Amz-Date";
const X_AMZ_EXPIRES: &str = "X-Amz-Expires";
const X_AMZ_SIGNED_HEADERS: &str = "X-Amz-SignedHeaders";
const X_AMZ_SIGNATURE: &str = "X-Amz-Signature";
const X_AMZ_SECURITY_TOKEN: &str = "X-Amz-Security-Token";

pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Sign `path` for query-string authentication.
///
/// Returns the path with the authentication parameters and the signature
/// appended to any query it already carried. Only `host` is signed.
pub fn presign_v4(
    method: &str,
    host: &str,
    path: &str,
    credentials: &Credentials,
    region: &str,
    request_date: &DateTime<Utc>,
    expires: u64,
) -> Result<String> {
    if credentials.is_anonymous() {
        return Err(Error::AnonymousRequest(method.to_string()));
    }
    PresignedLimits::validate_expires(expires)?;

    let mut headers = BTreeMap::new();
    headers.insert("host".to_string(), host.to_string());
    let signed_headers = signed_header_names(&headers);

    let mut auth_query = vec![
        format!("{}={}", X_AMZ_ALGORITHM, SIGN_V4_ALGORITHM),
        format!(
            "{}={}",
            X_AMZ_CREDENTIAL,
            uri_escape(&get_credential(&credentials.access_key, region, request_date))
        ),
        format!("{}={}", X_AMZ_DATE, format_amz_date(request_date)),
        format!("{}={}", X_AMZ_EXPIRES, expires),
        format!(
            "{}={}",
            X_AMZ_SIGNED_HEADERS,
            uri_escape(&signed_headers.join(";"))
        ),
    ];
    if let Some(token) = &credentials.session_token {
        auth_query.push(format!("{}={}", X_AMZ_SECURITY_TOKEN, uri_escape(token)));
    }

    let path = match path.split_once('?') {
        Some((resource, query)) if !query.is_empty() => {
            format!("{}?{}&{}", resource, query, auth_query.join("&"))
        }
        Some((resource, _)) => format!("{}?{}", resource, auth_query.join("&")),
        None => format!("{}?{}", path, auth_query.join("&")),
    };

    let canonical = canonical_request(method, &path, &headers, &signed_headers, UNSIGNED_PAYLOAD);
    trace!("Canonical request for presigning:\n{}", canonical);

    let to_sign = string_to_sign(&canonical, region, request_date);
    let signing_key = get_signing_key(&credentials.secret_key, region, request_date);
    let signature = hmac_sha256_hex(&signing_key, to_sign.as_bytes());

    Ok(format!("{}&{}={}", path, X_AMZ_SIGNATURE, signature))
}

/// Signature of a base64-encoded POST policy document
pub fn post_presign_signature_v4(
    region: &str,
    request_date: &DateTime<Utc>,
    secret_key: &str,
    policy_base64: &str,
) -> String {
    let signing_key = get_signing_key(secret_key, region, request_date);
    hmac_sha256_hex(&signing_key, policy_base64.as_bytes())
}
