//! Pre-signed URLs and browser POST policies

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{Duration, Utc};
use http::Method;
use quiver_auth::{get_credential, post_presign_signature_v4, presign_v4, SIGN_V4_ALGORITHM};
use quiver_core::types::{
    validate_response_params, PostPolicy, PostPolicyResult, PresignOptions, PresignedLimits,
    PresignedMethod, PresignedUrl,
};
use quiver_core::utils::{format_amz_date, uri_escape};
use quiver_core::{Error, Result};
use tracing::debug;

use crate::client::Client;
use crate::request::S3Request;

impl Client {
    /// URL granting `method` on `bucket/key` until it expires.
    ///
    /// Extra `params` are added to the query and covered by the signature.
    pub async fn presigned_url(
        &self,
        method: PresignedMethod,
        bucket: &str,
        key: &str,
        options: PresignOptions,
    ) -> Result<PresignedUrl> {
        if self.is_anonymous() {
            return Err(Error::AnonymousRequest(method.to_string()));
        }
        PresignedLimits::validate_expires(options.expires)?;

        let region = self.get_bucket_region(bucket).await?;

        let query = options
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", uri_escape(k), uri_escape(v)))
            .collect::<Vec<_>>()
            .join("&");
        let http_method = Method::from_bytes(method.as_str().as_bytes())
            .map_err(|e| Error::InvalidArgument(e.to_string()))?;
        let request = S3Request::new(http_method)
            .bucket(bucket)
            .object(key)
            .query(query);
        let address = self.request_builder().address(&request, &region)?;

        let signed_at = options.request_date.unwrap_or_else(Utc::now);
        let signed_path = presign_v4(
            method.as_str(),
            &address.host_header,
            &address.path,
            self.credentials(),
            &region,
            &signed_at,
            options.expires,
        )?;

        let url = format!(
            "{}://{}{}",
            self.request_builder().scheme(),
            address.host_header,
            signed_path
        );
        debug!(method = %method, bucket = %bucket, key = %key, expires = options.expires, "Presigned URL");

        Ok(PresignedUrl::new(url, method, signed_at, options.expires))
    }

    /// Download URL; `response-*` parameters override the response headers
    pub async fn presigned_get_object(
        &self,
        bucket: &str,
        key: &str,
        options: PresignOptions,
    ) -> Result<PresignedUrl> {
        validate_response_params(&options.params)?;
        self.presigned_url(PresignedMethod::Get, bucket, key, options)
            .await
    }

    pub async fn presigned_put_object(
        &self,
        bucket: &str,
        key: &str,
        expires: u64,
    ) -> Result<PresignedUrl> {
        self.presigned_url(
            PresignedMethod::Put,
            bucket,
            key,
            PresignOptions::new().expires_in(expires),
        )
        .await
    }

    /// Sign a browser upload policy.
    ///
    /// The policy needs a bucket; without an expiration it is valid for
    /// seven days.
    pub async fn presigned_post_policy(&self, mut policy: PostPolicy) -> Result<PostPolicyResult> {
        if self.is_anonymous() {
            return Err(Error::AnonymousRequest("POST".into()));
        }
        let bucket = policy
            .bucket()
            .map(String::from)
            .ok_or_else(|| Error::InvalidArgument("post policy has no bucket".into()))?;

        let now = Utc::now();
        if policy.expiration().is_none() {
            policy.set_expires(now + Duration::seconds(PresignedLimits::DEFAULT_EXPIRES as i64));
        }

        let region = self.get_bucket_region(&bucket).await?;
        let credentials = self.credentials();

        policy.add_signing_field("x-amz-date", &format_amz_date(&now));
        policy.add_signing_field("x-amz-algorithm", SIGN_V4_ALGORITHM);
        policy.add_signing_field(
            "x-amz-credential",
            &get_credential(&credentials.access_key, &region, &now),
        );
        if let Some(token) = &credentials.session_token {
            policy.add_signing_field("x-amz-security-token", token);
        }

        let encoded = BASE64.encode(policy.to_json());
        let signature = post_presign_signature_v4(&region, &now, &credentials.secret_key, &encoded);

        let mut form_data = policy.form_data.clone();
        form_data.insert("policy".into(), encoded);
        form_data.insert("x-amz-signature".into(), signature);

        let address = self
            .request_builder()
            .address(&S3Request::new(Method::POST).bucket(&bucket).path_style(), &region)?;
        let post_url = format!(
            "{}://{}{}",
            self.request_builder().scheme(),
            address.host_header,
            address.path
        );

        Ok(PostPolicyResult { post_url, form_data })
    }
}
