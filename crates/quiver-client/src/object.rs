//! Object metadata, copy and delete operations

use http::Method;
use quiver_core::types::{extract_metadata, CopyConditions, CopyObjectResult, DeleteError, ObjectStat};
use quiver_core::utils::{
    parse_etag, parse_http_datetime, uri_resource_escape, validate_bucket_name,
    validate_object_name,
};
use quiver_core::{Error, Result, S3Error, MAX_DELETE_OBJECTS};
use quiver_crypto::md5_base64;
use tracing::{debug, info};

use crate::client::Client;
use crate::request::S3Request;
use crate::xml;

impl Client {
    pub async fn stat_object(&self, bucket: &str, key: &str) -> Result<ObjectStat> {
        let response = self
            .execute(S3Request::new(Method::HEAD).bucket(bucket).object(key))
            .await?;

        let size = response
            .header("content-length")
            .ok_or_else(|| Error::MissingField("Content-Length".into()))?
            .parse::<u64>()
            .map_err(|e| Error::Protocol(format!("invalid Content-Length: {}", e)))?;
        let etag = response
            .header("etag")
            .map(parse_etag)
            .ok_or_else(|| Error::MissingField("ETag".into()))?;

        Ok(ObjectStat {
            size,
            etag,
            last_modified: response.header("last-modified").and_then(parse_http_datetime),
            content_type: response.header("content-type").map(String::from),
            metadata: extract_metadata(
                response
                    .headers
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            ),
        })
    }

    pub async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.execute(
            S3Request::new(Method::DELETE)
                .bucket(bucket)
                .object(key)
                .expect(204),
        )
        .await?;
        Ok(())
    }

    /// Server-side copy of `source` (`/bucket/key`) into `bucket/key`
    pub async fn copy_object(
        &self,
        bucket: &str,
        key: &str,
        source: &str,
        conditions: Option<&CopyConditions>,
    ) -> Result<CopyObjectResult> {
        let (src_bucket, src_key) = source
            .trim_start_matches('/')
            .split_once('/')
            .ok_or_else(|| Error::InvalidArgument(format!("copy source {} is not /bucket/key", source)))?;
        validate_bucket_name(src_bucket)?;
        validate_object_name(src_key)?;

        let mut request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(key)
            .header(
                "x-amz-copy-source",
                uri_resource_escape(&format!("/{}/{}", src_bucket, src_key)),
            );
        if let Some(conditions) = conditions {
            request = request.headers(conditions.headers());
        }

        let response = self.execute(request).await?;
        let body = response.body.text().await?;

        if xml::root_element(&body)?.as_deref() == Some("Error") {
            return Err(S3Error::from_xml(&body)?.with_status(200).into());
        }
        xml::parse_copy_object(&body)
    }

    /// Delete `keys` in batches, returning the keys the store refused
    pub async fn remove_objects<S: AsRef<str>>(
        &self,
        bucket: &str,
        keys: &[S],
    ) -> Result<Vec<DeleteError>> {
        for key in keys {
            validate_object_name(key.as_ref())?;
        }

        let mut failures = Vec::new();
        for batch in keys.chunks(MAX_DELETE_OBJECTS) {
            let body = xml::delete_objects(batch);
            let request = S3Request::new(Method::POST)
                .bucket(bucket)
                .query("delete")
                .header("Content-MD5", md5_base64(body.as_bytes()))
                .body(body);

            let response = self.execute(request).await?;
            let errors = xml::parse_delete_result(&response.body.text().await?)?;
            debug!(bucket = %bucket, batch = batch.len(), failed = errors.len(), "Deleted batch");
            failures.extend(errors);
        }

        Ok(failures)
    }

    /// Abort every in-progress upload of `key`
    pub async fn remove_incomplete_upload(&self, bucket: &str, key: &str) -> Result<()> {
        while let Some(upload_id) = self.find_upload_id(bucket, key).await? {
            self.abort_multipart_upload(bucket, key, &upload_id).await?;
            info!(bucket = %bucket, key = %key, upload_id = %upload_id, "Aborted upload");
        }
        Ok(())
    }

    pub(crate) async fn abort_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<()> {
        self.execute(
            S3Request::new(Method::DELETE)
                .bucket(bucket)
                .object(key)
                .query(format!("uploadId={}", quiver_core::utils::uri_escape(upload_id)))
                .expect(204),
        )
        .await?;
        Ok(())
    }
}
