//! Single-shot and resumable multipart uploads

use http::Method;
use quiver_core::types::{prepend_amz_meta, CompletedPart, Metadata, PartInfo, UploadInfo};
use quiver_core::utils::{parse_etag, uri_escape, validate_bucket_name, validate_object_name};
use quiver_core::{Error, Result, S3Error, MAX_OBJECT_SIZE, MAX_PARTS};
use quiver_crypto::{Digests, HashSummer};
use std::collections::HashMap;
use std::path::Path;
use tokio::io::AsyncRead;
use tracing::{debug, info};

use super::{calculate_part_size, drain, read_chunk};
use crate::client::Client;
use crate::request::S3Request;
use crate::xml;

impl Client {
    /// Upload an object read from `reader`.
    ///
    /// With a known `size` the stream must hold exactly that many bytes.
    /// Objects larger than the part size are sent as a multipart upload
    /// that picks up an unfinished upload of the same key.
    pub async fn put_object<R>(
        &self,
        bucket: &str,
        key: &str,
        mut reader: R,
        size: Option<u64>,
        metadata: &Metadata,
    ) -> Result<UploadInfo>
    where
        R: AsyncRead + Unpin + Send,
    {
        validate_bucket_name(bucket)?;
        validate_object_name(key)?;

        let headers = prepend_amz_meta(metadata);
        let base = self.config().part_size();
        let overridden = self.config().part_size_overridden();

        match size {
            Some(size) => {
                let part_size = calculate_part_size(size, base, overridden)?;
                if size > base {
                    return self
                        .put_object_multipart(bucket, key, &mut reader, Some(size), part_size, None, &headers)
                        .await;
                }

                let data = read_chunk(&mut reader, size).await?;
                if (data.len() as u64) < size {
                    return Err(Error::SizeMismatch {
                        expected: size,
                        actual: data.len() as u64,
                    });
                }
                let extra = drain(&mut reader).await?;
                if extra > 0 {
                    return Err(Error::SizeMismatch {
                        expected: size,
                        actual: size + extra,
                    });
                }
                self.put_object_single(bucket, key, data, &headers).await
            }
            None => {
                let part_size = if overridden {
                    base
                } else {
                    calculate_part_size(MAX_OBJECT_SIZE, base, false)?
                };
                let first = read_chunk(&mut reader, part_size).await?;
                if (first.len() as u64) < part_size {
                    return self.put_object_single(bucket, key, first, &headers).await;
                }
                self.put_object_multipart(bucket, key, &mut reader, None, part_size, Some(first), &headers)
                    .await
            }
        }
    }

    /// Upload a local file, guessing its content type from the extension
    pub async fn fput_object(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
        metadata: &Metadata,
    ) -> Result<UploadInfo> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        if size > MAX_OBJECT_SIZE {
            return Err(Error::InvalidArgument(format!(
                "{} is {} bytes, larger than the maximum object size",
                path.display(),
                size
            )));
        }

        let mut metadata = metadata.clone();
        if !metadata.keys().any(|k| k.eq_ignore_ascii_case("content-type")) {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            metadata.insert("Content-Type".to_string(), mime.to_string());
        }

        self.put_object(bucket, key, file, Some(size), &metadata).await
    }

    fn digests(&self, data: &[u8]) -> Digests {
        let mut summer = HashSummer::new(self.config().enable_sha256());
        summer.update(data);
        summer.finalize()
    }

    async fn put_object_single(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        headers: &Metadata,
    ) -> Result<UploadInfo> {
        let digests = self.digests(&data);
        let mut request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(key)
            .headers(headers.clone())
            .content_sha256(digests.sha256_hex());
        if !self.config().enable_sha256() {
            request = request.header("Content-MD5", digests.md5_base64());
        }
        let request = request.body(data);

        let response = self.execute(request).await?;
        let etag = response
            .header("etag")
            .map(parse_etag)
            .ok_or_else(|| Error::MissingField("ETag".into()))?;

        debug!(bucket = %bucket, key = %key, size = digests.len, "Uploaded object");
        Ok(UploadInfo { etag })
    }

    #[allow(clippy::too_many_arguments)]
    async fn put_object_multipart<R>(
        &self,
        bucket: &str,
        key: &str,
        reader: &mut R,
        size: Option<u64>,
        part_size: u64,
        mut first: Option<Vec<u8>>,
        headers: &Metadata,
    ) -> Result<UploadInfo>
    where
        R: AsyncRead + Unpin + Send,
    {
        let (upload_id, existing) = match self.find_upload_id(bucket, key).await? {
            Some(upload_id) => {
                let parts: HashMap<u32, PartInfo> = self
                    .list_all_parts(bucket, key, &upload_id)
                    .await?
                    .into_iter()
                    .map(|p| (p.part_number, p))
                    .collect();
                info!(
                    bucket = %bucket,
                    key = %key,
                    upload_id = %upload_id,
                    parts = parts.len(),
                    "Resuming multipart upload"
                );
                (upload_id, parts)
            }
            None => (
                self.initiate_multipart_upload(bucket, key, headers).await?,
                HashMap::new(),
            ),
        };

        let mut completed = Vec::new();
        let mut uploaded: u64 = 0;
        let mut part_number: u32 = 0;

        loop {
            if let Some(total) = size {
                if uploaded >= total {
                    break;
                }
            }
            part_number += 1;
            if u64::from(part_number) > MAX_PARTS {
                return Err(Error::InvalidArgument(format!(
                    "object needs more than {} parts of {} bytes",
                    MAX_PARTS, part_size
                )));
            }

            let limit = match size {
                Some(total) => part_size.min(total - uploaded),
                None => part_size,
            };
            let chunk = match first.take() {
                Some(chunk) => chunk,
                None => read_chunk(reader, limit).await?,
            };
            let len = chunk.len() as u64;

            match size {
                Some(total) if len < limit => {
                    return Err(Error::SizeMismatch {
                        expected: total,
                        actual: uploaded + len,
                    })
                }
                None if len == 0 && part_number > 1 => break,
                _ => {}
            }

            let digests = self.digests(&chunk);
            let md5 = digests.md5_hex();
            let etag = match existing.get(&part_number) {
                Some(part) if part.etag == md5 => {
                    debug!(part_number = part_number, "Part already uploaded, skipping");
                    md5
                }
                _ => {
                    self.upload_part(bucket, key, &upload_id, part_number, chunk, &digests)
                        .await?
                }
            };
            completed.push(CompletedPart::new(part_number, etag));
            uploaded += len;

            if size.is_none() && len < part_size {
                break;
            }
        }

        if let Some(total) = size {
            let extra = drain(reader).await?;
            if extra > 0 {
                return Err(Error::SizeMismatch {
                    expected: total,
                    actual: total + extra,
                });
            }
        }

        completed.sort_by_key(|p| p.part_number);
        let info = self
            .complete_multipart_upload(bucket, key, &upload_id, &completed)
            .await?;

        info!(
            bucket = %bucket,
            key = %key,
            parts = completed.len(),
            size = uploaded,
            "Completed multipart upload"
        );
        Ok(info)
    }

    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        headers: &Metadata,
    ) -> Result<String> {
        let request = S3Request::new(Method::POST)
            .bucket(bucket)
            .object(key)
            .query("uploads")
            .headers(headers.clone());

        let response = self.execute(request).await?;
        let upload_id = xml::parse_upload_id(&response.body.text().await?)?;
        debug!(bucket = %bucket, key = %key, upload_id = %upload_id, "Initiated multipart upload");
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        data: Vec<u8>,
        digests: &Digests,
    ) -> Result<String> {
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .object(key)
            .query(format!("partNumber={}&uploadId={}", part_number, uri_escape(upload_id)))
            .header("Content-MD5", digests.md5_base64())
            .content_sha256(digests.sha256_hex())
            .body(data);

        let response = self.execute(request).await?;
        let etag = response
            .header("etag")
            .map(parse_etag)
            .ok_or_else(|| Error::MissingField("ETag".into()))?;

        debug!(part_number = part_number, size = digests.len, "Uploaded part");
        Ok(etag)
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<UploadInfo> {
        let request = S3Request::new(Method::POST)
            .bucket(bucket)
            .object(key)
            .query(format!("uploadId={}", uri_escape(upload_id)))
            .body(xml::complete_multipart_upload(parts));

        let response = self.execute(request).await?;
        let body = response.body.text().await?;

        if xml::root_element(&body)?.as_deref() == Some("Error") {
            return Err(S3Error::from_xml(&body)?.with_status(200).into());
        }
        Ok(UploadInfo {
            etag: xml::parse_complete_etag(&body)?,
        })
    }
}
