//! Object downloads

use futures::StreamExt;
use http::Method;
use quiver_core::types::ByteRange;
use quiver_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::client::Client;
use crate::request::S3Request;
use crate::transport::ResponseBody;

/// Suffix of the temporary file an interrupted download resumes from
pub const PART_FILE_SUFFIX: &str = ".part.quiver";

impl Client {
    pub async fn get_object(&self, bucket: &str, key: &str) -> Result<ResponseBody> {
        self.get_partial_object(bucket, key, 0, 0).await
    }

    /// Read `length` bytes starting at `offset`; a zero length reads to the end
    pub async fn get_partial_object(
        &self,
        bucket: &str,
        key: &str,
        offset: u64,
        length: u64,
    ) -> Result<ResponseBody> {
        let mut request = S3Request::new(Method::GET).bucket(bucket).object(key);
        if let Some(range) = ByteRange::new(offset, length).to_header() {
            request = request.header("Range", range).expect(206);
        }

        let response = self.execute(request).await?;
        Ok(response.body)
    }

    /// Download an object into `path`.
    ///
    /// Data is written to `<path>.<etag>.part.quiver` first; a later call for
    /// the same object version continues where that file ends.
    pub async fn fget_object(&self, bucket: &str, key: &str, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let stat = self.stat_object(bucket, key).await?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let part_path = PathBuf::from(format!(
            "{}.{}{}",
            path.display(),
            stat.etag,
            PART_FILE_SUFFIX
        ));
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&part_path)
            .await?;

        let mut offset = file.metadata().await?.len();
        if offset > stat.size {
            debug!(path = %part_path.display(), "Part file larger than object, restarting");
            file.set_len(0).await?;
            offset = 0;
        }

        if offset < stat.size {
            if offset > 0 {
                info!(key = %key, offset = offset, "Resuming download");
            }
            let mut stream = self.get_partial_object(bucket, key, offset, 0).await?.into_stream();
            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?).await?;
            }
            file.flush().await?;
        }
        drop(file);

        let written = tokio::fs::metadata(&part_path).await?.len();
        if written != stat.size {
            return Err(Error::IntegrityMismatch {
                expected: stat.size,
                actual: written,
            });
        }

        tokio::fs::rename(&part_path, path).await?;
        debug!(key = %key, path = %path.display(), size = written, "Downloaded object");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{test_client, MockStore};
    use std::sync::Arc;

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 239) as u8).collect()
    }

    #[tokio::test]
    async fn test_get_partial_object() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.put("photos", "a.txt", b"hello world");
        let client = test_client(&mock);

        let body = client.get_partial_object("photos", "a.txt", 6, 5).await.unwrap();
        assert_eq!(body.text().await.unwrap(), "world");

        let body = client.get_object("photos", "a.txt").await.unwrap();
        assert_eq!(body.text().await.unwrap(), "hello world");
    }

    #[tokio::test]
    async fn test_fget_object() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        let data = payload(200 * 1024);
        mock.put("photos", "big.bin", &data);
        let client = test_client(&mock);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested/big.bin");
        client.fget_object("photos", "big.bin", &target).await.unwrap();

        assert_eq!(std::fs::read(&target).unwrap(), data);
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(PART_FILE_SUFFIX))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_fget_object_resumes() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        let data = payload(200 * 1024);
        mock.put("photos", "big.bin", &data);
        let client = test_client(&mock);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("big.bin");
        let etag = quiver_crypto::md5_hex(&data);
        let part_path = dir
            .path()
            .join(format!("big.bin.{}{}", etag, PART_FILE_SUFFIX));
        std::fs::write(&part_path, &data[..102400]).unwrap();

        client.fget_object("photos", "big.bin", &target).await.unwrap();

        let downloaded = std::fs::read(&target).unwrap();
        assert_eq!(quiver_crypto::md5_hex(&downloaded), etag);
        assert!(!part_path.exists());

        let ranged = mock.requests_matching(|r| r.method == "GET" && r.path.ends_with("/big.bin"));
        assert_eq!(ranged.len(), 1);
        assert_eq!(ranged[0].header("range"), Some("bytes=102400-"));
    }

    #[tokio::test]
    async fn test_fget_object_restarts_oversized_part_file() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.put("photos", "a.txt", b"hello");
        let client = test_client(&mock);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("a.txt");
        let part_path = dir.path().join(format!(
            "a.txt.{}{}",
            quiver_crypto::md5_hex(b"hello"),
            PART_FILE_SUFFIX
        ));
        std::fs::write(&part_path, b"this is far too long").unwrap();

        client.fget_object("photos", "a.txt", &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_fget_object_short_body_keeps_part_file() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        let data = payload(200 * 1024);
        mock.put("photos", "big.bin", &data);
        mock.truncate_get_bodies(Some(1000));
        let client = test_client(&mock);

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("big.bin");
        let part_path = dir.path().join(format!(
            "big.bin.{}{}",
            quiver_crypto::md5_hex(&data),
            PART_FILE_SUFFIX
        ));

        let err = client.fget_object("photos", "big.bin", &target).await.unwrap_err();
        assert_eq!(err.kind(), quiver_core::ErrorKind::Integrity);
        assert!(matches!(
            err,
            Error::IntegrityMismatch {
                expected: 204800,
                actual: 1000
            }
        ));
        assert!(!target.exists());
        assert_eq!(std::fs::metadata(&part_path).unwrap().len(), 1000);

        mock.truncate_get_bodies(None);
        client.fget_object("photos", "big.bin", &target).await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), data);
        assert!(!part_path.exists());

        let ranged = mock.requests_matching(|r| r.method == "GET" && r.path.ends_with("/big.bin"));
        assert_eq!(ranged.last().unwrap().header("range"), Some("bytes=1000-"));
    }

    #[tokio::test]
    async fn test_fget_missing_object() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        let client = test_client(&mock);

        let dir = tempfile::tempdir().unwrap();
        let err = client
            .fget_object("photos", "nope", dir.path().join("nope"))
            .await
            .unwrap_err();
        assert!(err.has_code("NoSuchKey"));
    }
}
