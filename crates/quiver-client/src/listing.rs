//! Paginated listings exposed as streams
//!
//! Every listing follows the store's continuation markers until a page comes
//! back untruncated. Entries are yielded as soon as their page arrives.

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use http::Method;
use quiver_core::types::{
    IncompleteUpload, ListEntry, ListObjectsPage, ListObjectsV2Page, ListPartsPage,
    ListUploadsPage, PartInfo, UploadEntry,
};
use quiver_core::utils::{uri_escape, validate_bucket_name, validate_object_name, validate_prefix};
use quiver_core::{Error, Result, MAX_KEYS};

use crate::client::Client;
use crate::request::S3Request;
use crate::xml;

/// Pagination state carried between pages
enum Cursor<T> {
    Start,
    Next(T),
    Done,
}

/// Sorted, escaped query string; `None` values are left out
fn encode_query(params: Vec<(&str, Option<String>)>) -> String {
    let mut pairs: Vec<(&str, String)> = params
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
        .collect();
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, uri_escape(v)))
        .collect::<Vec<_>>()
        .join("&")
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(String::from)
}

pub(crate) fn list_objects_query(
    prefix: &str,
    marker: Option<&str>,
    delimiter: Option<&str>,
    max_keys: u32,
) -> String {
    encode_query(vec![
        ("delimiter", non_empty(delimiter)),
        ("marker", non_empty(marker)),
        ("max-keys", Some(max_keys.min(MAX_KEYS).to_string())),
        ("prefix", Some(prefix.to_string())),
    ])
}

pub(crate) fn list_objects_v2_query(
    prefix: &str,
    continuation_token: Option<&str>,
    start_after: Option<&str>,
    delimiter: Option<&str>,
    max_keys: u32,
) -> String {
    encode_query(vec![
        ("continuation-token", non_empty(continuation_token)),
        ("delimiter", non_empty(delimiter)),
        ("list-type", Some("2".to_string())),
        ("max-keys", Some(max_keys.min(MAX_KEYS).to_string())),
        ("prefix", Some(prefix.to_string())),
        ("start-after", non_empty(start_after)),
    ])
}

pub(crate) fn list_uploads_query(
    prefix: &str,
    key_marker: Option<&str>,
    upload_id_marker: Option<&str>,
    delimiter: Option<&str>,
) -> String {
    let rest = encode_query(vec![
        ("delimiter", non_empty(delimiter)),
        ("key-marker", non_empty(key_marker)),
        ("max-uploads", Some(MAX_KEYS.to_string())),
        ("prefix", Some(prefix.to_string())),
        ("upload-id-marker", non_empty(upload_id_marker)),
    ]);
    format!("uploads&{}", rest)
}

pub(crate) fn list_parts_query(upload_id: &str, part_number_marker: u32) -> String {
    encode_query(vec![
        ("max-parts", Some(MAX_KEYS.to_string())),
        (
            "part-number-marker",
            (part_number_marker > 0).then(|| part_number_marker.to_string()),
        ),
        ("uploadId", Some(upload_id.to_string())),
    ])
}

fn page_entries(objects: Vec<quiver_core::types::ObjectInfo>, prefixes: Vec<String>) -> Vec<Result<ListEntry>> {
    objects
        .into_iter()
        .map(ListEntry::Object)
        .chain(prefixes.into_iter().map(|prefix| ListEntry::Prefix { prefix }))
        .map(Ok)
        .collect()
}

fn failed<T: Send + 'static>(err: Error) -> BoxStream<'static, Result<T>> {
    stream::once(async move { Err(err) }).boxed()
}

impl Client {
    /// One page of a V1 object listing
    pub async fn list_objects_page(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<&str>,
        delimiter: Option<&str>,
        max_keys: u32,
    ) -> Result<ListObjectsPage> {
        let request = S3Request::new(Method::GET)
            .bucket(bucket)
            .query(list_objects_query(prefix, marker, delimiter, max_keys));
        let response = self.execute(request).await?;
        xml::parse_list_objects(&response.body.text().await?)
    }

    /// One page of a V2 object listing
    pub async fn list_objects_v2_page(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<&str>,
        start_after: Option<&str>,
        delimiter: Option<&str>,
        max_keys: u32,
    ) -> Result<ListObjectsV2Page> {
        let request = S3Request::new(Method::GET).bucket(bucket).query(list_objects_v2_query(
            prefix,
            continuation_token,
            start_after,
            delimiter,
            max_keys,
        ));
        let response = self.execute(request).await?;
        xml::parse_list_objects_v2(&response.body.text().await?)
    }

    /// One page of in-progress multipart uploads, without sizes
    pub async fn list_uploads_page(
        &self,
        bucket: &str,
        prefix: &str,
        key_marker: Option<&str>,
        upload_id_marker: Option<&str>,
        delimiter: Option<&str>,
    ) -> Result<ListUploadsPage> {
        let request = S3Request::new(Method::GET).bucket(bucket).query(list_uploads_query(
            prefix,
            key_marker,
            upload_id_marker,
            delimiter,
        ));
        let response = self.execute(request).await?;
        xml::parse_list_uploads(&response.body.text().await?)
    }

    /// One page of the parts uploaded so far
    pub async fn list_parts_page(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number_marker: u32,
    ) -> Result<ListPartsPage> {
        let request = S3Request::new(Method::GET)
            .bucket(bucket)
            .object(key)
            .query(list_parts_query(upload_id, part_number_marker));
        let response = self.execute(request).await?;
        xml::parse_list_parts(&response.body.text().await?)
    }

    /// Objects under `prefix`; without `recursive` keys are rolled up at `/`.
    ///
    /// Stores that omit `NextMarker` continue from the last key of the page,
    /// or from its last common prefix when the page holds only prefixes.
    pub fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BoxStream<'static, Result<ListEntry>> {
        if let Err(err) = validate_bucket_name(bucket).and_then(|_| validate_prefix(prefix)) {
            return failed(err);
        }

        let client = self.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let delimiter = (!recursive).then(|| "/".to_string());

        stream::try_unfold(Cursor::Start, move |cursor| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            let delimiter = delimiter.clone();
            async move {
                let marker = match cursor {
                    Cursor::Done => return Ok(None),
                    Cursor::Start => None,
                    Cursor::Next(marker) => Some(marker),
                };
                let page = client
                    .list_objects_page(&bucket, &prefix, marker.as_deref(), delimiter.as_deref(), MAX_KEYS)
                    .await?;

                let next = if page.is_truncated {
                    page.next_marker
                        .clone()
                        .or_else(|| page.objects.last().map(|o| o.key.clone()))
                        .or_else(|| page.prefixes.last().cloned())
                        .map(Cursor::Next)
                        .unwrap_or(Cursor::Done)
                } else {
                    Cursor::Done
                };

                let entries = page_entries(page.objects, page.prefixes);
                Ok::<_, Error>(Some((stream::iter(entries), next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// V2 listing of objects under `prefix`, optionally starting after a key
    pub fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
        start_after: Option<&str>,
    ) -> BoxStream<'static, Result<ListEntry>> {
        if let Err(err) = validate_bucket_name(bucket).and_then(|_| validate_prefix(prefix)) {
            return failed(err);
        }

        let client = self.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let start_after = start_after.map(String::from);
        let delimiter = (!recursive).then(|| "/".to_string());

        stream::try_unfold(Cursor::Start, move |cursor| {
            let client = client.clone();
            let bucket = bucket.clone();
            let prefix = prefix.clone();
            let start_after = start_after.clone();
            let delimiter = delimiter.clone();
            async move {
                let token = match cursor {
                    Cursor::Done => return Ok(None),
                    Cursor::Start => None,
                    Cursor::Next(token) => Some(token),
                };
                let page = client
                    .list_objects_v2_page(
                        &bucket,
                        &prefix,
                        token.as_deref(),
                        start_after.as_deref(),
                        delimiter.as_deref(),
                        MAX_KEYS,
                    )
                    .await?;

                let next = match (page.is_truncated, page.next_continuation_token.clone()) {
                    (true, Some(token)) => Cursor::Next(token),
                    (true, None) => {
                        return Err(Error::MissingField("NextContinuationToken".into()))
                    }
                    (false, _) => Cursor::Done,
                };

                let entries = page_entries(page.objects, page.prefixes);
                Ok::<_, Error>(Some((stream::iter(entries), next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    /// In-progress uploads under `prefix`, each sized by summing its parts
    pub fn list_incomplete_uploads(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> BoxStream<'static, Result<UploadEntry>> {
        if let Err(err) = validate_bucket_name(bucket).and_then(|_| validate_prefix(prefix)) {
            return failed(err);
        }

        let client = self.clone();
        let bucket = bucket.to_string();
        let prefix = prefix.to_string();
        let delimiter = (!recursive).then(|| "/".to_string());

        stream::try_unfold(
            Cursor::<(Option<String>, Option<String>)>::Start,
            move |cursor| {
                let client = client.clone();
                let bucket = bucket.clone();
                let prefix = prefix.clone();
                let delimiter = delimiter.clone();
                async move {
                    let (key_marker, upload_id_marker) = match cursor {
                        Cursor::Done => return Ok(None),
                        Cursor::Start => (None, None),
                        Cursor::Next(markers) => markers,
                    };
                    let page = client
                        .list_uploads_page(
                            &bucket,
                            &prefix,
                            key_marker.as_deref(),
                            upload_id_marker.as_deref(),
                            delimiter.as_deref(),
                        )
                        .await?;

                    let mut entries = Vec::with_capacity(page.uploads.len() + page.prefixes.len());
                    for upload in page.uploads {
                        let size = client
                            .list_all_parts(&bucket, &upload.key, &upload.upload_id)
                            .await?
                            .iter()
                            .map(|p| p.size)
                            .sum();
                        entries.push(Ok(UploadEntry::Upload(IncompleteUpload { size, ..upload })));
                    }
                    entries.extend(
                        page.prefixes
                            .into_iter()
                            .map(|prefix| Ok(UploadEntry::Prefix { prefix })),
                    );

                    let next = match (page.is_truncated, page.next_key_marker, page.next_upload_id_marker) {
                        (true, None, None) => Cursor::Done,
                        (true, key, id) => Cursor::Next((key, id)),
                        (false, _, _) => Cursor::Done,
                    };
                    Ok::<_, Error>(Some((stream::iter(entries), next)))
                }
            },
        )
        .try_flatten()
        .boxed()
    }

    /// Parts of an upload in ascending part-number order
    pub fn list_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> BoxStream<'static, Result<PartInfo>> {
        if let Err(err) = validate_bucket_name(bucket).and_then(|_| validate_object_name(key)) {
            return failed(err);
        }

        let client = self.clone();
        let bucket = bucket.to_string();
        let key = key.to_string();
        let upload_id = upload_id.to_string();

        stream::try_unfold(Cursor::<u32>::Start, move |cursor| {
            let client = client.clone();
            let bucket = bucket.clone();
            let key = key.clone();
            let upload_id = upload_id.clone();
            async move {
                let marker = match cursor {
                    Cursor::Done => return Ok(None),
                    Cursor::Start => 0,
                    Cursor::Next(marker) => marker,
                };
                let page = client.list_parts_page(&bucket, &key, &upload_id, marker).await?;

                let next = match (page.is_truncated, page.next_part_number_marker) {
                    (true, Some(marker)) if marker > 0 => Cursor::Next(marker),
                    (true, _) => return Err(Error::MissingField("NextPartNumberMarker".into())),
                    (false, _) => Cursor::Done,
                };
                Ok::<_, Error>(Some((stream::iter(page.parts.into_iter().map(Ok)), next)))
            }
        })
        .try_flatten()
        .boxed()
    }

    pub async fn list_all_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<Vec<PartInfo>> {
        self.list_parts(bucket, key, upload_id).try_collect().await
    }

    /// Most recently initiated upload of exactly `key`, across all pages
    pub async fn find_upload_id(&self, bucket: &str, key: &str) -> Result<Option<String>> {
        validate_bucket_name(bucket)?;
        validate_object_name(key)?;

        let mut key_marker: Option<String> = None;
        let mut upload_id_marker: Option<String> = None;
        let mut latest: Option<IncompleteUpload> = None;

        loop {
            let page = self
                .list_uploads_page(
                    bucket,
                    key,
                    key_marker.as_deref(),
                    upload_id_marker.as_deref(),
                    None,
                )
                .await?;

            for upload in page.uploads.into_iter().filter(|u| u.key == key) {
                let newer = latest
                    .as_ref()
                    .map(|l| upload.initiated > l.initiated)
                    .unwrap_or(true);
                if newer {
                    latest = Some(upload);
                }
            }

            if !page.is_truncated {
                break;
            }
            key_marker = page.next_key_marker;
            upload_id_marker = page.next_upload_id_marker;
            if key_marker.is_none() && upload_id_marker.is_none() {
                break;
            }
        }

        Ok(latest.map(|u| u.upload_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{test_client, MockStore};
    use futures::TryStreamExt;
    use std::sync::Arc;

    #[test]
    fn test_queries_are_sorted_and_escaped() {
        assert_eq!(
            list_objects_query("photos/2017 summer", Some("photos/a+b"), Some("/"), 5000),
            "delimiter=%2F&marker=photos%2Fa%2Bb&max-keys=1000&prefix=photos%2F2017%20summer"
        );
        assert_eq!(
            list_objects_v2_query("", Some("tok"), None, None, 10),
            "continuation-token=tok&list-type=2&max-keys=10&prefix="
        );
        assert_eq!(
            list_uploads_query("a", Some("k"), None, Some("/")),
            "uploads&delimiter=%2F&key-marker=k&max-uploads=1000&prefix=a"
        );
        assert_eq!(
            list_parts_query("u/1", 0),
            "max-parts=1000&uploadId=u%2F1"
        );
        assert_eq!(
            list_parts_query("u1", 7),
            "max-parts=1000&part-number-marker=7&uploadId=u1"
        );
    }

    #[tokio::test]
    async fn test_list_objects_single_page() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        for i in 0..10 {
            mock.put("photos", &format!("p.{}", i), b"x");
        }
        mock.put("photos", "q", b"x");
        let client = test_client(&mock);

        let entries: Vec<ListEntry> = client
            .list_objects("photos", "p.", true)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(entries.len(), 10);
        assert!(entries.iter().all(|e| e.name().starts_with("p.")));
        assert_eq!(
            mock.count_requests(|r| r.method == "GET" && r.query.contains("max-keys")),
            1
        );
    }

    #[tokio::test]
    async fn test_list_objects_marker_fallback() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.set_page_size(3);
        for i in 0..7 {
            mock.put("photos", &format!("k{}", i), b"x");
        }
        let client = test_client(&mock);

        let names: Vec<String> = client
            .list_objects("photos", "", true)
            .map_ok(|e| e.name().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, vec!["k0", "k1", "k2", "k3", "k4", "k5", "k6"]);

        let pages = mock.requests_matching(|r| r.query.contains("max-keys"));
        assert_eq!(pages.len(), 3);
        assert!(pages[1].query.contains("marker=k2"));
        assert!(pages[2].query.contains("marker=k5"));
    }

    #[tokio::test]
    async fn test_list_objects_prefix_only_page_fallback() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.set_page_size(2);
        mock.omit_next_marker();
        for key in ["a/1", "b/1", "c/1", "d"] {
            mock.put("photos", key, b"x");
        }
        let client = test_client(&mock);

        let mut names: Vec<String> = client
            .list_objects("photos", "", false)
            .map_ok(|e| e.name().to_string())
            .try_collect()
            .await
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["a/", "b/", "c/", "d"]);

        let pages = mock.requests_matching(|r| r.query.contains("max-keys"));
        assert_eq!(pages.len(), 2);
        assert!(pages[1].query.contains("marker=b%2F"));
    }

    #[tokio::test]
    async fn test_list_objects_with_delimiter() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        for key in ["a/1", "a/2", "b", "c/d/e"] {
            mock.put("photos", key, b"x");
        }
        let client = test_client(&mock);

        let entries: Vec<ListEntry> = client
            .list_objects("photos", "", false)
            .try_collect()
            .await
            .unwrap();
        let objects: Vec<&str> = entries.iter().filter_map(|e| e.as_object()).map(|o| o.key.as_str()).collect();
        let prefixes: Vec<&str> = entries
            .iter()
            .filter(|e| e.as_object().is_none())
            .map(|e| e.name())
            .collect();
        assert_eq!(objects, vec!["b"]);
        assert_eq!(prefixes, vec!["a/", "c/"]);
    }

    #[tokio::test]
    async fn test_list_objects_v2_pages() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.set_page_size(2);
        for i in 0..5 {
            mock.put("photos", &format!("k{}", i), b"x");
        }
        let client = test_client(&mock);

        let names: Vec<String> = client
            .list_objects_v2("photos", "", true, Some("k0"))
            .map_ok(|e| e.name().to_string())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(names, vec!["k1", "k2", "k3", "k4"]);
        assert_eq!(mock.count_requests(|r| r.query.contains("list-type=2")), 2);
    }

    #[tokio::test]
    async fn test_invalid_bucket_yields_error() {
        let mock = Arc::new(MockStore::new());
        let client = test_client(&mock);

        let results: Vec<Result<ListEntry>> = client.list_objects("Bad_Bucket", "", true).collect().await;
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(Error::InvalidBucketName(_))));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_find_upload_id_picks_latest() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.set_page_size(1);
        mock.start_upload("photos", "big.iso", "2016-01-01T00:00:00.000Z");
        let latest = mock.start_upload("photos", "big.iso", "2016-03-01T00:00:00.000Z");
        mock.start_upload("photos", "big.iso", "2016-02-01T00:00:00.000Z");
        mock.start_upload("photos", "big.iso.bak", "2016-04-01T00:00:00.000Z");
        let client = test_client(&mock);

        assert_eq!(
            client.find_upload_id("photos", "big.iso").await.unwrap(),
            Some(latest)
        );
        assert_eq!(client.find_upload_id("photos", "none").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_incomplete_uploads_and_parts() {
        let mock = Arc::new(MockStore::new());
        mock.create_bucket("photos", "us-east-1");
        mock.set_page_size(2);
        let upload_id = mock.start_upload("photos", "dir/big.iso", "2016-01-01T00:00:00.000Z");
        for n in 1..=5 {
            mock.add_part("photos", &upload_id, n, &vec![b'x'; 100 * n as usize]);
        }
        mock.start_upload("photos", "top.iso", "2016-01-01T00:00:00.000Z");
        let client = test_client(&mock);

        let parts = client.list_all_parts("photos", "dir/big.iso", &upload_id).await.unwrap();
        let numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5]);

        let uploads: Vec<UploadEntry> = client
            .list_incomplete_uploads("photos", "", true)
            .try_collect()
            .await
            .unwrap();
        assert_eq!(uploads.len(), 2);
        match &uploads[0] {
            UploadEntry::Upload(upload) => {
                assert_eq!(upload.key, "dir/big.iso");
                assert_eq!(upload.size, 1500);
            }
            other => panic!("unexpected entry {:?}", other),
        }

        let uploads: Vec<UploadEntry> = client
            .list_incomplete_uploads("photos", "", false)
            .try_collect()
            .await
            .unwrap();
        assert!(uploads.contains(&UploadEntry::Prefix { prefix: "dir/".into() }));
    }
}
