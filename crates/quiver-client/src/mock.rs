//! In-memory S3 store for client tests
//!
//! Verifies signatures, payload hashes and `Content-MD5`, enforces bucket
//! regions and paginates listings with a configurable page size.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use percent_encoding::percent_decode_str;
use quiver_auth::{sign_v4, Credentials, SignatureV4, UNSIGNED_PAYLOAD};
use quiver_core::utils::{
    format_http_datetime, format_s3_datetime, parse_amz_date, parse_etag, xml_escape,
};
use quiver_core::{ClientConfig, Result, S3Error};
use quiver_crypto::{md5_base64, md5_hex, multipart_etag, sha256_hex};
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::Arc;

use crate::client::{Client, ClientBuilder};
use crate::transport::{ResponseBody, Transport, WireRequest, WireResponse};

pub const ACCESS_KEY: &str = "minio";
pub const SECRET_KEY: &str = "minio123";
const REQUEST_ID: &str = "MOCKREQUEST";
const XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

pub fn test_config() -> ClientConfig {
    ClientConfig::new("localhost")
        .with_port(9000)
        .with_ssl(false)
        .with_credentials(ACCESS_KEY, SECRET_KEY)
}

pub fn test_client(mock: &Arc<MockStore>) -> Client {
    test_client_with(mock, test_config())
}

pub fn test_client_with(mock: &Arc<MockStore>, config: ClientConfig) -> Client {
    ClientBuilder::new(config)
        .transport(mock.clone())
        .build()
        .unwrap()
}

/// A request as seen by the store
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    /// Escaped path without the query
    pub path: String,
    pub query: String,
    pub headers: BTreeMap<String, String>,
    pub signing_region: Option<String>,
}

impl MockRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

struct StoredObject {
    data: Vec<u8>,
    etag: String,
    content_type: Option<String>,
    metadata: BTreeMap<String, String>,
    last_modified: DateTime<Utc>,
}

impl StoredObject {
    fn new(data: Vec<u8>, etag: String) -> Self {
        Self {
            data,
            etag,
            content_type: None,
            metadata: BTreeMap::new(),
            last_modified: Utc::now(),
        }
    }
}

struct MockBucket {
    region: String,
    objects: BTreeMap<String, StoredObject>,
    policy: Option<String>,
    notification: Option<String>,
}

struct MockUpload {
    bucket: String,
    key: String,
    upload_id: String,
    initiated: String,
    parts: BTreeMap<u32, (Vec<u8>, String)>,
    content_type: Option<String>,
}

#[derive(Default)]
struct State {
    buckets: BTreeMap<String, MockBucket>,
    uploads: Vec<MockUpload>,
    requests: Vec<MockRequest>,
    page_size: Option<usize>,
    fail_parts: HashSet<u32>,
    complete_error: Option<String>,
    get_body_limit: Option<usize>,
    omit_next_marker: bool,
    events: VecDeque<String>,
    completed: Vec<Vec<u32>>,
    upload_counter: u32,
}

/// Listing item after delimiter roll-up
enum Item<'a, T> {
    Entry(&'a str, T),
    Prefix(String),
}

impl<T> Item<'_, T> {
    fn name(&self) -> &str {
        match self {
            Item::Entry(name, _) => name,
            Item::Prefix(prefix) => prefix,
        }
    }
}

fn roll_up<'a, T, I>(entries: I, prefix: &str, delimiter: Option<&str>) -> Vec<Item<'a, T>>
where
    I: IntoIterator<Item = (&'a str, T)>,
{
    let mut items: Vec<Item<'a, T>> = Vec::new();
    for (name, value) in entries {
        if !name.starts_with(prefix) {
            continue;
        }
        let rolled = delimiter.filter(|d| !d.is_empty()).and_then(|d| {
            name[prefix.len()..]
                .find(d)
                .map(|idx| name[..prefix.len() + idx + d.len()].to_string())
        });
        match rolled {
            Some(common) => {
                if !matches!(items.last(), Some(Item::Prefix(last)) if *last == common) {
                    items.push(Item::Prefix(common));
                }
            }
            None => items.push(Item::Entry(name, value)),
        }
    }
    items
}

fn decode(s: &str) -> String {
    percent_decode_str(s).decode_utf8_lossy().into_owned()
}

fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|p| !p.is_empty())
        .map(|p| match p.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(p), String::new()),
        })
        .collect()
}

fn param<'a>(params: &'a [(String, String)], name: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.as_str())
        .filter(|v| !v.is_empty())
}

fn has_param(params: &[(String, String)], name: &str) -> bool {
    params.iter().any(|(k, _)| k == name)
}

#[derive(Deserialize)]
struct CompleteBody {
    #[serde(rename = "Part", default)]
    parts: Vec<CompleteBodyPart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CompleteBodyPart {
    part_number: u32,
    #[serde(rename = "ETag")]
    etag: String,
}

#[derive(Deserialize)]
struct DeleteBody {
    #[serde(rename = "Object", default)]
    objects: Vec<DeleteBodyObject>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteBodyObject {
    key: String,
}

#[derive(Deserialize)]
struct CreateBucketBody {
    #[serde(rename = "LocationConstraint")]
    location: Option<String>,
}

struct Reply {
    status: u16,
    headers: BTreeMap<String, String>,
    body: Vec<u8>,
}

impl Reply {
    fn new(status: u16) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: Vec::new(),
        }
    }

    fn ok() -> Self {
        Self::new(200)
    }

    fn xml(body: String) -> Self {
        let mut reply = Self::ok();
        reply.headers.insert("content-type".into(), "application/xml".into());
        reply.body = body.into_bytes();
        reply
    }

    fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    fn error(status: u16, code: &str, resource: &str) -> Self {
        Self::s3_error(status, S3Error::new(code, code).with_resource(resource))
    }

    fn s3_error(status: u16, error: S3Error) -> Self {
        let mut reply = Self::new(status);
        reply.body = error.with_request_id(REQUEST_ID).to_xml().into_bytes();
        reply
    }
}

/// In-memory S3 implementing [`Transport`]
#[derive(Default)]
pub struct MockStore {
    state: Mutex<State>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_bucket(&self, name: &str, region: &str) {
        self.state.lock().buckets.insert(
            name.to_string(),
            MockBucket {
                region: region.to_string(),
                objects: BTreeMap::new(),
                policy: None,
                notification: None,
            },
        );
    }

    pub fn bucket_region(&self, name: &str) -> Option<String> {
        self.state.lock().buckets.get(name).map(|b| b.region.clone())
    }

    pub fn put(&self, bucket: &str, key: &str, data: &[u8]) {
        if let Some(b) = self.state.lock().buckets.get_mut(bucket) {
            b.objects
                .insert(key.to_string(), StoredObject::new(data.to_vec(), md5_hex(data)));
        }
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.objects.get(key))
            .map(|o| o.data.clone())
    }

    pub fn object_count(&self, bucket: &str) -> usize {
        self.state
            .lock()
            .buckets
            .get(bucket)
            .map(|b| b.objects.len())
            .unwrap_or(0)
    }

    /// Register an in-progress upload; returns its id
    pub fn start_upload(&self, bucket: &str, key: &str, initiated: &str) -> String {
        let mut state = self.state.lock();
        state.upload_counter += 1;
        let upload_id = format!("upload-{:04}", state.upload_counter);
        state.uploads.push(MockUpload {
            bucket: bucket.to_string(),
            key: key.to_string(),
            upload_id: upload_id.clone(),
            initiated: initiated.to_string(),
            parts: BTreeMap::new(),
            content_type: None,
        });
        upload_id
    }

    pub fn add_part(&self, bucket: &str, upload_id: &str, part_number: u32, data: &[u8]) {
        let mut state = self.state.lock();
        if let Some(upload) = state
            .uploads
            .iter_mut()
            .find(|u| u.bucket == bucket && u.upload_id == upload_id)
        {
            upload
                .parts
                .insert(part_number, (data.to_vec(), md5_hex(data)));
        }
    }

    pub fn upload_count(&self, bucket: &str) -> usize {
        self.state
            .lock()
            .uploads
            .iter()
            .filter(|u| u.bucket == bucket)
            .count()
    }

    pub fn set_page_size(&self, size: usize) {
        self.state.lock().page_size = Some(size);
    }

    /// Leave `NextMarker` out of truncated V1 pages even with a delimiter
    pub fn omit_next_marker(&self) {
        self.state.lock().omit_next_marker = true;
    }

    /// Fail the next upload of `part_number` with a 500
    pub fn fail_part(&self, part_number: u32) {
        self.state.lock().fail_parts.insert(part_number);
    }

    /// Answer the next completion with an embedded error document
    pub fn fail_complete(&self, code: &str) {
        self.state.lock().complete_error = Some(code.to_string());
    }

    /// Cut every GET object body to at most `limit` bytes, as a dropped
    /// connection would; `None` restores full bodies
    pub fn truncate_get_bodies(&self, limit: Option<usize>) {
        self.state.lock().get_body_limit = limit;
    }

    /// Queue a line for the next listen request
    pub fn push_event(&self, line: &str) {
        self.state.lock().events.push_back(line.to_string());
    }

    /// Part numbers of each completion request, in arrival order
    pub fn completed_part_numbers(&self) -> Vec<Vec<u32>> {
        self.state.lock().completed.clone()
    }

    pub fn request_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    pub fn requests_matching(&self, f: impl Fn(&MockRequest) -> bool) -> Vec<MockRequest> {
        self.state
            .lock()
            .requests
            .iter()
            .filter(|r| f(r))
            .cloned()
            .collect()
    }

    pub fn count_requests(&self, f: impl Fn(&MockRequest) -> bool) -> usize {
        self.requests_matching(f).len()
    }

    fn handle(&self, request: &WireRequest) -> Reply {
        let (path, query) = request
            .path
            .split_once('?')
            .unwrap_or((request.path.as_str(), ""));
        let signature = request
            .header("authorization")
            .and_then(|h| SignatureV4::parse(h).ok());

        let mut state = self.state.lock();
        state.requests.push(MockRequest {
            method: request.method.as_str().to_string(),
            path: path.to_string(),
            query: query.to_string(),
            headers: request.headers.clone(),
            signing_region: signature.as_ref().map(|s| s.region.clone()),
        });

        if let Some(reply) = verify(request, signature.as_ref(), path) {
            return reply;
        }

        let params = parse_query(query);
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return list_buckets(&state);
        }
        let (bucket, key) = match trimmed.split_once('/') {
            Some((bucket, key)) => (bucket.to_string(), Some(decode(key))),
            None => (trimmed.to_string(), None),
        };
        let method = request.method.as_str();

        if method == "PUT" && key.is_none() && params.is_empty() {
            return make_bucket(&mut state, &bucket, &request.body, path);
        }

        let region = match state.buckets.get(&bucket) {
            Some(b) => b.region.clone(),
            None => return Reply::error(404, "NoSuchBucket", path),
        };
        if let Some(sig) = &signature {
            if sig.region != region {
                return Reply::s3_error(
                    400,
                    S3Error::new(
                        "AuthorizationHeaderMalformed",
                        format!("the region '{}' is wrong; expecting '{}'", sig.region, region),
                    )
                    .with_region(region),
                );
            }
        }

        match key {
            None => bucket_op(&mut state, method, &bucket, &params, request, path),
            Some(key) => object_op(&mut state, method, &bucket, &key, &params, request, path),
        }
    }
}

fn verify(request: &WireRequest, signature: Option<&SignatureV4>, path: &str) -> Option<Reply> {
    if let Some(md5) = request.header("content-md5") {
        if md5 != md5_base64(&request.body) {
            return Some(Reply::error(400, "BadDigest", path));
        }
    }

    let signature = signature?;
    let payload_hash = request.header("x-amz-content-sha256").unwrap_or_default();
    if payload_hash != UNSIGNED_PAYLOAD && payload_hash != sha256_hex(&request.body) {
        return Some(Reply::error(400, "XAmzContentSHA256Mismatch", path));
    }

    let date = match request.header("x-amz-date").and_then(parse_amz_date) {
        Some(date) => date,
        None => return Some(Reply::error(403, "AccessDenied", path)),
    };
    let mut headers = request.headers.clone();
    headers.remove("authorization");
    let expected = sign_v4(
        request.method.as_str(),
        &request.path,
        &headers,
        &Credentials::new(ACCESS_KEY, SECRET_KEY),
        &signature.region,
        &date,
    )
    .ok()?;

    match SignatureV4::parse(&expected) {
        Ok(expected) if expected.signature == signature.signature => None,
        _ => Some(Reply::error(403, "SignatureDoesNotMatch", path)),
    }
}

fn list_buckets(state: &State) -> Reply {
    let mut xml = String::from("<ListAllMyBucketsResult><Owner><ID>mock</ID></Owner><Buckets>");
    for name in state.buckets.keys() {
        xml.push_str(&format!(
            "<Bucket><Name>{}</Name><CreationDate>2016-01-01T00:00:00.000Z</CreationDate></Bucket>",
            name
        ));
    }
    xml.push_str("</Buckets></ListAllMyBucketsResult>");
    Reply::xml(xml)
}

fn make_bucket(state: &mut State, bucket: &str, body: &Bytes, path: &str) -> Reply {
    if state.buckets.contains_key(bucket) {
        return Reply::error(409, "BucketAlreadyOwnedByYou", path);
    }
    let region = std::str::from_utf8(body)
        .ok()
        .filter(|b| !b.is_empty())
        .and_then(|b| quick_xml::de::from_str::<CreateBucketBody>(b).ok())
        .and_then(|b| b.location)
        .unwrap_or_else(|| "us-east-1".to_string());
    state.buckets.insert(
        bucket.to_string(),
        MockBucket {
            region,
            objects: BTreeMap::new(),
            policy: None,
            notification: None,
        },
    );
    Reply::ok()
}

fn bucket_op(
    state: &mut State,
    method: &str,
    bucket: &str,
    params: &[(String, String)],
    request: &WireRequest,
    path: &str,
) -> Reply {
    let page_size = state.page_size.unwrap_or(1000);

    if has_param(params, "location") {
        let region = state.buckets[bucket].region.clone();
        return if region == "us-east-1" {
            Reply::xml(format!(r#"<LocationConstraint xmlns="{}"/>"#, XMLNS))
        } else {
            Reply::xml(format!(
                r#"<LocationConstraint xmlns="{}">{}</LocationConstraint>"#,
                XMLNS, region
            ))
        };
    }

    if has_param(params, "policy") {
        let b = state.buckets.get_mut(bucket).map(|b| &mut b.policy);
        let Some(policy) = b else {
            return Reply::error(404, "NoSuchBucket", path);
        };
        return match method {
            "GET" => match policy {
                Some(p) => Reply::ok().header("content-type", "application/json").with_body(p.clone()),
                None => Reply::error(404, "NoSuchBucketPolicy", path),
            },
            "PUT" => {
                *policy = Some(String::from_utf8_lossy(&request.body).into_owned());
                Reply::new(204)
            }
            _ => {
                *policy = None;
                Reply::new(204)
            }
        };
    }

    if has_param(params, "notification") {
        let Some(b) = state.buckets.get_mut(bucket) else {
            return Reply::error(404, "NoSuchBucket", path);
        };
        return match method {
            "PUT" => {
                b.notification = Some(String::from_utf8_lossy(&request.body).into_owned());
                Reply::ok()
            }
            _ => Reply::xml(b.notification.clone().unwrap_or_else(|| {
                format!(r#"<NotificationConfiguration xmlns="{}"/>"#, XMLNS)
            })),
        };
    }

    if has_param(params, "events") {
        let mut body = String::new();
        while let Some(line) = state.events.pop_front() {
            body.push_str(&line);
            body.push('\n');
        }
        return Reply::ok().with_body(body);
    }

    if has_param(params, "delete") && method == "POST" {
        let body = String::from_utf8_lossy(&request.body).into_owned();
        let parsed: DeleteBody = match quick_xml::de::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) => return Reply::error(400, "MalformedXML", path),
        };
        if let Some(b) = state.buckets.get_mut(bucket) {
            for object in parsed.objects {
                b.objects.remove(&object.key);
            }
        }
        return Reply::xml("<DeleteResult></DeleteResult>".to_string());
    }

    if has_param(params, "uploads") {
        return list_uploads(state, bucket, params, page_size);
    }

    match method {
        "HEAD" => Reply::ok(),
        "DELETE" => {
            if state.buckets.get(bucket).map(|b| b.objects.is_empty()) == Some(false) {
                return Reply::error(409, "BucketNotEmpty", path);
            }
            state.buckets.remove(bucket);
            Reply::new(204)
        }
        "GET" => list_objects(state, bucket, params, page_size),
        _ => Reply::error(405, "MethodNotAllowed", path),
    }
}

impl Reply {
    fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

fn list_objects(state: &State, bucket: &str, params: &[(String, String)], page_size: usize) -> Reply {
    let objects = &state.buckets[bucket].objects;
    let prefix = param(params, "prefix").unwrap_or("");
    let delimiter = param(params, "delimiter");
    let v2 = param(params, "list-type") == Some("2");
    let max_keys = param(params, "max-keys")
        .and_then(|m| m.parse::<usize>().ok())
        .unwrap_or(1000)
        .min(page_size);

    let after: Option<&str> = if v2 {
        param(params, "continuation-token").or(param(params, "start-after"))
    } else {
        param(params, "marker")
    };

    let items: Vec<Item<&StoredObject>> = roll_up(
        objects.iter().map(|(k, o)| (k.as_str(), o)),
        prefix,
        delimiter,
    )
    .into_iter()
    .filter(|item| after.map(|a| item.name() > a).unwrap_or(true))
    .collect();

    let truncated = items.len() > max_keys;
    let page = &items[..items.len().min(max_keys)];

    let mut contents = String::new();
    let mut prefixes = String::new();
    for item in page {
        match item {
            Item::Entry(key, object) => contents.push_str(&format!(
                "<Contents><Key>{}</Key><LastModified>{}</LastModified><ETag>\"{}\"</ETag><Size>{}</Size><StorageClass>STANDARD</StorageClass></Contents>",
                xml_escape(key),
                format_s3_datetime(&object.last_modified),
                object.etag,
                object.data.len()
            )),
            Item::Prefix(p) => prefixes.push_str(&format!(
                "<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>",
                xml_escape(p)
            )),
        }
    }

    let mut xml = format!(
        "<ListBucketResult xmlns=\"{}\"><Name>{}</Name><Prefix>{}</Prefix><MaxKeys>{}</MaxKeys><IsTruncated>{}</IsTruncated>",
        XMLNS,
        bucket,
        xml_escape(prefix),
        max_keys,
        truncated
    );
    if truncated {
        let last = page.last().map(|i| xml_escape(i.name())).unwrap_or_default();
        if v2 {
            xml.push_str(&format!("<NextContinuationToken>{}</NextContinuationToken>", last));
        } else if delimiter.is_some() && !state.omit_next_marker {
            xml.push_str(&format!("<NextMarker>{}</NextMarker>", last));
        }
    }
    xml.push_str(&contents);
    xml.push_str(&prefixes);
    xml.push_str("</ListBucketResult>");
    Reply::xml(xml)
}

fn list_uploads(state: &State, bucket: &str, params: &[(String, String)], page_size: usize) -> Reply {
    let prefix = param(params, "prefix").unwrap_or("");
    let delimiter = param(params, "delimiter");
    let key_marker = param(params, "key-marker");
    let id_marker = param(params, "upload-id-marker");

    let mut uploads: Vec<&MockUpload> = state.uploads.iter().filter(|u| u.bucket == bucket).collect();
    uploads.sort_by(|a, b| (&a.key, &a.upload_id).cmp(&(&b.key, &b.upload_id)));

    let items: Vec<Item<&MockUpload>> = roll_up(
        uploads.into_iter().map(|u| (u.key.as_str(), u)),
        prefix,
        delimiter,
    )
    .into_iter()
    .filter(|item| {
        let id = match item {
            Item::Entry(_, u) => u.upload_id.as_str(),
            Item::Prefix(_) => "",
        };
        match (key_marker, id_marker) {
            (None, _) => true,
            (Some(km), None) => item.name() > km,
            (Some(km), Some(im)) => (item.name(), id) > (km, im),
        }
    })
    .collect();

    let truncated = items.len() > page_size;
    let page = &items[..items.len().min(page_size)];

    let mut entries = String::new();
    let mut prefixes = String::new();
    for item in page {
        match item {
            Item::Entry(_, u) => entries.push_str(&format!(
                "<Upload><Key>{}</Key><UploadId>{}</UploadId><Initiated>{}</Initiated></Upload>",
                xml_escape(&u.key),
                u.upload_id,
                u.initiated
            )),
            Item::Prefix(p) => prefixes.push_str(&format!(
                "<CommonPrefixes><Prefix>{}</Prefix></CommonPrefixes>",
                xml_escape(p)
            )),
        }
    }

    let mut xml = format!(
        "<ListMultipartUploadsResult xmlns=\"{}\"><Bucket>{}</Bucket><IsTruncated>{}</IsTruncated>",
        XMLNS, bucket, truncated
    );
    if let (true, Some(last)) = (truncated, page.last()) {
        let id = match last {
            Item::Entry(_, u) => u.upload_id.clone(),
            Item::Prefix(_) => String::new(),
        };
        xml.push_str(&format!(
            "<NextKeyMarker>{}</NextKeyMarker><NextUploadIdMarker>{}</NextUploadIdMarker>",
            xml_escape(last.name()),
            id
        ));
    }
    xml.push_str(&entries);
    xml.push_str(&prefixes);
    xml.push_str("</ListMultipartUploadsResult>");
    Reply::xml(xml)
}

fn object_op(
    state: &mut State,
    method: &str,
    bucket: &str,
    key: &str,
    params: &[(String, String)],
    request: &WireRequest,
    path: &str,
) -> Reply {
    let upload_id = param(params, "uploadId").map(String::from);

    match (method, upload_id) {
        ("POST", None) if has_param(params, "uploads") => {
            state.upload_counter += 1;
            let upload_id = format!("upload-{:04}", state.upload_counter);
            state.uploads.push(MockUpload {
                bucket: bucket.to_string(),
                key: key.to_string(),
                upload_id: upload_id.clone(),
                initiated: format_s3_datetime(&Utc::now()),
                parts: BTreeMap::new(),
                content_type: request.header("content-type").map(String::from),
            });
            Reply::xml(format!(
                "<InitiateMultipartUploadResult><Bucket>{}</Bucket><Key>{}</Key><UploadId>{}</UploadId></InitiateMultipartUploadResult>",
                bucket,
                xml_escape(key),
                upload_id
            ))
        }
        ("PUT", Some(upload_id)) => {
            let part_number: u32 = param(params, "partNumber")
                .and_then(|n| n.parse().ok())
                .unwrap_or(0);
            if state.fail_parts.remove(&part_number) {
                return Reply::error(500, "InternalError", path);
            }
            let Some(upload) = find_upload(state, bucket, &upload_id) else {
                return Reply::error(404, "NoSuchUpload", path);
            };
            let etag = md5_hex(&request.body);
            upload
                .parts
                .insert(part_number, (request.body.to_vec(), etag.clone()));
            Reply::ok().header("etag", format!("\"{}\"", etag))
        }
        ("GET", Some(upload_id)) => list_parts(state, bucket, &upload_id, params, path),
        ("DELETE", Some(upload_id)) => {
            let before = state.uploads.len();
            state
                .uploads
                .retain(|u| !(u.bucket == bucket && u.upload_id == upload_id));
            if state.uploads.len() == before {
                Reply::error(404, "NoSuchUpload", path)
            } else {
                Reply::new(204)
            }
        }
        ("POST", Some(upload_id)) => complete_upload(state, bucket, key, &upload_id, request, path),
        ("PUT", None) => match request.header("x-amz-copy-source") {
            Some(source) => copy_object(state, bucket, key, &decode(source), request, path),
            None => {
                let etag = md5_hex(&request.body);
                let mut object = StoredObject::new(request.body.to_vec(), etag.clone());
                object.content_type = request.header("content-type").map(String::from);
                object.metadata = request
                    .headers
                    .iter()
                    .filter(|(k, _)| k.starts_with("x-amz-meta-"))
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if let Some(b) = state.buckets.get_mut(bucket) {
                    b.objects.insert(key.to_string(), object);
                }
                Reply::ok().header("etag", format!("\"{}\"", etag))
            }
        },
        ("HEAD", None) | ("GET", None) => {
            let Some(object) = state.buckets.get(bucket).and_then(|b| b.objects.get(key)) else {
                return if method == "HEAD" {
                    Reply::new(404)
                } else {
                    Reply::error(404, "NoSuchKey", path)
                };
            };

            let (status, data) = match request.header("range").and_then(|r| r.strip_prefix("bytes=")) {
                Some(range) => {
                    let (start, end) = range.split_once('-').unwrap_or((range, ""));
                    let start: usize = start.parse().unwrap_or(0);
                    let end: usize = end
                        .parse::<usize>()
                        .map(|e| e + 1)
                        .unwrap_or(object.data.len())
                        .min(object.data.len());
                    (206, object.data[start.min(end)..end].to_vec())
                }
                None => (200, object.data.clone()),
            };

            let mut reply = Reply::new(status)
                .header("content-length", data.len().to_string())
                .header("etag", format!("\"{}\"", object.etag))
                .header("last-modified", format_http_datetime(&object.last_modified))
                .header(
                    "content-type",
                    object
                        .content_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".into()),
                );
            for (k, v) in &object.metadata {
                reply = reply.header(k, v.clone());
            }
            if method == "GET" {
                reply.body = data;
                if let Some(limit) = state.get_body_limit {
                    reply.body.truncate(limit);
                }
            }
            reply
        }
        ("DELETE", None) => {
            if let Some(b) = state.buckets.get_mut(bucket) {
                b.objects.remove(key);
            }
            Reply::new(204)
        }
        _ => Reply::error(405, "MethodNotAllowed", path),
    }
}

fn find_upload<'a>(state: &'a mut State, bucket: &str, upload_id: &str) -> Option<&'a mut MockUpload> {
    state
        .uploads
        .iter_mut()
        .find(|u| u.bucket == bucket && u.upload_id == upload_id)
}

fn list_parts(
    state: &State,
    bucket: &str,
    upload_id: &str,
    params: &[(String, String)],
    path: &str,
) -> Reply {
    let Some(upload) = state
        .uploads
        .iter()
        .find(|u| u.bucket == bucket && u.upload_id == upload_id)
    else {
        return Reply::error(404, "NoSuchUpload", path);
    };
    let page_size = state.page_size.unwrap_or(1000);
    let marker: u32 = param(params, "part-number-marker")
        .and_then(|m| m.parse().ok())
        .unwrap_or(0);

    let parts: Vec<(&u32, &(Vec<u8>, String))> =
        upload.parts.iter().filter(|(n, _)| **n > marker).collect();
    let truncated = parts.len() > page_size;
    let page = &parts[..parts.len().min(page_size)];

    let mut xml = format!(
        "<ListPartsResult xmlns=\"{}\"><Bucket>{}</Bucket><UploadId>{}</UploadId><IsTruncated>{}</IsTruncated>",
        XMLNS, bucket, upload_id, truncated
    );
    if let (true, Some((last, _))) = (truncated, page.last()) {
        xml.push_str(&format!("<NextPartNumberMarker>{}</NextPartNumberMarker>", last));
    }
    for (n, (data, etag)) in page {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><LastModified>2016-01-01T00:00:00.000Z</LastModified><ETag>\"{}\"</ETag><Size>{}</Size></Part>",
            n,
            etag,
            data.len()
        ));
    }
    xml.push_str("</ListPartsResult>");
    Reply::xml(xml)
}

fn complete_upload(
    state: &mut State,
    bucket: &str,
    key: &str,
    upload_id: &str,
    request: &WireRequest,
    path: &str,
) -> Reply {
    if let Some(code) = state.complete_error.take() {
        let mut reply = Reply::s3_error(200, S3Error::new(code, "completion failed"));
        reply.headers.insert("content-type".into(), "application/xml".into());
        return reply;
    }

    let body = String::from_utf8_lossy(&request.body).into_owned();
    let parsed: CompleteBody = match quick_xml::de::from_str(&body) {
        Ok(parsed) => parsed,
        Err(_) => return Reply::error(400, "MalformedXML", path),
    };
    state
        .completed
        .push(parsed.parts.iter().map(|p| p.part_number).collect());

    let Some(idx) = state
        .uploads
        .iter()
        .position(|u| u.bucket == bucket && u.upload_id == upload_id)
    else {
        return Reply::error(404, "NoSuchUpload", path);
    };

    let mut data = Vec::new();
    let mut etags = Vec::new();
    {
        let upload = &state.uploads[idx];
        for part in &parsed.parts {
            match upload.parts.get(&part.part_number) {
                Some((bytes, etag)) if *etag == parse_etag(&part.etag) => {
                    data.extend_from_slice(bytes);
                    etags.push(etag.clone());
                }
                _ => return Reply::error(400, "InvalidPart", path),
            }
        }
    }

    let upload = state.uploads.remove(idx);
    let etag = multipart_etag(&etags);
    let mut object = StoredObject::new(data, etag.clone());
    object.content_type = upload.content_type;
    if let Some(b) = state.buckets.get_mut(bucket) {
        b.objects.insert(key.to_string(), object);
    }

    Reply::xml(format!(
        "<CompleteMultipartUploadResult><Bucket>{}</Bucket><Key>{}</Key><ETag>\"{}\"</ETag></CompleteMultipartUploadResult>",
        bucket,
        xml_escape(key),
        etag
    ))
}

fn copy_object(
    state: &mut State,
    bucket: &str,
    key: &str,
    source: &str,
    request: &WireRequest,
    path: &str,
) -> Reply {
    let Some((src_bucket, src_key)) = source.trim_start_matches('/').split_once('/') else {
        return Reply::error(400, "InvalidArgument", path);
    };
    let Some(source) = state
        .buckets
        .get(src_bucket)
        .and_then(|b| b.objects.get(src_key))
    else {
        return Reply::error(404, "NoSuchKey", path);
    };

    if let Some(expected) = request.header("x-amz-copy-source-if-match") {
        if parse_etag(expected) != source.etag {
            return Reply::error(412, "PreconditionFailed", path);
        }
    }
    if let Some(unexpected) = request.header("x-amz-copy-source-if-none-match") {
        if parse_etag(unexpected) == source.etag {
            return Reply::error(412, "PreconditionFailed", path);
        }
    }

    let mut copy = StoredObject::new(source.data.clone(), source.etag.clone());
    copy.content_type = source.content_type.clone();
    copy.metadata = source.metadata.clone();
    let etag = copy.etag.clone();
    let last_modified = format_s3_datetime(&copy.last_modified);
    if let Some(b) = state.buckets.get_mut(bucket) {
        b.objects.insert(key.to_string(), copy);
    }

    Reply::xml(format!(
        "<CopyObjectResult><LastModified>{}</LastModified><ETag>\"{}\"</ETag></CopyObjectResult>",
        last_modified, etag
    ))
}

#[async_trait]
impl Transport for MockStore {
    async fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let reply = self.handle(&request);

        let mut headers = reply.headers;
        headers.insert("x-amz-request-id".into(), REQUEST_ID.into());
        headers.insert("x-amz-id-2".into(), "mock-host".into());

        Ok(WireResponse {
            status: reply.status,
            headers,
            body: ResponseBody::from_bytes(reply.body),
        })
    }
}
