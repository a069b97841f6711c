//! XML request bodies and response documents

use quick_xml::events::Event;
use quick_xml::Reader;
use quiver_core::types::{
    BucketInfo, CompletedPart, CopyObjectResult, DeleteError, IncompleteUpload, ListObjectsPage,
    ListObjectsV2Page, ListPartsPage, ListUploadsPage, NotificationConfiguration,
    NotificationTarget, ObjectInfo, PartInfo,
};
use quiver_core::utils::{parse_etag, parse_s3_datetime, xml_escape};
use quiver_core::{Error, Result};
use serde::Deserialize;

const S3_XMLNS: &str = "http://s3.amazonaws.com/doc/2006-03-01/";

// ============================================================================
// Response documents
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListAllMyBucketsResult {
    #[serde(default)]
    buckets: BucketsXml,
}

#[derive(Debug, Default, Deserialize)]
struct BucketsXml {
    #[serde(rename = "Bucket", default)]
    bucket: Vec<BucketXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BucketXml {
    name: String,
    creation_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListBucketResult {
    #[serde(rename = "Contents", default)]
    contents: Vec<ContentsXml>,
    #[serde(rename = "CommonPrefixes", default)]
    common_prefixes: Vec<CommonPrefixXml>,
    #[serde(rename = "IsTruncated")]
    is_truncated: Option<String>,
    #[serde(rename = "NextMarker")]
    next_marker: Option<String>,
    #[serde(rename = "NextContinuationToken")]
    next_continuation_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContentsXml {
    key: String,
    last_modified: Option<String>,
    #[serde(rename = "ETag")]
    etag: Option<String>,
    size: Option<u64>,
    storage_class: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CommonPrefixXml {
    prefix: String,
}

#[derive(Debug, Default, Deserialize)]
struct ListMultipartUploadsResult {
    #[serde(rename = "Upload", default)]
    uploads: Vec<UploadXml>,
    #[serde(rename = "CommonPrefixes", default)]
    common_prefixes: Vec<CommonPrefixXml>,
    #[serde(rename = "IsTruncated")]
    is_truncated: Option<String>,
    #[serde(rename = "NextKeyMarker")]
    next_key_marker: Option<String>,
    #[serde(rename = "NextUploadIdMarker")]
    next_upload_id_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UploadXml {
    key: String,
    upload_id: String,
    initiated: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListPartsResult {
    #[serde(rename = "Part", default)]
    parts: Vec<PartXml>,
    #[serde(rename = "IsTruncated")]
    is_truncated: Option<String>,
    #[serde(rename = "NextPartNumberMarker")]
    next_part_number_marker: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PartXml {
    part_number: u32,
    #[serde(rename = "ETag")]
    etag: String,
    size: Option<u64>,
    last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateMultipartUploadResult {
    upload_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EtagResult {
    #[serde(rename = "ETag")]
    etag: Option<String>,
    #[serde(rename = "LastModified")]
    last_modified: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DeleteResult {
    #[serde(rename = "Error", default)]
    errors: Vec<DeleteErrorXml>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DeleteErrorXml {
    key: String,
    code: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LocationConstraint {
    #[serde(rename = "$text")]
    region: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn is_true(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|v| v.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn object_info(contents: ContentsXml) -> ObjectInfo {
    ObjectInfo {
        key: contents.key,
        last_modified: contents.last_modified.as_deref().and_then(parse_s3_datetime),
        etag: contents.etag.as_deref().map(parse_etag).unwrap_or_default(),
        size: contents.size.unwrap_or(0),
        storage_class: non_empty(contents.storage_class),
    }
}

pub fn parse_list_buckets(body: &str) -> Result<Vec<BucketInfo>> {
    let result: ListAllMyBucketsResult = quick_xml::de::from_str(body)?;
    Ok(result
        .buckets
        .bucket
        .into_iter()
        .map(|b| BucketInfo {
            name: b.name,
            creation_date: b.creation_date.as_deref().and_then(parse_s3_datetime),
        })
        .collect())
}

pub fn parse_list_objects(body: &str) -> Result<ListObjectsPage> {
    let result: ListBucketResult = quick_xml::de::from_str(body)?;
    Ok(ListObjectsPage {
        is_truncated: is_true(&result.is_truncated),
        next_marker: non_empty(result.next_marker),
        objects: result.contents.into_iter().map(object_info).collect(),
        prefixes: result.common_prefixes.into_iter().map(|p| p.prefix).collect(),
    })
}

pub fn parse_list_objects_v2(body: &str) -> Result<ListObjectsV2Page> {
    let result: ListBucketResult = quick_xml::de::from_str(body)?;
    Ok(ListObjectsV2Page {
        is_truncated: is_true(&result.is_truncated),
        next_continuation_token: non_empty(result.next_continuation_token),
        objects: result.contents.into_iter().map(object_info).collect(),
        prefixes: result.common_prefixes.into_iter().map(|p| p.prefix).collect(),
    })
}

/// Upload sizes are left at zero; they come from the parts listing
pub fn parse_list_uploads(body: &str) -> Result<ListUploadsPage> {
    let result: ListMultipartUploadsResult = quick_xml::de::from_str(body)?;
    Ok(ListUploadsPage {
        is_truncated: is_true(&result.is_truncated),
        next_key_marker: non_empty(result.next_key_marker),
        next_upload_id_marker: non_empty(result.next_upload_id_marker),
        uploads: result
            .uploads
            .into_iter()
            .map(|u| IncompleteUpload {
                key: u.key,
                upload_id: u.upload_id,
                initiated: u.initiated.as_deref().and_then(parse_s3_datetime),
                size: 0,
            })
            .collect(),
        prefixes: result.common_prefixes.into_iter().map(|p| p.prefix).collect(),
    })
}

pub fn parse_list_parts(body: &str) -> Result<ListPartsPage> {
    let result: ListPartsResult = quick_xml::de::from_str(body)?;

    let next_part_number_marker = match non_empty(result.next_part_number_marker) {
        Some(marker) => Some(marker.trim().parse::<u32>().map_err(|_| {
            Error::InvalidXml(format!("invalid NextPartNumberMarker: {}", marker))
        })?),
        None => None,
    };

    Ok(ListPartsPage {
        is_truncated: is_true(&result.is_truncated),
        next_part_number_marker,
        parts: result
            .parts
            .into_iter()
            .map(|p| PartInfo {
                part_number: p.part_number,
                etag: parse_etag(&p.etag),
                size: p.size.unwrap_or(0),
                last_modified: p.last_modified.as_deref().and_then(parse_s3_datetime),
            })
            .collect(),
    })
}

pub fn parse_upload_id(body: &str) -> Result<String> {
    let result: InitiateMultipartUploadResult = quick_xml::de::from_str(body)?;
    non_empty(result.upload_id).ok_or_else(|| Error::MissingField("UploadId".into()))
}

/// ETag of a `CompleteMultipartUploadResult`
pub fn parse_complete_etag(body: &str) -> Result<String> {
    let result: EtagResult = quick_xml::de::from_str(body)?;
    result
        .etag
        .as_deref()
        .map(parse_etag)
        .filter(|e| !e.is_empty())
        .ok_or_else(|| Error::MissingField("ETag".into()))
}

pub fn parse_copy_object(body: &str) -> Result<CopyObjectResult> {
    let result: EtagResult = quick_xml::de::from_str(body)?;
    Ok(CopyObjectResult {
        etag: result.etag.as_deref().map(parse_etag).unwrap_or_default(),
        last_modified: result.last_modified.as_deref().and_then(parse_s3_datetime),
    })
}

pub fn parse_delete_result(body: &str) -> Result<Vec<DeleteError>> {
    if body.trim().is_empty() {
        return Ok(Vec::new());
    }
    let result: DeleteResult = quick_xml::de::from_str(body)?;
    Ok(result
        .errors
        .into_iter()
        .map(|e| DeleteError {
            key: e.key,
            code: e.code.unwrap_or_default(),
            message: e.message.unwrap_or_default(),
        })
        .collect())
}

pub fn parse_location_constraint(body: &str) -> Result<Option<String>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let result: LocationConstraint = quick_xml::de::from_str(body)?;
    Ok(non_empty(result.region.map(|r| r.trim().to_string())))
}

pub fn parse_notification_configuration(body: &str) -> Result<NotificationConfiguration> {
    if body.trim().is_empty() {
        return Ok(NotificationConfiguration::default());
    }
    Ok(quick_xml::de::from_str(body)?)
}

/// Name of the document's root element.
///
/// Completion and copy responses arrive with status 200 even when the store
/// failed, so callers look for an `Error` root.
pub fn root_element(body: &str) -> Result<Option<String>> {
    let mut reader = Reader::from_str(body);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(Some(String::from_utf8_lossy(e.name().as_ref()).into_owned()))
            }
            Ok(Event::Eof) => return Ok(None),
            Ok(_) => {}
            Err(e) => return Err(Error::InvalidXml(e.to_string())),
        }
    }
}

// ============================================================================
// Request bodies
// ============================================================================

pub fn create_bucket_configuration(region: &str) -> String {
    format!(
        r#"<CreateBucketConfiguration xmlns="{}"><LocationConstraint>{}</LocationConstraint></CreateBucketConfiguration>"#,
        S3_XMLNS,
        xml_escape(region)
    )
}

pub fn complete_multipart_upload(parts: &[CompletedPart]) -> String {
    let mut xml = String::from("<CompleteMultipartUpload>");
    for part in parts {
        xml.push_str(&format!(
            "<Part><PartNumber>{}</PartNumber><ETag>\"{}\"</ETag></Part>",
            part.part_number,
            xml_escape(&part.etag)
        ));
    }
    xml.push_str("</CompleteMultipartUpload>");
    xml
}

/// Quiet mode: only failures are reported back
pub fn delete_objects<S: AsRef<str>>(keys: &[S]) -> String {
    let mut xml = String::from("<Delete><Quiet>true</Quiet>");
    for key in keys {
        xml.push_str(&format!(
            "<Object><Key>{}</Key></Object>",
            xml_escape(key.as_ref())
        ));
    }
    xml.push_str("</Delete>");
    xml
}

fn push_target(xml: &mut String, element: &str, arn_element: &str, target: &NotificationTarget) {
    xml.push_str(&format!("<{}>", element));
    if let Some(id) = &target.id {
        xml.push_str(&format!("<Id>{}</Id>", xml_escape(id)));
    }
    xml.push_str(&format!(
        "<{0}>{1}</{0}>",
        arn_element,
        xml_escape(&target.arn)
    ));
    for event in &target.events {
        xml.push_str(&format!("<Event>{}</Event>", xml_escape(event.as_str())));
    }
    if !target.filter.key.filter_rules.is_empty() {
        xml.push_str("<Filter><S3Key>");
        for rule in &target.filter.key.filter_rules {
            xml.push_str(&format!(
                "<FilterRule><Name>{}</Name><Value>{}</Value></FilterRule>",
                xml_escape(&rule.name),
                xml_escape(&rule.value)
            ));
        }
        xml.push_str("</S3Key></Filter>");
    }
    xml.push_str(&format!("</{}>", element));
}

pub fn notification_configuration(config: &NotificationConfiguration) -> String {
    let mut xml = format!(r#"<NotificationConfiguration xmlns="{}">"#, S3_XMLNS);
    for target in &config.topic_configurations {
        push_target(&mut xml, "TopicConfiguration", "Topic", target);
    }
    for target in &config.queue_configurations {
        push_target(&mut xml, "QueueConfiguration", "Queue", target);
    }
    for target in &config.cloud_function_configurations {
        push_target(&mut xml, "CloudFunctionConfiguration", "CloudFunction", target);
    }
    xml.push_str("</NotificationConfiguration>");
    xml
}
