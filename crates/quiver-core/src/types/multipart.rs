//! Multipart upload types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A part already stored under an upload id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartInfo {
    pub part_number: u32,
    pub etag: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// (part number, etag) pair submitted when completing an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

impl CompletedPart {
    pub fn new(part_number: u32, etag: impl Into<String>) -> Self {
        Self {
            part_number,
            etag: etag.into(),
        }
    }
}

impl From<&PartInfo> for CompletedPart {
    fn from(part: &PartInfo) -> Self {
        Self::new(part.part_number, part.etag.clone())
    }
}

/// A multipart upload that was initiated but neither completed nor aborted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncompleteUpload {
    pub key: String,
    pub upload_id: String,
    pub initiated: Option<DateTime<Utc>>,
    /// Sum of the sizes of parts uploaded so far
    pub size: u64,
}

/// Entry yielded by the incomplete upload listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UploadEntry {
    Upload(IncompleteUpload),
    Prefix { prefix: String },
}
