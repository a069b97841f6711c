//! Single pages returned by the listing protocols

use serde::{Deserialize, Serialize};

use super::{IncompleteUpload, ObjectInfo, PartInfo};

/// Page of `GET /<bucket>` (marker based listing)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListObjectsPage {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Marker for the next page; absent once the listing is exhausted
    pub next_marker: Option<String>,
}

/// Page of `GET /<bucket>?list-type=2`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListObjectsV2Page {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_continuation_token: Option<String>,
}

/// Page of `GET /<bucket>?uploads`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListUploadsPage {
    pub uploads: Vec<IncompleteUpload>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub next_key_marker: Option<String>,
    pub next_upload_id_marker: Option<String>,
}

/// Page of `GET /<bucket>/<key>?uploadId=`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListPartsPage {
    pub parts: Vec<PartInfo>,
    pub is_truncated: bool,
    pub next_part_number_marker: Option<u32>,
}
