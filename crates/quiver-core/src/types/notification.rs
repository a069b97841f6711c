//! Bucket notification types
//!
//! Covers both the stored notification configuration (topic, queue and
//! cloud-function targets with key filters) and the event records delivered
//! by the notification listener.

use serde::{Deserialize, Serialize};

// ============================================================================
// Event Types
// ============================================================================

/// Event names accepted in notification configurations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NotificationEvent {
    ObjectCreatedAll,
    ObjectCreatedPut,
    ObjectCreatedPost,
    ObjectCreatedCopy,
    ObjectCreatedCompleteMultipartUpload,
    ObjectRemovedAll,
    ObjectRemovedDelete,
    ObjectRemovedDeleteMarkerCreated,
    ReducedRedundancyLostObject,
    /// Any event name not modelled above, kept verbatim
    Custom(String),
}

impl NotificationEvent {
    pub fn as_str(&self) -> &str {
        match self {
            Self::ObjectCreatedAll => "s3:ObjectCreated:*",
            Self::ObjectCreatedPut => "s3:ObjectCreated:Put",
            Self::ObjectCreatedPost => "s3:ObjectCreated:Post",
            Self::ObjectCreatedCopy => "s3:ObjectCreated:Copy",
            Self::ObjectCreatedCompleteMultipartUpload => {
                "s3:ObjectCreated:CompleteMultipartUpload"
            }
            Self::ObjectRemovedAll => "s3:ObjectRemoved:*",
            Self::ObjectRemovedDelete => "s3:ObjectRemoved:Delete",
            Self::ObjectRemovedDeleteMarkerCreated => "s3:ObjectRemoved:DeleteMarkerCreated",
            Self::ReducedRedundancyLostObject => "s3:ReducedRedundancyLostObject",
            Self::Custom(name) => name,
        }
    }

    /// Whether a configured event (possibly a wildcard) covers `event_name`
    pub fn covers(&self, event_name: &str) -> bool {
        let pattern = self.as_str();
        match pattern.strip_suffix('*') {
            Some(prefix) => event_name.starts_with(prefix),
            None => pattern == event_name,
        }
    }
}

impl From<String> for NotificationEvent {
    fn from(name: String) -> Self {
        match name.trim() {
            "s3:ObjectCreated:*" => Self::ObjectCreatedAll,
            "s3:ObjectCreated:Put" => Self::ObjectCreatedPut,
            "s3:ObjectCreated:Post" => Self::ObjectCreatedPost,
            "s3:ObjectCreated:Copy" => Self::ObjectCreatedCopy,
            "s3:ObjectCreated:CompleteMultipartUpload" => Self::ObjectCreatedCompleteMultipartUpload,
            "s3:ObjectRemoved:*" => Self::ObjectRemovedAll,
            "s3:ObjectRemoved:Delete" => Self::ObjectRemovedDelete,
            "s3:ObjectRemoved:DeleteMarkerCreated" => Self::ObjectRemovedDeleteMarkerCreated,
            "s3:ReducedRedundancyLostObject" => Self::ReducedRedundancyLostObject,
            other => Self::Custom(other.to_string()),
        }
    }
}

impl From<&str> for NotificationEvent {
    fn from(name: &str) -> Self {
        Self::from(name.to_string())
    }
}

impl From<NotificationEvent> for String {
    fn from(event: NotificationEvent) -> Self {
        event.as_str().to_string()
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Filter Rules
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FilterRule {
    /// "prefix" or "suffix"
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct S3KeyFilter {
    #[serde(rename = "FilterRule", default)]
    pub filter_rules: Vec<FilterRule>,
}

impl S3KeyFilter {
    pub fn with_prefix(mut self, value: impl Into<String>) -> Self {
        self.filter_rules.push(FilterRule {
            name: "prefix".to_string(),
            value: value.into(),
        });
        self
    }

    pub fn with_suffix(mut self, value: impl Into<String>) -> Self {
        self.filter_rules.push(FilterRule {
            name: "suffix".to_string(),
            value: value.into(),
        });
        self
    }

    /// Check if a key matches every rule
    pub fn matches(&self, key: &str) -> bool {
        self.filter_rules
            .iter()
            .all(|rule| match rule.name.to_lowercase().as_str() {
                "prefix" => key.starts_with(&rule.value),
                "suffix" => key.ends_with(&rule.value),
                _ => true,
            })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFilter {
    #[serde(rename = "S3Key", default)]
    pub key: S3KeyFilter,
}

// ============================================================================
// Notification Configurations
// ============================================================================

/// A single notification target (topic, queue or cloud function)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationTarget {
    #[serde(rename = "Id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "Arn", alias = "Topic", alias = "Queue", alias = "CloudFunction")]
    pub arn: String,
    #[serde(rename = "Event", default)]
    pub events: Vec<NotificationEvent>,
    #[serde(rename = "Filter", default)]
    pub filter: NotificationFilter,
}

impl NotificationTarget {
    pub fn new(arn: impl Into<String>) -> Self {
        Self {
            arn: arn.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn add_event(mut self, event: impl Into<NotificationEvent>) -> Self {
        self.events.push(event.into());
        self
    }

    pub fn add_filter_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.filter.key = self.filter.key.with_prefix(prefix);
        self
    }

    pub fn add_filter_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.filter.key = self.filter.key.with_suffix(suffix);
        self
    }

    /// Whether an event on `key` should be delivered to this target
    pub fn matches(&self, event_name: &str, key: &str) -> bool {
        self.events.iter().any(|e| e.covers(event_name)) && self.filter.key.matches(key)
    }
}

/// Complete bucket notification configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationConfiguration {
    #[serde(rename = "TopicConfiguration", default)]
    pub topic_configurations: Vec<NotificationTarget>,
    #[serde(rename = "QueueConfiguration", default)]
    pub queue_configurations: Vec<NotificationTarget>,
    #[serde(rename = "CloudFunctionConfiguration", default)]
    pub cloud_function_configurations: Vec<NotificationTarget>,
}

impl NotificationConfiguration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_topic(mut self, target: NotificationTarget) -> Self {
        self.topic_configurations.push(target);
        self
    }

    pub fn add_queue(mut self, target: NotificationTarget) -> Self {
        self.queue_configurations.push(target);
        self
    }

    pub fn add_cloud_function(mut self, target: NotificationTarget) -> Self {
        self.cloud_function_configurations.push(target);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.topic_configurations.is_empty()
            && self.queue_configurations.is_empty()
            && self.cloud_function_configurations.is_empty()
    }
}

// ============================================================================
// Event Records
// ============================================================================

/// Event record delivered by the notification listener.
///
/// Servers differ in which fields they fill, so everything is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotificationRecord {
    pub event_version: String,
    pub event_source: String,
    pub aws_region: String,
    pub event_time: String,
    pub event_name: String,
    pub s3: RecordS3,
}

impl NotificationRecord {
    pub fn event_time(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        crate::utils::parse_s3_datetime(&self.event_time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordS3 {
    pub configuration_id: String,
    pub bucket: RecordBucket,
    pub object: RecordObject,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordBucket {
    pub name: String,
    pub arn: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RecordObject {
    pub key: String,
    pub size: u64,
    pub e_tag: String,
    pub sequencer: String,
}

/// One line of the listener stream
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationMessage {
    #[serde(rename = "Records", default)]
    pub records: Vec<NotificationRecord>,
}
