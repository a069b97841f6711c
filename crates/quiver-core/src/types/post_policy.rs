//! Browser POST upload policies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::utils::{format_s3_datetime, validate_bucket_name, validate_object_name, validate_prefix};
use crate::{Error, Result};

/// One entry of the policy's `conditions` array
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyCondition {
    /// `["eq", "$field", value]`
    Eq(String, String),
    /// `["starts-with", "$field", prefix]`
    StartsWith(String, String),
    /// `["content-length-range", min, max]`
    ContentLengthRange(u64, u64),
}

impl PolicyCondition {
    pub fn to_json(&self) -> Value {
        match self {
            PolicyCondition::Eq(field, value) => json!(["eq", field, value]),
            PolicyCondition::StartsWith(field, value) => json!(["starts-with", field, value]),
            PolicyCondition::ContentLengthRange(min, max) => {
                json!(["content-length-range", min, max])
            }
        }
    }
}

/// Conditions a browser form upload must satisfy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostPolicy {
    expiration: Option<DateTime<Utc>>,
    conditions: Vec<PolicyCondition>,
    bucket: Option<String>,
    /// Form fields the uploader must submit along with the file
    pub form_data: BTreeMap<String, String>,
}

impl PostPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_expires(&mut self, expires: DateTime<Utc>) -> &mut Self {
        self.expiration = Some(expires);
        self
    }

    pub fn set_key(&mut self, key: &str) -> Result<&mut Self> {
        validate_object_name(key)?;
        self.conditions
            .push(PolicyCondition::Eq("$key".into(), key.to_string()));
        self.form_data.insert("key".into(), key.to_string());
        Ok(self)
    }

    pub fn set_key_starts_with(&mut self, prefix: &str) -> Result<&mut Self> {
        validate_prefix(prefix)?;
        self.conditions
            .push(PolicyCondition::StartsWith("$key".into(), prefix.to_string()));
        self.form_data.insert("key".into(), prefix.to_string());
        Ok(self)
    }

    pub fn set_bucket(&mut self, bucket: &str) -> Result<&mut Self> {
        validate_bucket_name(bucket)?;
        self.conditions
            .push(PolicyCondition::Eq("$bucket".into(), bucket.to_string()));
        self.form_data.insert("bucket".into(), bucket.to_string());
        self.bucket = Some(bucket.to_string());
        Ok(self)
    }

    pub fn set_content_type(&mut self, content_type: &str) -> Result<&mut Self> {
        if content_type.is_empty() {
            return Err(Error::InvalidArgument("content-type cannot be empty".into()));
        }
        self.conditions.push(PolicyCondition::Eq(
            "$Content-Type".into(),
            content_type.to_string(),
        ));
        self.form_data
            .insert("Content-Type".into(), content_type.to_string());
        Ok(self)
    }

    pub fn set_content_length_range(&mut self, min: u64, max: u64) -> Result<&mut Self> {
        if min > max {
            return Err(Error::InvalidArgument(format!(
                "min length {} exceeds max length {}",
                min, max
            )));
        }
        self.conditions
            .push(PolicyCondition::ContentLengthRange(min, max));
        Ok(self)
    }

    /// Add an `eq` condition and the matching form field
    pub fn add_signing_field(&mut self, name: &str, value: &str) {
        self.conditions
            .push(PolicyCondition::Eq(format!("${}", name), value.to_string()));
        self.form_data.insert(name.to_string(), value.to_string());
    }

    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref()
    }

    pub fn expiration(&self) -> Option<DateTime<Utc>> {
        self.expiration
    }

    pub fn conditions(&self) -> &[PolicyCondition] {
        &self.conditions
    }

    /// Policy document as submitted (before base64 encoding)
    pub fn to_json(&self) -> String {
        let mut policy = serde_json::Map::new();
        if let Some(expiration) = &self.expiration {
            policy.insert("expiration".into(), json!(format_s3_datetime(expiration)));
        }
        policy.insert(
            "conditions".into(),
            Value::Array(self.conditions.iter().map(PolicyCondition::to_json).collect()),
        );
        Value::Object(policy).to_string()
    }
}

/// Target URL and form fields for a browser upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostPolicyResult {
    pub post_url: String,
    pub form_data: BTreeMap<String, String>,
}
