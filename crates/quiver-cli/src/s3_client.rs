//! Client construction and command-line locations

use crate::config::Config;
use anyhow::{Context, Result};
use quiver_client::Client;
use std::fmt;
use std::path::PathBuf;

const SCHEME: &str = "s3://";

/// Create a client from a profile
pub fn create_client(config: &Config) -> Result<Client> {
    let client_config = config.client_config()?;
    Client::builder(client_config)
        .app_info("quiver-cli", env!("CARGO_PKG_VERSION"))
        .build()
        .context("Failed to create client")
}

/// `s3://bucket[/key]`; an empty bucket addresses the whole service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectUri {
    pub bucket: String,
    pub key: Option<String>,
}

impl ObjectUri {
    pub fn parse(uri: &str) -> Result<Self> {
        let rest = uri
            .strip_prefix(SCHEME)
            .with_context(|| format!("Not an object URI (expected {}bucket/key): {}", SCHEME, uri))?;

        let mut parts = rest.splitn(2, '/');
        let bucket = parts.next().unwrap_or_default();
        let key = parts.next().filter(|k| !k.is_empty()).map(str::to_string);

        if bucket.is_empty() && !rest.is_empty() {
            anyhow::bail!("Missing bucket name in {}", uri);
        }

        Ok(Self {
            bucket: bucket.to_string(),
            key,
        })
    }

    /// Bucket name from either `s3://bucket` or a bare name
    pub fn bucket_name(value: &str) -> Result<String> {
        let bucket = match value.strip_prefix(SCHEME) {
            Some(_) => Self::parse(value)?.bucket,
            None => value.trim_end_matches('/').to_string(),
        };
        anyhow::ensure!(!bucket.is_empty(), "Bucket name cannot be empty");
        Ok(bucket)
    }

    /// True when the URI names a "directory": no key, or a key ending in `/`
    pub fn is_prefix(&self) -> bool {
        self.key.as_deref().map_or(true, |k| k.ends_with('/'))
    }

    pub fn key_or_empty(&self) -> &str {
        self.key.as_deref().unwrap_or_default()
    }

    /// Key of a single object
    pub fn object_key(&self) -> Result<&str> {
        self.key
            .as_deref()
            .with_context(|| format!("Object key required: {}", self))
    }
}

impl fmt::Display for ObjectUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", SCHEME, self.bucket)?;
        if let Some(key) = &self.key {
            write!(f, "/{}", key)?;
        }
        Ok(())
    }
}

/// Either end of a copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Location {
    Local(PathBuf),
    Remote(ObjectUri),
}

impl Location {
    pub fn parse(value: &str) -> Result<Self> {
        if value.starts_with(SCHEME) {
            ObjectUri::parse(value).map(Self::Remote)
        } else {
            Ok(Self::Local(PathBuf::from(value)))
        }
    }
}
