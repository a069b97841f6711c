//! Bucket region discovery and caching

use http::Method;
use parking_lot::RwLock;
use quiver_core::types::region_from_location;
use quiver_core::utils::validate_bucket_name;
use quiver_core::Result;
use std::collections::HashMap;
use tracing::debug;

use crate::client::Client;
use crate::request::S3Request;
use crate::xml;

/// Bucket name to region mapping shared by all requests of a client
pub trait RegionCache: Send + Sync {
    fn get(&self, bucket: &str) -> Option<String>;
    fn insert(&self, bucket: &str, region: String);
    fn remove(&self, bucket: &str);
}

/// Default in-memory [`RegionCache`]
#[derive(Debug, Default)]
pub struct MemoryRegionCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryRegionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl RegionCache for MemoryRegionCache {
    fn get(&self, bucket: &str) -> Option<String> {
        self.entries.read().get(bucket).cloned()
    }

    fn insert(&self, bucket: &str, region: String) {
        self.entries.write().insert(bucket.to_string(), region);
    }

    fn remove(&self, bucket: &str) {
        self.entries.write().remove(bucket);
    }
}

/// Region used to sign a location lookup
enum Attempt {
    Bootstrap,
    Corrected(String),
}

impl Client {
    /// Region of `bucket`, from configuration, cache or a location lookup.
    ///
    /// The lookup is signed with the bootstrap region first. A store that
    /// answers `AuthorizationHeaderMalformed` with the bucket's real region
    /// gets exactly one more attempt signed for that region.
    pub async fn get_bucket_region(&self, bucket: &str) -> Result<String> {
        validate_bucket_name(bucket)?;

        if let Some(region) = &self.config().region {
            return Ok(region.clone());
        }
        if let Some(region) = self.region_cache().get(bucket) {
            return Ok(region);
        }

        let mut attempt = Attempt::Bootstrap;
        loop {
            let signing_region = match &attempt {
                Attempt::Bootstrap => self.config().bootstrap_region.clone(),
                Attempt::Corrected(region) => region.clone(),
            };

            let request = S3Request::new(Method::GET)
                .bucket(bucket)
                .query("location")
                .path_style();

            match self.execute_in_region(request, &signing_region).await {
                Ok(response) => {
                    let body = response.body.text().await?;
                    let constraint = xml::parse_location_constraint(&body)?;
                    let region = region_from_location(constraint.as_deref());
                    debug!(bucket = %bucket, region = %region, "Resolved bucket region");
                    self.region_cache().insert(bucket, region.clone());
                    return Ok(region);
                }
                Err(err) => {
                    let corrected = err.corrected_region().map(String::from);
                    match (attempt, corrected) {
                        (Attempt::Bootstrap, Some(region)) => {
                            debug!(
                                bucket = %bucket,
                                region = %region,
                                "Retrying location lookup with corrected region"
                            );
                            attempt = Attempt::Corrected(region);
                        }
                        _ => return Err(err),
                    }
                }
            }
        }
    }
}
