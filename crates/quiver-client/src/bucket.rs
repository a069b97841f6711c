//! Bucket operations

use http::Method;
use quiver_core::types::BucketInfo;
use quiver_core::utils::validate_bucket_name;
use quiver_core::{Error, Result, DEFAULT_REGION};
use tracing::info;

use crate::client::Client;
use crate::request::S3Request;
use crate::xml;

impl Client {
    /// Create `bucket`, in `region` when given.
    ///
    /// A region that conflicts with the client's fixed region is rejected
    /// before any request is made.
    pub async fn make_bucket(&self, bucket: &str, region: Option<&str>) -> Result<()> {
        validate_bucket_name(bucket)?;

        let region = match (region, self.config().region.as_deref()) {
            (Some(requested), Some(fixed)) if requested != fixed => {
                return Err(Error::InvalidArgument(format!(
                    "region {} conflicts with the client region {}",
                    requested, fixed
                )))
            }
            (Some(requested), _) => requested.to_string(),
            (None, Some(fixed)) => fixed.to_string(),
            (None, None) => DEFAULT_REGION.to_string(),
        };

        let mut request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .path_style()
            .region(DEFAULT_REGION);
        if region != DEFAULT_REGION {
            request = request
                .body(xml::create_bucket_configuration(&region))
                .region(region.clone());
        }

        self.execute(request).await?;
        self.region_cache().insert(bucket, region.clone());

        info!(bucket = %bucket, region = %region, "Created bucket");
        Ok(())
    }

    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>> {
        let response = self.execute(S3Request::new(Method::GET)).await?;
        xml::parse_list_buckets(&response.body.text().await?)
    }

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.execute(S3Request::new(Method::HEAD).bucket(bucket)).await {
            Ok(_) => Ok(true),
            Err(err) if err.has_code("NoSuchBucket") || err.has_code("NotFound") => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub async fn remove_bucket(&self, bucket: &str) -> Result<()> {
        self.execute(S3Request::new(Method::DELETE).bucket(bucket).expect(204))
            .await?;
        self.region_cache().remove(bucket);

        info!(bucket = %bucket, "Removed bucket");
        Ok(())
    }

    /// Bucket policy document; an empty string when none is set
    pub async fn get_bucket_policy(&self, bucket: &str) -> Result<String> {
        match self
            .execute(S3Request::new(Method::GET).bucket(bucket).query("policy"))
            .await
        {
            Ok(response) => response.body.text().await,
            Err(err) if err.has_code("NoSuchBucketPolicy") => Ok(String::new()),
            Err(err) => Err(err),
        }
    }

    /// Replace the bucket policy; an empty policy removes it
    pub async fn set_bucket_policy(&self, bucket: &str, policy: &str) -> Result<()> {
        let request = if policy.trim().is_empty() {
            S3Request::new(Method::DELETE)
                .bucket(bucket)
                .query("policy")
                .expect(204)
        } else {
            serde_json::from_str::<serde_json::Value>(policy)?;
            S3Request::new(Method::PUT)
                .bucket(bucket)
                .query("policy")
                .body(policy.to_string())
                .expect(204)
        };

        self.execute(request).await?;
        Ok(())
    }
}
