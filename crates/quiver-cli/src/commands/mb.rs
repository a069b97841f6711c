//! mb command - make bucket

use super::CommandContext;
use crate::s3_client::ObjectUri;
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::debug;

pub async fn execute(ctx: &CommandContext, bucket: &str, region: Option<String>) -> Result<()> {
    let client = ctx.client()?;
    let bucket_name = ObjectUri::bucket_name(bucket)?;

    debug!(bucket = %bucket_name, region = ?region, "Creating bucket");

    client
        .make_bucket(&bucket_name, region.as_deref())
        .await
        .context("Failed to create bucket")?;

    if ctx.is_json() {
        ctx.print_json(&serde_json::json!({ "bucket": bucket_name, "created": true }))?;
    } else {
        ctx.info(&format!("{}: s3://{}", "make_bucket".green(), bucket_name));
    }

    Ok(())
}
