//! rb command - remove bucket

use super::rm::{execute as rm_execute, RmOptions};
use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::utils::confirm;
use anyhow::{Context, Result};
use colored::Colorize;
use tracing::debug;

pub async fn execute(ctx: &CommandContext, bucket: &str, force: bool) -> Result<()> {
    let client = ctx.client()?;
    let bucket_name = ObjectUri::bucket_name(bucket)?;

    if force {
        if !ctx.quiet {
            let msg = format!(
                "Delete all objects in bucket '{}' and remove bucket?",
                bucket_name
            );
            if !confirm(&msg) {
                ctx.info("Cancelled");
                return Ok(());
            }
        }

        debug!(bucket = %bucket_name, "Emptying bucket");

        let s3_path = format!("s3://{}/", bucket_name);
        let rm_opts = RmOptions {
            recursive: true,
            force: true,
            ..Default::default()
        };
        rm_execute(ctx, &s3_path, rm_opts).await?;

        let uploads = RmOptions {
            incomplete: true,
            recursive: true,
            force: true,
            ..Default::default()
        };
        rm_execute(ctx, &s3_path, uploads).await?;
    }

    client
        .remove_bucket(&bucket_name)
        .await
        .context("Failed to delete bucket. Bucket may not be empty (use --force).")?;

    ctx.info(&format!("{}: s3://{}", "remove_bucket".red(), bucket_name));

    Ok(())
}
