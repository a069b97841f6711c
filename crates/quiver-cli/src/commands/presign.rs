//! presign command - generate presigned URLs

use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::PresignMethod;
use anyhow::{Context, Result};
use quiver_client::types::PresignOptions;
use tracing::debug;

pub async fn execute(
    ctx: &CommandContext,
    path: &str,
    expires: u64,
    method: PresignMethod,
    response_content_type: Option<String>,
) -> Result<()> {
    let client = ctx.client()?;
    let uri = ObjectUri::parse(path)?;
    let key = uri.object_key()?;

    debug!(uri = %uri, method = ?method, expires = expires, "Generating presigned URL");

    let presigned = match method {
        PresignMethod::Get => {
            let mut options = PresignOptions::new().expires_in(expires);
            if let Some(content_type) = response_content_type {
                options = options.param("response-content-type", content_type);
            }
            client.presigned_get_object(&uri.bucket, key, options).await
        }
        PresignMethod::Put => {
            if response_content_type.is_some() {
                anyhow::bail!("--response-content-type only applies to GET URLs");
            }
            client.presigned_put_object(&uri.bucket, key, expires).await
        }
    }
    .context("Failed to presign URL")?;

    if ctx.is_json() {
        ctx.print_json(&presigned)?;
    } else {
        println!("{}", presigned.url);
    }

    Ok(())
}
