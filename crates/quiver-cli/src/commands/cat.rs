//! cat command - stream object content to stdout

use super::CommandContext;
use crate::s3_client::ObjectUri;
use anyhow::{Context, Result};
use tokio::io::{stdout, AsyncWriteExt};

pub async fn execute(ctx: &CommandContext, path: &str) -> Result<()> {
    let client = ctx.client()?;
    let uri = ObjectUri::parse(path)?;
    let key = uri.object_key()?;

    let body = client
        .get_object(&uri.bucket, key)
        .await
        .context("Failed to get object")?;

    let mut reader = body.into_async_read();
    let mut stdout = stdout();
    tokio::io::copy(&mut reader, &mut stdout).await?;
    stdout.flush().await?;

    Ok(())
}
