//! rm command - remove objects or abort incomplete uploads

use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::utils::{confirm, KeyFilter};
use anyhow::{Context, Result};
use colored::Colorize;
use futures::TryStreamExt;
use quiver_client::types::{ListEntry, UploadEntry};
use quiver_client::Client;
use tracing::debug;

#[derive(Debug, Default)]
pub struct RmOptions {
    pub recursive: bool,
    pub incomplete: bool,
    pub force: bool,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub dryrun: bool,
}

pub async fn execute(ctx: &CommandContext, path: &str, opts: RmOptions) -> Result<()> {
    let client = ctx.client()?;
    let uri = ObjectUri::parse(path)?;

    if uri.key.is_none() && !opts.recursive {
        anyhow::bail!("Cannot delete bucket contents without --recursive flag");
    }

    match (opts.incomplete, opts.recursive) {
        (true, true) => abort_prefix(ctx, &client, &uri, &opts).await,
        (true, false) => abort_upload(ctx, &client, &uri, &opts).await,
        (false, true) => delete_prefix(ctx, &client, &uri, &opts).await,
        (false, false) => delete_object(ctx, &client, &uri, &opts).await,
    }
}

fn confirmed(ctx: &CommandContext, opts: &RmOptions, msg: &str) -> bool {
    if opts.force || ctx.quiet || opts.dryrun {
        return true;
    }
    if confirm(msg) {
        return true;
    }
    ctx.info("Cancelled");
    false
}

async fn delete_object(
    ctx: &CommandContext,
    client: &Client,
    uri: &ObjectUri,
    opts: &RmOptions,
) -> Result<()> {
    let key = uri.object_key()?;

    if !confirmed(ctx, opts, &format!("Delete {}?", uri)) {
        return Ok(());
    }

    if opts.dryrun {
        println!("(dryrun) delete: {}", uri);
        return Ok(());
    }

    client
        .remove_object(&uri.bucket, key)
        .await
        .context("Delete failed")?;

    ctx.info(&format!("{}: {}", "delete".red(), uri));
    Ok(())
}

async fn delete_prefix(
    ctx: &CommandContext,
    client: &Client,
    uri: &ObjectUri,
    opts: &RmOptions,
) -> Result<()> {
    let entries: Vec<ListEntry> = client
        .list_objects_v2(&uri.bucket, uri.key_or_empty(), true, None)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list {}", uri))?;

    let filter = KeyFilter::new(opts.include.as_deref(), opts.exclude.as_deref())?;
    let keys: Vec<String> = entries
        .into_iter()
        .filter_map(|entry| match entry {
            ListEntry::Object(obj) if filter.accepts(&obj.key) => Some(obj.key),
            _ => None,
        })
        .collect();

    if keys.is_empty() {
        ctx.info("No objects to delete");
        return Ok(());
    }

    let msg = format!("Delete {} object(s) from s3://{}?", keys.len(), uri.bucket);
    if !confirmed(ctx, opts, &msg) {
        return Ok(());
    }

    if opts.dryrun {
        for key in &keys {
            println!("(dryrun) delete: s3://{}/{}", uri.bucket, key);
        }
        return Ok(());
    }

    debug!(bucket = %uri.bucket, count = keys.len(), "Deleting objects");
    let failures = client
        .remove_objects(&uri.bucket, &keys)
        .await
        .context("Bulk delete failed")?;

    for failure in &failures {
        ctx.error(&format!(
            "Failed to delete {}: {} ({})",
            failure.key, failure.message, failure.code
        ));
    }

    ctx.info(&format!(
        "\nDeleted {} of {} object(s)",
        keys.len() - failures.len(),
        keys.len()
    ));

    if !failures.is_empty() {
        anyhow::bail!("{} object(s) could not be deleted", failures.len());
    }
    Ok(())
}

async fn abort_upload(
    ctx: &CommandContext,
    client: &Client,
    uri: &ObjectUri,
    opts: &RmOptions,
) -> Result<()> {
    let key = uri.object_key()?;

    if opts.dryrun {
        println!("(dryrun) abort uploads: {}", uri);
        return Ok(());
    }

    client
        .remove_incomplete_upload(&uri.bucket, key)
        .await
        .context("Failed to abort incomplete upload")?;

    ctx.info(&format!("{}: {}", "abort".red(), uri));
    Ok(())
}

async fn abort_prefix(
    ctx: &CommandContext,
    client: &Client,
    uri: &ObjectUri,
    opts: &RmOptions,
) -> Result<()> {
    let entries: Vec<UploadEntry> = client
        .list_incomplete_uploads(&uri.bucket, uri.key_or_empty(), true)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list incomplete uploads in {}", uri))?;

    let filter = KeyFilter::new(opts.include.as_deref(), opts.exclude.as_deref())?;
    let mut keys: Vec<String> = Vec::new();
    for entry in entries {
        if let UploadEntry::Upload(upload) = entry {
            if filter.accepts(&upload.key) && !keys.contains(&upload.key) {
                keys.push(upload.key);
            }
        }
    }

    if keys.is_empty() {
        ctx.info("No incomplete uploads");
        return Ok(());
    }

    let msg = format!(
        "Abort incomplete uploads of {} key(s) in s3://{}?",
        keys.len(),
        uri.bucket
    );
    if !confirmed(ctx, opts, &msg) {
        return Ok(());
    }

    for key in &keys {
        if opts.dryrun {
            println!("(dryrun) abort uploads: s3://{}/{}", uri.bucket, key);
            continue;
        }
        client
            .remove_incomplete_upload(&uri.bucket, key)
            .await
            .with_context(|| format!("Failed to abort uploads of {}", key))?;
        ctx.info(&format!("{}: s3://{}/{}", "abort".red(), uri.bucket, key));
    }

    Ok(())
}
