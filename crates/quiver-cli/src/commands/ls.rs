//! ls command - list buckets, objects or incomplete uploads

use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::utils::{format_optional_datetime, format_size};
use anyhow::{Context, Result};
use colored::Colorize;
use futures::TryStreamExt;
use quiver_client::types::{IncompleteUpload, ListEntry, ObjectInfo, UploadEntry};
use quiver_client::Client;
use serde::Serialize;

pub struct LsOptions {
    pub recursive: bool,
    pub long: bool,
    pub human_readable: bool,
    pub summarize: bool,
    pub incomplete: bool,
}

#[derive(Serialize)]
struct ObjectListing<'a> {
    bucket: &'a str,
    prefix: &'a str,
    objects: Vec<&'a ObjectInfo>,
    prefixes: Vec<&'a str>,
    total_objects: usize,
    total_size: u64,
}

pub async fn execute(ctx: &CommandContext, path: &str, opts: LsOptions) -> Result<()> {
    let client = ctx.client()?;
    let uri = ObjectUri::parse(path)?;

    if uri.bucket.is_empty() {
        list_buckets(ctx, &client, &opts).await
    } else if opts.incomplete {
        list_uploads(ctx, &client, &uri, &opts).await
    } else {
        list_objects(ctx, &client, &uri, &opts).await
    }
}

async fn list_buckets(ctx: &CommandContext, client: &Client, opts: &LsOptions) -> Result<()> {
    let buckets = client.list_buckets().await.context("Failed to list buckets")?;

    if ctx.is_json() {
        return ctx.print_json(&buckets);
    }

    for bucket in &buckets {
        if opts.long {
            println!(
                "{} {}",
                format_optional_datetime(bucket.creation_date.as_ref()),
                bucket.name.blue().bold()
            );
        } else {
            println!("{}", bucket.name.blue().bold());
        }
    }

    ctx.info(&format!("\nTotal: {} bucket(s)", buckets.len()));
    Ok(())
}

async fn list_objects(
    ctx: &CommandContext,
    client: &Client,
    uri: &ObjectUri,
    opts: &LsOptions,
) -> Result<()> {
    let prefix = uri.key_or_empty();
    let entries: Vec<ListEntry> = client
        .list_objects_v2(&uri.bucket, prefix, opts.recursive, None)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list {}", uri))?;

    let objects: Vec<&ObjectInfo> = entries.iter().filter_map(ListEntry::as_object).collect();
    let prefixes: Vec<&str> = entries
        .iter()
        .filter(|e| e.as_object().is_none())
        .map(ListEntry::name)
        .collect();
    let total_size: u64 = objects.iter().map(|o| o.size).sum();

    if ctx.is_json() {
        let listing = ObjectListing {
            bucket: &uri.bucket,
            prefix,
            total_objects: objects.len(),
            objects,
            prefixes,
            total_size,
        };
        return ctx.print_json(&listing);
    }

    if opts.summarize {
        println!(
            "Total Objects: {}\nTotal Size: {}",
            objects.len(),
            format_size(total_size, opts.human_readable)
        );
        return Ok(());
    }

    for prefix in &prefixes {
        if opts.long {
            println!("{:>19} {:>12}  PRE {}", "", "", prefix.blue().bold());
        } else {
            println!("{}", prefix.blue().bold());
        }
    }

    for obj in &objects {
        if opts.long {
            println!(
                "{} {:>12}  {:8}  {}",
                format_optional_datetime(obj.last_modified.as_ref()),
                format_size(obj.size, opts.human_readable),
                obj.storage_class.as_deref().unwrap_or("STANDARD"),
                obj.key
            );
        } else {
            println!("{}", obj.key);
        }
    }

    ctx.info(&format!(
        "\nTotal: {} object(s), {}",
        objects.len(),
        format_size(total_size, opts.human_readable)
    ));
    Ok(())
}

async fn list_uploads(
    ctx: &CommandContext,
    client: &Client,
    uri: &ObjectUri,
    opts: &LsOptions,
) -> Result<()> {
    let entries: Vec<UploadEntry> = client
        .list_incomplete_uploads(&uri.bucket, uri.key_or_empty(), opts.recursive)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list incomplete uploads in {}", uri))?;

    if ctx.is_json() {
        return ctx.print_json(&entries);
    }

    let mut uploads: Vec<&IncompleteUpload> = Vec::new();
    for entry in &entries {
        match entry {
            UploadEntry::Prefix { prefix } => println!("{}", prefix.blue().bold()),
            UploadEntry::Upload(upload) => uploads.push(upload),
        }
    }

    for upload in &uploads {
        if opts.long {
            println!(
                "{} {:>12}  {}  {}",
                format_optional_datetime(upload.initiated.as_ref()),
                format_size(upload.size, opts.human_readable),
                upload.upload_id.dimmed(),
                upload.key
            );
        } else {
            println!("{}", upload.key);
        }
    }

    ctx.info(&format!("\nTotal: {} incomplete upload(s)", uploads.len()));
    Ok(())
}
