//! cp command - copy files to/from S3

use super::CommandContext;
use crate::progress::{create_spinner, create_transfer_progress};
use crate::s3_client::{Location, ObjectUri};
use crate::utils::{child_key, format_size, relative_key, target_key, target_path, KeyFilter};
use anyhow::{Context, Result};
use colored::Colorize;
use futures::TryStreamExt;
use quiver_client::types::{ListEntry, Metadata, ObjectInfo};
use quiver_client::Client;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub struct CpOptions {
    pub recursive: bool,
    pub include: Option<String>,
    pub exclude: Option<String>,
    pub content_type: Option<String>,
    pub show_progress: bool,
    pub dryrun: bool,
}

pub async fn execute(
    ctx: &CommandContext,
    source: &str,
    destination: &str,
    opts: CpOptions,
) -> Result<()> {
    let filter = KeyFilter::new(opts.include.as_deref(), opts.exclude.as_deref())?;

    match (Location::parse(source)?, Location::parse(destination)?) {
        (Location::Local(src), Location::Remote(dest)) => {
            upload(ctx, &src, &dest, &filter, &opts).await
        }
        (Location::Remote(src), Location::Local(dest)) => {
            let dest_is_dir = destination.ends_with('/') || dest.is_dir();
            download(ctx, &src, &dest, dest_is_dir, &filter, &opts).await
        }
        (Location::Remote(src), Location::Remote(dest)) => {
            server_copy(ctx, &src, &dest, &filter, &opts).await
        }
        (Location::Local(_), Location::Local(_)) => {
            anyhow::bail!("Local to local copy is not supported. Use system cp command.")
        }
    }
}

fn upload_metadata(path: &Path, content_type: Option<&str>) -> Metadata {
    let content_type = content_type.map(str::to_string).unwrap_or_else(|| {
        mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string()
    });
    let mut metadata = Metadata::new();
    metadata.insert("Content-Type".to_string(), content_type);
    metadata
}

async fn upload(
    ctx: &CommandContext,
    source: &Path,
    dest: &ObjectUri,
    filter: &KeyFilter,
    opts: &CpOptions,
) -> Result<()> {
    let client = ctx.client()?;

    if source.is_file() {
        let key = target_key(&source.to_string_lossy(), dest);
        upload_file(ctx, &client, source, &dest.bucket, &key, opts).await
    } else if source.is_dir() {
        if !opts.recursive {
            anyhow::bail!("Cannot copy directory without --recursive flag");
        }
        upload_directory(ctx, &client, source, dest, filter, opts).await
    } else {
        anyhow::bail!("Source path does not exist: {}", source.display())
    }
}

async fn upload_file(
    ctx: &CommandContext,
    client: &Client,
    source: &Path,
    bucket: &str,
    key: &str,
    opts: &CpOptions,
) -> Result<()> {
    if opts.dryrun {
        println!("(dryrun) upload: {} to s3://{}/{}", source.display(), bucket, key);
        return Ok(());
    }

    let metadata = upload_metadata(source, opts.content_type.as_deref());
    debug!(source = %source.display(), bucket = bucket, key = key, "Uploading file");

    if opts.show_progress {
        let size = tokio::fs::metadata(source).await?.len();
        let file = tokio::fs::File::open(source)
            .await
            .with_context(|| format!("Failed to open {}", source.display()))?;
        let pb = create_transfer_progress(size, &source.display().to_string());
        let result = client
            .put_object(bucket, key, pb.wrap_async_read(file), Some(size), &metadata)
            .await;
        pb.finish_and_clear();
        result.with_context(|| format!("Upload failed: {}", source.display()))?;
    } else {
        client
            .fput_object(bucket, key, source, &metadata)
            .await
            .with_context(|| format!("Upload failed: {}", source.display()))?;
    }

    ctx.info(&format!(
        "{}: {} to s3://{}/{}",
        "upload".green(),
        source.display(),
        bucket,
        key
    ));
    Ok(())
}

async fn upload_directory(
    ctx: &CommandContext,
    client: &Client,
    source: &Path,
    dest_uri: &ObjectUri,
    filter: &KeyFilter,
    opts: &CpOptions,
) -> Result<()> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();

    for entry in WalkDir::new(source).follow_links(true) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(source)?
            .to_string_lossy()
            .replace('\\', "/");
        if filter.accepts(&relative) {
            files.push((entry.path().to_path_buf(), relative));
        }
    }

    if files.is_empty() {
        ctx.info("No files to upload");
        return Ok(());
    }

    let mut total_bytes = 0u64;
    for (path, relative) in &files {
        let key = child_key(dest_uri.key_or_empty(), relative);
        upload_file(ctx, client, path, &dest_uri.bucket, &key, opts).await?;
        total_bytes += tokio::fs::metadata(path).await?.len();
    }

    ctx.info(&format!(
        "\nUploaded {} file(s), {}",
        files.len(),
        format_size(total_bytes, true)
    ));
    Ok(())
}

async fn download(
    ctx: &CommandContext,
    source: &ObjectUri,
    dest: &Path,
    dest_is_dir: bool,
    filter: &KeyFilter,
    opts: &CpOptions,
) -> Result<()> {
    let client = ctx.client()?;

    if opts.recursive || source.key.is_none() {
        return download_prefix(ctx, &client, source, dest, filter, opts).await;
    }

    let key = source.object_key()?;
    let dest = target_path(key, dest, dest_is_dir);
    download_file(ctx, &client, &source.bucket, key, &dest, opts).await
}

async fn download_file(
    ctx: &CommandContext,
    client: &Client,
    bucket: &str,
    key: &str,
    dest: &Path,
    opts: &CpOptions,
) -> Result<()> {
    if opts.dryrun {
        println!("(dryrun) download: s3://{}/{} to {}", bucket, key, dest.display());
        return Ok(());
    }

    let spinner = opts
        .show_progress
        .then(|| create_spinner(&format!("Downloading {}", key)));
    let result = client.fget_object(bucket, key, dest).await;
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    result.with_context(|| format!("Download failed: s3://{}/{}", bucket, key))?;

    ctx.info(&format!(
        "{}: s3://{}/{} to {}",
        "download".green(),
        bucket,
        key,
        dest.display()
    ));
    Ok(())
}

async fn download_prefix(
    ctx: &CommandContext,
    client: &Client,
    src_uri: &ObjectUri,
    dest_dir: &Path,
    filter: &KeyFilter,
    opts: &CpOptions,
) -> Result<()> {
    let prefix = src_uri.key_or_empty();
    let objects = list_matching(client, src_uri, filter).await?;

    if objects.is_empty() {
        ctx.info("No objects to download");
        return Ok(());
    }

    let mut total_bytes = 0u64;
    for obj in &objects {
        let relative = relative_key(&obj.key, prefix);
        if relative.is_empty() || obj.key.ends_with('/') {
            continue;
        }
        let dest = dest_dir.join(relative);
        download_file(ctx, client, &src_uri.bucket, &obj.key, &dest, opts).await?;
        total_bytes += obj.size;
    }

    ctx.info(&format!(
        "\nDownloaded {} object(s), {}",
        objects.len(),
        format_size(total_bytes, true)
    ));
    Ok(())
}

async fn list_matching(
    client: &Client,
    uri: &ObjectUri,
    filter: &KeyFilter,
) -> Result<Vec<ObjectInfo>> {
    let entries: Vec<ListEntry> = client
        .list_objects_v2(&uri.bucket, uri.key_or_empty(), true, None)
        .try_collect()
        .await
        .with_context(|| format!("Failed to list {}", uri))?;

    Ok(entries
        .into_iter()
        .filter_map(|entry| match entry {
            ListEntry::Object(obj) if filter.accepts(&obj.key) => Some(obj),
            _ => None,
        })
        .collect())
}

async fn server_copy(
    ctx: &CommandContext,
    src_uri: &ObjectUri,
    dest_uri: &ObjectUri,
    filter: &KeyFilter,
    opts: &CpOptions,
) -> Result<()> {
    let client = ctx.client()?;

    let pairs: Vec<(String, String)> = if opts.recursive {
        let prefix = src_uri.key_or_empty();
        list_matching(&client, src_uri, filter)
            .await?
            .into_iter()
            .map(|obj| {
                let dest_key = child_key(dest_uri.key_or_empty(), relative_key(&obj.key, prefix));
                (obj.key, dest_key)
            })
            .collect()
    } else {
        let key = src_uri.object_key()?;
        vec![(key.to_string(), target_key(key, dest_uri))]
    };

    for (src_key, dest_key) in &pairs {
        if opts.dryrun {
            println!(
                "(dryrun) copy: s3://{}/{} to s3://{}/{}",
                src_uri.bucket, src_key, dest_uri.bucket, dest_key
            );
            continue;
        }
        client
            .copy_object(
                &dest_uri.bucket,
                dest_key,
                &format!("/{}/{}", src_uri.bucket, src_key),
                None,
            )
            .await
            .with_context(|| format!("Copy failed: s3://{}/{}", src_uri.bucket, src_key))?;
        ctx.info(&format!(
            "{}: s3://{}/{} to s3://{}/{}",
            "copy".green(),
            src_uri.bucket,
            src_key,
            dest_uri.bucket,
            dest_key
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_metadata_guesses_content_type() {
        let metadata = upload_metadata(Path::new("photo.png"), None);
        assert_eq!(metadata.get("Content-Type").map(String::as_str), Some("image/png"));

        let metadata = upload_metadata(Path::new("blob"), None);
        assert_eq!(
            metadata.get("Content-Type").map(String::as_str),
            Some("application/octet-stream")
        );

        let metadata = upload_metadata(Path::new("photo.png"), Some("text/plain"));
        assert_eq!(metadata.get("Content-Type").map(String::as_str), Some("text/plain"));
    }
}
