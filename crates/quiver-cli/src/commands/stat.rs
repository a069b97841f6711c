//! stat command - show object metadata

use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::utils::{format_optional_datetime, format_size};
use anyhow::{Context, Result};
use colored::Colorize;

pub async fn execute(ctx: &CommandContext, path: &str) -> Result<()> {
    let client = ctx.client()?;
    let uri = ObjectUri::parse(path)?;
    let key = uri.object_key()?;

    let stat = client
        .stat_object(&uri.bucket, key)
        .await
        .with_context(|| format!("Failed to stat {}", uri))?;

    if ctx.is_json() {
        return ctx.print_json(&stat);
    }

    println!("{:<14} {}", "Name:".bold(), uri);
    println!(
        "{:<14} {} ({})",
        "Size:".bold(),
        format_size(stat.size, true),
        stat.size
    );
    println!("{:<14} {}", "ETag:".bold(), stat.etag);
    println!(
        "{:<14} {}",
        "Modified:".bold(),
        format_optional_datetime(stat.last_modified.as_ref()).trim()
    );
    println!(
        "{:<14} {}",
        "Content-Type:".bold(),
        stat.content_type.as_deref().unwrap_or("-")
    );
    if !stat.metadata.is_empty() {
        println!("{}", "Metadata:".bold());
        for (name, value) in &stat.metadata {
            println!("  {}: {}", name.cyan(), value);
        }
    }

    Ok(())
}
