//! watch command - stream bucket notifications until interrupted

use super::CommandContext;
use crate::s3_client::ObjectUri;
use crate::utils::{format_optional_datetime, format_size};
use anyhow::{Context, Result};
use colored::Colorize;
use quiver_client::types::{NotificationEvent, NotificationRecord};
use tracing::debug;

fn requested_events(events: &[String]) -> Vec<NotificationEvent> {
    if events.is_empty() {
        return vec![
            NotificationEvent::ObjectCreatedAll,
            NotificationEvent::ObjectRemovedAll,
        ];
    }
    events.iter().map(|e| NotificationEvent::from(e.as_str())).collect()
}

pub async fn execute(
    ctx: &CommandContext,
    path: &str,
    suffix: &str,
    events: &[String],
) -> Result<()> {
    let client = ctx.client()?;
    let uri = ObjectUri::parse(path)?;
    if uri.bucket.is_empty() {
        anyhow::bail!("Bucket required: {}", path);
    }

    let events = requested_events(events);
    debug!(bucket = %uri.bucket, prefix = uri.key_or_empty(), suffix = suffix, "Listening");

    let mut listener = client
        .listen_bucket_notification(&uri.bucket, uri.key_or_empty(), suffix, &events)
        .context("Failed to start listening")?;

    ctx.info(&format!("Watching {} (Ctrl-C to stop)", uri));

    let result = loop {
        tokio::select! {
            record = listener.next() => match record {
                Some(Ok(record)) => print_record(ctx, &record)?,
                Some(Err(e)) => break Err(anyhow::Error::new(e).context("Notification stream failed")),
                None => break Ok(()),
            },
            _ = tokio::signal::ctrl_c() => break Ok(()),
        }
    };

    listener.stop();
    result
}

fn print_record(ctx: &CommandContext, record: &NotificationRecord) -> Result<()> {
    if ctx.is_json() {
        println!("{}", serde_json::to_string(record)?);
        return Ok(());
    }

    let event = record.event_name.trim_start_matches("s3:");
    let event = if event.starts_with("ObjectRemoved") {
        event.red()
    } else {
        event.green()
    };
    println!(
        "{} {:>12}  {}  {}",
        format_optional_datetime(record.event_time().as_ref()),
        format_size(record.s3.object.size, true),
        event,
        record.s3.object.key
    );
    Ok(())
}
