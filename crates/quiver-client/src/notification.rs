//! Bucket notification configuration and event listening

use http::Method;
use quiver_core::types::{NotificationConfiguration, NotificationEvent, NotificationMessage, NotificationRecord};
use quiver_core::utils::{uri_escape, validate_bucket_name};
use quiver_core::Result;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::client::Client;
use crate::request::S3Request;
use crate::xml;

/// Pause before reconnecting after a poll that delivered nothing
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

const LISTENER_BUFFER: usize = 256;

/// Receives records from a background listening task.
///
/// The task stops on the first error, on [`stop`](Self::stop) or when the
/// listener is dropped.
pub struct NotificationListener {
    records: mpsc::Receiver<Result<NotificationRecord>>,
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl NotificationListener {
    /// Next record; `None` once the listener has stopped
    pub async fn next(&mut self) -> Option<Result<NotificationRecord>> {
        self.records.recv().await
    }

    pub fn stop(&self) {
        let _ = self.stop.send(true);
        self.task.abort();
    }
}

impl Drop for NotificationListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_query(prefix: &str, suffix: &str, events: &[NotificationEvent]) -> String {
    let mut pairs: Vec<(&str, String)> = events
        .iter()
        .map(|e| ("events", uri_escape(e.as_str())))
        .collect();
    pairs.push(("prefix", uri_escape(prefix)));
    pairs.push(("suffix", uri_escape(suffix)));
    pairs.sort();
    pairs
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&")
}

impl Client {
    pub async fn get_bucket_notification(&self, bucket: &str) -> Result<NotificationConfiguration> {
        let response = self
            .execute(S3Request::new(Method::GET).bucket(bucket).query("notification"))
            .await?;
        xml::parse_notification_configuration(&response.body.text().await?)
    }

    pub async fn set_bucket_notification(
        &self,
        bucket: &str,
        config: &NotificationConfiguration,
    ) -> Result<()> {
        let request = S3Request::new(Method::PUT)
            .bucket(bucket)
            .query("notification")
            .body(xml::notification_configuration(config));
        self.execute(request).await?;
        Ok(())
    }

    pub async fn remove_all_bucket_notification(&self, bucket: &str) -> Result<()> {
        self.set_bucket_notification(bucket, &NotificationConfiguration::default())
            .await
    }

    /// Stream object events on `bucket` whose keys match `prefix` and `suffix`
    pub fn listen_bucket_notification(
        &self,
        bucket: &str,
        prefix: &str,
        suffix: &str,
        events: &[NotificationEvent],
    ) -> Result<NotificationListener> {
        validate_bucket_name(bucket)?;

        let (tx, records) = mpsc::channel(LISTENER_BUFFER);
        let (stop, mut stopped) = watch::channel(false);

        let client = self.clone();
        let bucket = bucket.to_string();
        let query = listen_query(prefix, suffix, events);

        let task = tokio::spawn(async move {
            loop {
                if *stopped.borrow() {
                    break;
                }

                let delivered = match client.poll_notifications(&bucket, &query, &tx).await {
                    Ok(delivered) => delivered,
                    Err(err) => {
                        warn!(bucket = %bucket, error = %err, "Notification listener failed");
                        let _ = tx.send(Err(err)).await;
                        break;
                    }
                };
                if tx.is_closed() {
                    break;
                }

                if delivered == 0 {
                    tokio::select! {
                        _ = stopped.changed() => {}
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                } else {
                    tokio::task::yield_now().await;
                }
            }
            debug!(bucket = %bucket, "Notification listener stopped");
        });

        Ok(NotificationListener { records, stop, task })
    }

    /// One listening request; returns how many records were forwarded
    async fn poll_notifications(
        &self,
        bucket: &str,
        query: &str,
        tx: &mpsc::Sender<Result<NotificationRecord>>,
    ) -> Result<usize> {
        let response = self
            .execute(S3Request::new(Method::GET).bucket(bucket).query(query))
            .await?;

        let mut lines = BufReader::new(response.body.into_async_read()).lines();
        let mut delivered = 0;
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            // keep-alive padding
            if line.is_empty() {
                continue;
            }
            let message: NotificationMessage = serde_json::from_str(line)?;
            for record in message.records {
                if tx.send(Ok(record)).await.is_err() {
                    return Ok(delivered);
                }
                delivered += 1;
            }
        }
        Ok(delivered)
    }
}
