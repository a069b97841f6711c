//! Quiver object storage client
//!
//! Async client for S3-compatible stores: bucket and object operations,
//! resumable multipart uploads and downloads, paginated listings as
//! streams, pre-signed URLs and POST policies, and bucket notifications.
//!
//! ```no_run
//! use quiver_client::{Client, ClientConfig};
//!
//! # async fn run() -> quiver_client::Result<()> {
//! let config = ClientConfig::new("play.min.io").with_credentials("access", "secret");
//! let client = Client::new(config)?;
//! client.fput_object("photos", "a.jpg", "/tmp/a.jpg", &Default::default()).await?;
//! # Ok(())
//! # }
//! ```

mod bucket;
mod client;
mod listing;
mod notification;
mod object;
mod presign;
mod region;
mod request;
mod transfer;
mod transport;
pub mod xml;

#[cfg(test)]
mod mock;

pub use client::{Client, ClientBuilder};
pub use notification::NotificationListener;
pub use region::{MemoryRegionCache, RegionCache};
pub use request::{Address, RequestBuilder, S3Request};
pub use transfer::{calculate_part_size, PART_FILE_SUFFIX};
pub use transport::{HttpTransport, ResponseBody, Transport, WireRequest, WireResponse};

pub use quiver_core::{types, ClientConfig, Error, ErrorKind, Result, S3Error};
