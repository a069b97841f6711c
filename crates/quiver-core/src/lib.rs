//! Quiver Core Library
//!
//! Core types, configuration and naming rules shared by the Quiver
//! object-storage client crates.

pub mod config;
pub mod error;
pub mod types;
pub mod utils;

pub use config::ClientConfig;
pub use error::{Error, ErrorKind, Result, S3Error};

/// Quiver version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default S3 region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Maximum object size (5 TiB)
pub const MAX_OBJECT_SIZE: u64 = 5 * 1024 * 1024 * 1024 * 1024;

/// Maximum size of a single part (5 GiB)
pub const MAX_PART_SIZE: u64 = 5 * 1024 * 1024 * 1024;

/// Minimum part size (5 MiB)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Part size used when none is configured (64 MiB)
pub const DEFAULT_PART_SIZE: u64 = 64 * 1024 * 1024;

/// Increment applied while searching for an effective part size (16 MiB)
pub const PART_SIZE_STEP: u64 = 16 * 1024 * 1024;

/// Maximum number of parts in multipart upload
pub const MAX_PARTS: u64 = 10_000;

/// Maximum number of entries requested per listing page
pub const MAX_KEYS: u32 = 1000;

/// Maximum number of keys in one bulk delete request
pub const MAX_DELETE_OBJECTS: usize = 1000;

/// Maximum bucket name length
pub const MAX_BUCKET_NAME_LENGTH: usize = 63;

/// Minimum bucket name length
pub const MIN_BUCKET_NAME_LENGTH: usize = 3;

/// Maximum object key length
pub const MAX_KEY_LENGTH: usize = 1024;
