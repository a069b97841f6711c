//! Hashing and MAC helpers for Quiver
//!
//! Content checksums (MD5), payload digests (SHA-256) and the HMAC-SHA256
//! primitive used by request signing.

pub mod hash;

pub use hash::*;
