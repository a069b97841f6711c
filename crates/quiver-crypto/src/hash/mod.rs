//! Hash utilities

use base64::{engine::general_purpose::STANDARD, Engine};
use digest::Digest;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha2::Sha256;

/// SHA-256 of the empty string
pub const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

pub fn md5_base64(data: &[u8]) -> String {
    STANDARD.encode(Md5::digest(data))
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

pub fn hmac_sha256_hex(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Calculate multipart upload ETag
/// Format: MD5(concat(part_md5s))-part_count
pub fn multipart_etag(part_etags: &[String]) -> String {
    let mut hasher = Md5::new();

    for etag in part_etags {
        let clean = etag.trim_matches('"');
        if let Ok(bytes) = hex::decode(clean) {
            hasher.update(&bytes);
        }
    }

    format!("{}-{}", hex::encode(hasher.finalize()), part_etags.len())
}

/// Digests produced by [`HashSummer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Digests {
    pub md5: [u8; 16],
    pub sha256: Option<[u8; 32]>,
    pub len: u64,
}

impl Digests {
    pub fn md5_hex(&self) -> String {
        hex::encode(self.md5)
    }

    pub fn md5_base64(&self) -> String {
        STANDARD.encode(self.md5)
    }

    pub fn sha256_hex(&self) -> Option<String> {
        self.sha256.map(hex::encode)
    }
}

/// Computes MD5 and, optionally, SHA-256 over a stream in a single pass
pub struct HashSummer {
    md5: Md5,
    sha256: Option<Sha256>,
    len: u64,
}

impl HashSummer {
    pub fn new(with_sha256: bool) -> Self {
        Self {
            md5: Md5::new(),
            sha256: with_sha256.then(Sha256::new),
            len: 0,
        }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.md5.update(chunk);
        if let Some(sha) = self.sha256.as_mut() {
            sha.update(chunk);
        }
        self.len += chunk.len() as u64;
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn finalize(self) -> Digests {
        Digests {
            md5: self.md5.finalize().into(),
            sha256: self.sha256.map(|sha| sha.finalize().into()),
            len: self.len,
        }
    }
}
