//! Uploads and downloads
//!
//! Uploads larger than the part size go through multipart upload and resume
//! an earlier attempt on the same key: parts whose MD5 already matches the
//! stored part are skipped. Downloads to a file resume from a `.part.quiver`
//! file keyed by the object's ETag.

mod download;
mod upload;

use quiver_core::{Error, Result, MAX_OBJECT_SIZE, MAX_PARTS, PART_SIZE_STEP};
use tokio::io::{AsyncRead, AsyncReadExt};

pub use download::PART_FILE_SUFFIX;

/// Part size for an object of `size` bytes.
///
/// An explicitly configured part size is used as is and must cover the
/// object in at most 10000 parts. Otherwise the part size starts at `base`
/// and grows in 16 MiB steps until 10000 parts cover the object.
pub fn calculate_part_size(size: u64, base: u64, overridden: bool) -> Result<u64> {
    if size > MAX_OBJECT_SIZE {
        return Err(Error::InvalidArgument(format!(
            "object size {} exceeds the maximum of {} bytes",
            size, MAX_OBJECT_SIZE
        )));
    }
    if overridden {
        if base.saturating_mul(MAX_PARTS) < size {
            return Err(Error::InvalidArgument(format!(
                "object size {} needs more than {} parts of {} bytes",
                size, MAX_PARTS, base
            )));
        }
        return Ok(base);
    }

    let mut part_size = base;
    while part_size * MAX_PARTS <= size {
        part_size += PART_SIZE_STEP;
    }
    Ok(part_size)
}

/// Read up to `limit` bytes, stopping early only at end of stream
pub(crate) async fn read_chunk<R>(reader: &mut R, limit: u64) -> Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(limit.min(64 * 1024 * 1024) as usize);
    (&mut *reader).take(limit).read_to_end(&mut buf).await?;
    Ok(buf)
}

/// Consume the rest of the stream, returning how many bytes it held
pub(crate) async fn drain<R>(reader: &mut R) -> Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    Ok(tokio::io::copy(reader, &mut tokio::io::sink()).await?)
}
