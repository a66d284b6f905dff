//! Random access over fixed-length byte sequences.
//!
//! Every archive operation reads through [`RandomAccessSource`]. The
//! implementations differ wildly in cost: [`BufferSource`] answers from
//! memory, while [`RemoteSource`] turns every call into a network round
//! trip. [`ReadAheadSource`] sits in between and serves small reads from a
//! single prefetched window.

mod buffer;
mod cache;
mod file;
mod http;
mod remote;

pub use buffer::BufferSource;
pub use cache::ReadAheadSource;
pub use file::FileSource;
pub use http::{HttpConfig, HttpTransport};
pub use remote::{RangeTransport, RemoteSource};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SourceError;

/// Read-only random access to a byte sequence of fixed length.
///
/// All methods may suspend and may fail. Callers must not assume that
/// consecutive small reads are coalesced unless the source says so.
#[async_trait]
pub trait RandomAccessSource: Send + Sync {
    /// Total length of the source in bytes.
    async fn length(&self) -> Result<u64, SourceError>;

    /// Bytes in `[start, end)`.
    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError>;

    /// Single byte at `offset`.
    async fn read_byte(&self, offset: u64) -> Result<u8, SourceError> {
        let bytes = self.slice(offset, offset + 1).await?;
        Ok(bytes[0])
    }

    /// Little-endian `u32` starting at `offset`.
    async fn read_u32_le(&self, offset: u64) -> Result<u32, SourceError> {
        let bytes = self.slice(offset, offset + 4).await?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

#[async_trait]
impl<S: RandomAccessSource + ?Sized> RandomAccessSource for Arc<S> {
    async fn length(&self) -> Result<u64, SourceError> {
        (**self).length().await
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
        (**self).slice(start, end).await
    }

    async fn read_byte(&self, offset: u64) -> Result<u8, SourceError> {
        (**self).read_byte(offset).await
    }

    async fn read_u32_le(&self, offset: u64) -> Result<u32, SourceError> {
        (**self).read_u32_le(offset).await
    }
}

/// Validates `[start, end)` against `length`.
pub(crate) fn check_range(start: u64, end: u64, length: u64) -> Result<(), SourceError> {
    if start > end || end > length {
        return Err(SourceError::OutOfBounds { start, end, length });
    }
    Ok(())
}
