use async_trait::async_trait;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use super::RandomAccessSource;
use crate::error::{BoxError, SourceError};

/// Minimal client for an endpoint that only offers a length probe and
/// byte-range fetches (blob storage over HTTP, for instance).
#[async_trait]
pub trait RangeTransport: Send + Sync {
    /// Metadata-only probe returning the total length.
    async fn content_length(&self) -> Result<u64, BoxError>;

    /// Fetch the bytes in `[start, end)`.
    async fn fetch_range(&self, start: u64, end: u64) -> Result<Vec<u8>, BoxError>;
}

/// Source backed by a [`RangeTransport`].
///
/// The length is probed once and remembered; every `slice()` issues one
/// ranged fetch. Wrap it in a [`ReadAheadSource`](super::ReadAheadSource) to avoid
/// paying a round trip per byte.
pub struct RemoteSource<T: RangeTransport> {
    transport: T,
    length: OnceLock<u64>,
    requests: AtomicU64,
    transferred_bytes: AtomicU64,
}

impl<T: RangeTransport> RemoteSource<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            length: OnceLock::new(),
            requests: AtomicU64::new(0),
            transferred_bytes: AtomicU64::new(0),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of probes and ranged fetches issued so far.
    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    /// Get total payload bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<T: RangeTransport> RandomAccessSource for RemoteSource<T> {
    async fn length(&self) -> Result<u64, SourceError> {
        if let Some(&length) = self.length.get() {
            return Ok(length);
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        log::debug!("probing remote length");
        let length = self
            .transport
            .content_length()
            .await
            .map_err(|source| SourceError::Transport {
                range: None,
                source,
            })?;
        Ok(*self.length.get_or_init(|| length))
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
        if start > end {
            let length = self.length().await?;
            return Err(SourceError::OutOfBounds { start, end, length });
        }
        if start == end {
            return Ok(Vec::new());
        }

        self.requests.fetch_add(1, Ordering::Relaxed);
        log::debug!("fetching bytes {}..{}", start, end);

        let data = self
            .transport
            .fetch_range(start, end)
            .await
            .map_err(|source| SourceError::Transport {
                range: Some(start..end),
                source,
            })?;

        if data.len() as u64 != end - start {
            return Err(SourceError::Transport {
                range: Some(start..end),
                source: format!("expected {} bytes, got {}", end - start, data.len()).into(),
            });
        }

        self.transferred_bytes
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(data)
    }
}
