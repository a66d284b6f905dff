use async_trait::async_trait;
use std::sync::OnceLock;

use super::{RandomAccessSource, check_range};
use crate::error::SourceError;

/// A single prefetched span of the inner source.
struct Window {
    start: u64,
    data: Vec<u8>,
}

impl Window {
    fn end(&self) -> u64 {
        self.start + self.data.len() as u64
    }

    fn get(&self, start: u64, end: u64) -> Option<&[u8]> {
        if start >= self.start && end <= self.end() && start <= end {
            let lo = (start - self.start) as usize;
            let hi = (end - self.start) as usize;
            Some(&self.data[lo..hi])
        } else {
            None
        }
    }
}

/// Read-ahead layer over another source.
///
/// Holds at most one window filled by [`prefetch`](Self::prefetch) with a
/// single ranged read. Reads inside the window are answered from memory,
/// everything else goes to the inner source. The length is probed once.
pub struct ReadAheadSource<S> {
    inner: S,
    length: OnceLock<u64>,
    window: Option<Window>,
}

impl<S: RandomAccessSource> ReadAheadSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            length: OnceLock::new(),
            window: None,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }

    /// Whether `[start, end)` is already cached.
    pub fn contains(&self, start: u64, end: u64) -> bool {
        self.window
            .as_ref()
            .is_some_and(|w| w.get(start, end).is_some())
    }

    /// Replaces the window with `[start, end)` fetched in one read. A span
    /// already covered by the window costs nothing.
    pub async fn prefetch(&mut self, start: u64, end: u64) -> Result<(), SourceError> {
        if self.contains(start, end) {
            return Ok(());
        }
        let length = self.length().await?;
        check_range(start, end, length)?;

        log::debug!("read-ahead window {}..{}", start, end);
        let data = self.inner.slice(start, end).await?;
        self.window = Some(Window { start, data });
        Ok(())
    }

    /// Drops the cached window.
    pub fn clear(&mut self) {
        self.window = None;
    }

    fn cached(&self, start: u64, end: u64) -> Option<&[u8]> {
        self.window.as_ref().and_then(|w| w.get(start, end))
    }
}

#[async_trait]
impl<S: RandomAccessSource> RandomAccessSource for ReadAheadSource<S> {
    async fn length(&self) -> Result<u64, SourceError> {
        if let Some(length) = self.length.get() {
            return Ok(*length);
        }
        let length = self.inner.length().await?;
        Ok(*self.length.get_or_init(|| length))
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
        match self.cached(start, end) {
            Some(bytes) => Ok(bytes.to_vec()),
            None => self.inner.slice(start, end).await,
        }
    }

    async fn read_byte(&self, offset: u64) -> Result<u8, SourceError> {
        match self.cached(offset, offset + 1) {
            Some(bytes) => Ok(bytes[0]),
            None => self.inner.read_byte(offset).await,
        }
    }

    async fn read_u32_le(&self, offset: u64) -> Result<u32, SourceError> {
        match self.cached(offset, offset + 4) {
            Some(b) => Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]])),
            None => self.inner.read_u32_le(offset).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferSource;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Buffer source that counts calls reaching it.
    struct Counting {
        inner: BufferSource,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RandomAccessSource for Counting {
        async fn length(&self) -> Result<u64, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.length().await
        }

        async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.slice(start, end).await
        }
    }

    fn counting(data: Vec<u8>) -> (ReadAheadSource<Counting>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let source = Counting {
            inner: BufferSource::new(data),
            calls: calls.clone(),
        };
        (ReadAheadSource::new(source), calls)
    }

    #[tokio::test]
    async fn serves_window_from_memory() {
        let data: Vec<u8> = (0..=255).collect();
        let (mut cache, calls) = counting(data);

        cache.prefetch(100, 200).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        for i in 100..196 {
            assert_eq!(cache.read_byte(i).await.unwrap(), i as u8);
        }
        assert_eq!(
            cache.read_u32_le(100).await.unwrap(),
            u32::from_le_bytes([100, 101, 102, 103])
        );
        assert_eq!(cache.slice(150, 152).await.unwrap(), vec![150, 151]);
        assert_eq!(cache.length().await.unwrap(), 256);
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // Straddles the window end, so it goes through.
        assert_eq!(cache.slice(198, 202).await.unwrap(), vec![198, 199, 200, 201]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn prefetch_inside_window_is_free() {
        let (mut cache, calls) = counting(vec![7u8; 64]);
        cache.prefetch(0, 64).await.unwrap();
        let before = calls.load(Ordering::SeqCst);
        cache.prefetch(10, 20).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), before);
        assert!(cache.contains(0, 64));

        cache.clear();
        assert!(!cache.contains(10, 20));
    }

    #[tokio::test]
    async fn prefetch_rejects_out_of_bounds() {
        let (mut cache, _) = counting(vec![0u8; 8]);
        assert!(matches!(
            cache.prefetch(4, 12).await,
            Err(SourceError::OutOfBounds { .. })
        ));
    }
}
