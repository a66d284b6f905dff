use async_trait::async_trait;

use super::{RandomAccessSource, check_range};
use crate::error::SourceError;

/// In-memory source. Every read completes immediately.
#[derive(Debug, Clone, Default)]
pub struct BufferSource {
    data: Vec<u8>,
}

impl BufferSource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, start: u64, end: u64) -> Result<&[u8], SourceError> {
        check_range(start, end, self.data.len() as u64)?;
        Ok(&self.data[start as usize..end as usize])
    }
}

impl From<Vec<u8>> for BufferSource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

#[async_trait]
impl RandomAccessSource for BufferSource {
    async fn length(&self) -> Result<u64, SourceError> {
        Ok(self.data.len() as u64)
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
        Ok(self.range(start, end)?.to_vec())
    }

    async fn read_byte(&self, offset: u64) -> Result<u8, SourceError> {
        Ok(self.range(offset, offset + 1)?[0])
    }

    async fn read_u32_le(&self, offset: u64) -> Result<u32, SourceError> {
        let b = self.range(offset, offset + 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_within_bounds() {
        let source = BufferSource::new(vec![0x50, 0x4b, 0x05, 0x06, 0xff]);
        assert_eq!(source.length().await.unwrap(), 5);
        assert_eq!(source.read_byte(4).await.unwrap(), 0xff);
        assert_eq!(source.read_u32_le(0).await.unwrap(), 0x0605_4b50);
        assert_eq!(source.slice(1, 3).await.unwrap(), vec![0x4b, 0x05]);
        assert!(source.slice(2, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejects_out_of_bounds() {
        let source = BufferSource::new(vec![1, 2, 3]);
        let err = source.read_u32_le(0).await.unwrap_err();
        assert!(matches!(
            err,
            SourceError::OutOfBounds {
                start: 0,
                end: 4,
                length: 3
            }
        ));
        assert!(source.slice(2, 1).await.is_err());
    }
}
