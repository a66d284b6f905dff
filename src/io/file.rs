use async_trait::async_trait;
use std::path::Path;

use super::{RandomAccessSource, check_range};
use crate::error::SourceError;

/// Local file read with positional reads, no seeking.
pub struct FileSource {
    file: std::fs::File,
    size: u64,
}

impl FileSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = std::fs::File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self { file, size })
    }

    #[cfg(unix)]
    fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> std::io::Result<()> {
        use std::os::unix::fs::FileExt;
        self.file.read_exact_at(buf, offset)
    }

    #[cfg(windows)]
    fn read_exact_at(&self, mut buf: &mut [u8], mut offset: u64) -> std::io::Result<()> {
        use std::os::windows::fs::FileExt;
        while !buf.is_empty() {
            match self.file.seek_read(buf, offset)? {
                0 => return Err(std::io::ErrorKind::UnexpectedEof.into()),
                n => {
                    buf = &mut buf[n..];
                    offset += n as u64;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RandomAccessSource for FileSource {
    async fn length(&self) -> Result<u64, SourceError> {
        Ok(self.size)
    }

    async fn slice(&self, start: u64, end: u64) -> Result<Vec<u8>, SourceError> {
        check_range(start, end, self.size)?;
        let mut buf = vec![0u8; (end - start) as usize];
        self.read_exact_at(&mut buf, start)?;
        Ok(buf)
    }
}
