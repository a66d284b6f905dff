//! The archive object: a source, its decoded end record and the entry table.

use std::path::Path;

use crate::error::{Result, ZipError};
use crate::io::{
    BufferSource, FileSource, HttpConfig, HttpTransport, RandomAccessSource, ReadAheadSource,
    RemoteSource,
};

use super::codec;
use super::entry::{EntryPayload, EntryTable, ZipEntry};
use super::locator::{locate_end_record, scan_window};
use super::reader::{central_directory_span, read_central_directory};
use super::structures::{EndRecord, LocalHeader};
use super::writer::{ArchiveWriter, WriteProgress};

/// A ZIP archive backed by a [`RandomAccessSource`].
///
/// Opening reads the end record and the whole central directory; entry
/// payloads stay in the source until they are read or the archive is
/// written out again.
///
/// ## Example
///
/// ```no_run
/// use rangezip::ZipArchive;
///
/// # async fn demo() -> rangezip::Result<()> {
/// let mut archive = ZipArchive::new();
/// archive.add_file("a.txt", b"hello".to_vec());
/// archive.add_directory("b/");
/// let bytes = archive.to_bytes().await?;
///
/// let reopened = ZipArchive::open_bytes(bytes).await?;
/// assert_eq!(reopened.read_entry("a.txt").await?, b"hello");
/// # Ok(())
/// # }
/// ```
pub struct ZipArchive<S: RandomAccessSource> {
    source: ReadAheadSource<S>,
    end_record: EndRecord,
    comment: Vec<u8>,
    entries: EntryTable,
}

impl ZipArchive<BufferSource> {
    /// An empty archive with nothing behind it.
    pub fn new() -> Self {
        Self {
            source: ReadAheadSource::new(BufferSource::default()),
            end_record: EndRecord::default(),
            comment: Vec::new(),
            entries: EntryTable::new(),
        }
    }

    pub async fn open_bytes(data: Vec<u8>) -> Result<Self> {
        Self::open(BufferSource::new(data)).await
    }
}

impl Default for ZipArchive<BufferSource> {
    fn default() -> Self {
        Self::new()
    }
}

impl ZipArchive<FileSource> {
    pub async fn open_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(FileSource::open(path.as_ref())?).await
    }
}

impl ZipArchive<RemoteSource<HttpTransport>> {
    /// Opens an archive served over HTTP with Range support.
    pub async fn open_url(url: impl Into<String>, config: &HttpConfig) -> Result<Self> {
        let transport = HttpTransport::with_config(url.into(), config).map_err(|source| {
            ZipError::Source(crate::error::SourceError::Transport {
                range: None,
                source,
            })
        })?;
        Self::open(RemoteSource::new(transport)).await
    }
}

impl<S: RandomAccessSource> ZipArchive<S> {
    /// Locates the end record and decodes the central directory.
    ///
    /// The tail of the source is fetched in one read for the end record
    /// scan, and the directory span in one more when the tail does not
    /// already cover it. Any failure discards everything read so far.
    pub async fn open(source: S) -> Result<Self> {
        let mut source = ReadAheadSource::new(source);

        let length = source.length().await?;
        let tail = scan_window(length);
        source.prefetch(tail.start, tail.end).await?;
        let end = locate_end_record(&source).await?;

        let span = central_directory_span(&end)?;
        source.prefetch(span.start, span.end).await?;
        let decoded = read_central_directory(&source, &end).await?;

        log::debug!(
            "opened archive: {} bytes, {} entries, directory at {}",
            length,
            decoded.len(),
            span.start
        );

        Ok(Self {
            source,
            end_record: end.record,
            comment: end.comment,
            entries: decoded.into_iter().collect(),
        })
    }

    /// The source the archive was opened from.
    pub fn source(&self) -> &S {
        self.source.inner()
    }

    /// End record as decoded when the archive was opened.
    pub fn end_record(&self) -> &EndRecord {
        &self.end_record
    }

    pub fn comment(&self) -> &[u8] {
        &self.comment
    }

    pub fn set_comment(&mut self, comment: impl Into<Vec<u8>>) {
        self.comment = comment.into();
    }

    pub fn entries(&self) -> &EntryTable {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_entry(&self, name: impl AsRef<[u8]>) -> Option<&ZipEntry> {
        self.entries.get(name.as_ref())
    }

    /// Like [`get_entry`](Self::get_entry) but fails with `EntryNotFound`.
    pub fn entry(&self, name: impl AsRef<[u8]>) -> Result<&ZipEntry> {
        let name = name.as_ref();
        self.entries
            .get(name)
            .ok_or_else(|| ZipError::EntryNotFound(String::from_utf8_lossy(name).into_owned()))
    }

    /// Adds `entry`, replacing any entry of the same name.
    pub fn add_entry(&mut self, entry: ZipEntry) -> Option<ZipEntry> {
        self.entries.insert(entry)
    }

    pub fn add_file(&mut self, name: impl Into<Vec<u8>>, data: Vec<u8>) -> Option<ZipEntry> {
        self.add_entry(ZipEntry::new(name, data))
    }

    pub fn add_directory(&mut self, name: impl Into<Vec<u8>>) -> Option<ZipEntry> {
        self.add_entry(ZipEntry::directory(name))
    }

    /// Removes an entry. Removing a directory also removes everything
    /// below it.
    pub fn delete_entry(&mut self, name: impl AsRef<[u8]>) -> Result<()> {
        let entry = self.entry(name)?;
        let doomed: Vec<Vec<u8>> = if entry.is_directory() {
            self.entries
                .with_prefix(&entry.name)
                .map(|e| e.name.clone())
                .collect()
        } else {
            vec![entry.name.clone()]
        };
        for name in doomed {
            self.entries.remove(&name);
        }
        Ok(())
    }

    /// Removes only the named entry. Entries below a directory stay.
    pub fn remove_entry(&mut self, name: impl AsRef<[u8]>) -> Option<ZipEntry> {
        self.entries.remove(name.as_ref())
    }

    /// The directory itself and everything below it; empty for files.
    pub fn entry_children(&self, entry: &ZipEntry) -> Vec<&ZipEntry> {
        if !entry.is_directory() {
            return Vec::new();
        }
        self.entries.with_prefix(&entry.name).collect()
    }

    /// Payload bytes exactly as stored (still compressed).
    pub async fn read_compressed(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        match &entry.payload {
            EntryPayload::Compressed(bytes) => Ok(bytes.clone()),
            EntryPayload::Raw(data) => codec::compress(entry.compression_method, data),
            EntryPayload::Archived => {
                let start = self.data_offset(entry).await?;
                let end = start + entry.compressed_size as u64;
                Ok(self.source.slice(start, end).await?)
            }
        }
    }

    /// Decompressed contents of `entry`, checked against its size and CRC.
    pub async fn read(&self, entry: &ZipEntry) -> Result<Vec<u8>> {
        if let EntryPayload::Raw(data) = &entry.payload {
            return Ok(data.clone());
        }

        let compressed = self.read_compressed(entry).await?;
        let data = codec::decompress(
            entry.compression_method,
            &compressed,
            entry.uncompressed_size as usize,
        )?;

        if data.len() as u64 != entry.uncompressed_size as u64 {
            return Err(ZipError::Decompression(format!(
                "{}: expected {} bytes, got {}",
                entry.name_lossy(),
                entry.uncompressed_size,
                data.len()
            )));
        }
        let actual = codec::crc32(&data);
        if actual != entry.crc32 {
            return Err(ZipError::CrcMismatch {
                name: entry.name_lossy(),
                expected: entry.crc32,
                actual,
            });
        }
        Ok(data)
    }

    pub async fn read_entry(&self, name: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let entry = self.entry(name)?;
        self.read(entry).await
    }

    /// Offset of the payload, found through the entry's local header.
    ///
    /// The local name and extra field may differ in length from the
    /// central directory copy, so the header has to be read.
    async fn data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let offset = entry.local_header_offset as u64;
        let raw = self
            .source
            .slice(offset, offset + LocalHeader::SIZE as u64)
            .await?;
        let header = LocalHeader::from_bytes(&raw)?;
        Ok(offset + header.record_size())
    }

    /// Copies of all entries with their payloads loaded, ready for the
    /// writer. Archived payloads are copied without recompression.
    async fn materialize(&self) -> Result<Vec<ZipEntry>> {
        let mut out = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let mut copy = entry.clone();
            if copy.payload == EntryPayload::Archived {
                copy.payload = EntryPayload::Compressed(self.read_compressed(entry).await?);
            }
            out.push(copy);
        }
        Ok(out)
    }

    fn writer(&self) -> ArchiveWriter {
        ArchiveWriter::new().with_comment(self.comment.clone())
    }

    /// Serializes the whole archive into one buffer.
    pub async fn to_bytes(&self) -> Result<Vec<u8>> {
        let entries = self.materialize().await?;
        self.writer().write(entries)
    }

    /// Serializes the archive entry by entry, reporting to `progress`.
    pub async fn to_bytes_pipelined<P: WriteProgress>(&self, progress: &mut P) -> Result<Vec<u8>> {
        let entries = self.materialize().await?;
        self.writer().write_pipelined(entries, progress).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::structures::CompressionMethod;

    async fn sample() -> ZipArchive<BufferSource> {
        let mut archive = ZipArchive::new();
        archive.add_file("a.txt", b"hello".to_vec());
        archive.add_directory("b/");
        archive.add_file("b/c.txt", b"nested file ".repeat(10));
        archive.add_directory("b/d/");
        archive.add_file("b/d/e.txt", Vec::new());
        archive.set_comment("sample");
        ZipArchive::open_bytes(archive.to_bytes().await.unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn reads_back_written_entries() {
        let archive = sample().await;
        assert_eq!(archive.len(), 5);
        assert_eq!(archive.end_record().entry_count, 5);
        assert_eq!(archive.comment(), b"sample");
        assert_eq!(archive.read_entry("a.txt").await.unwrap(), b"hello");
        assert_eq!(
            archive.read_entry("b/c.txt").await.unwrap(),
            b"nested file ".repeat(10)
        );
        assert!(archive.read_entry("b/d/e.txt").await.unwrap().is_empty());
        assert_eq!(
            archive.entry("b/c.txt").unwrap().compression_method,
            CompressionMethod::Deflate
        );
    }

    #[tokio::test]
    async fn missing_entry() {
        let archive = sample().await;
        assert!(archive.get_entry("nope").is_none());
        assert!(matches!(
            archive.read_entry("nope").await,
            Err(ZipError::EntryNotFound(name)) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn directory_children_and_delete() {
        let mut archive = sample().await;
        let dir = archive.entry("b/").unwrap().clone();
        let children: Vec<_> = archive
            .entry_children(&dir)
            .into_iter()
            .map(|e| e.name_lossy())
            .collect();
        assert_eq!(children, vec!["b/", "b/c.txt", "b/d/", "b/d/e.txt"]);

        let file = archive.entry("a.txt").unwrap().clone();
        assert!(archive.entry_children(&file).is_empty());

        archive.delete_entry("b/d/").unwrap();
        assert_eq!(archive.len(), 3);
        archive.delete_entry("b/").unwrap();
        assert_eq!(archive.len(), 1);
        assert!(matches!(
            archive.delete_entry("b/"),
            Err(ZipError::EntryNotFound(_))
        ));
    }

    #[tokio::test]
    async fn remove_entry_leaves_children() {
        let mut archive = sample().await;
        assert!(archive.remove_entry("b/").is_some());
        assert!(archive.remove_entry("b/").is_none());
        assert_eq!(archive.len(), 4);
        assert!(archive.get_entry("b/c.txt").is_some());
        assert!(archive.get_entry("b/d/e.txt").is_some());
    }

    #[tokio::test]
    async fn corrupted_payload_fails_crc() {
        let mut archive = ZipArchive::new();
        archive.add_entry(
            ZipEntry::new("a.txt", b"hello".to_vec()).with_method(CompressionMethod::Stored),
        );
        let mut bytes = archive.to_bytes().await.unwrap();
        // payload starts after the 30 byte header and 5 byte name
        bytes[35] = b'j';
        let archive = ZipArchive::open_bytes(bytes).await.unwrap();
        assert!(matches!(
            archive.read_entry("a.txt").await,
            Err(ZipError::CrcMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn rewrite_preserves_archived_payloads() {
        let mut archive = sample().await;
        archive.add_file("z.txt", b"added later".to_vec());
        archive.delete_entry("a.txt").unwrap();

        let bytes = archive.to_bytes().await.unwrap();
        let reopened = ZipArchive::open_bytes(bytes).await.unwrap();
        assert_eq!(reopened.len(), 5);
        assert!(reopened.get_entry("a.txt").is_none());
        assert_eq!(reopened.read_entry("z.txt").await.unwrap(), b"added later");
        assert_eq!(
            reopened.read_entry("b/c.txt").await.unwrap(),
            b"nested file ".repeat(10)
        );
        assert_eq!(reopened.comment(), b"sample");
    }

    #[tokio::test]
    async fn new_archive_reads_raw_payloads() {
        let mut archive = ZipArchive::new();
        archive.add_file("x", b"raw".to_vec());
        assert_eq!(archive.read_entry("x").await.unwrap(), b"raw");
        let entry = archive.entry("x").unwrap().clone();
        let packed = archive.read_compressed(&entry).await.unwrap();
        assert_eq!(
            codec::decompress(CompressionMethod::Deflate, &packed, 3).unwrap(),
            b"raw"
        );
    }
}
