//! Serializing entries into a single ZIP buffer.
//!
//! Layout: every entry's local header, name, extra field and payload back
//! to back, then the central directory, then the end record and archive
//! comment. Entries are laid out by ascending lowercase name in both
//! modes, so the same entry set always produces the same bytes.

use tokio::task::JoinHandle;

use crate::error::{Result, ZipError};

use super::codec;
use super::entry::ZipEntry;
use super::structures::EndRecord;

/// Per-entry notifications from [`ArchiveWriter::write_pipelined`].
pub trait WriteProgress {
    /// Compression of `entry` is about to start.
    fn entry_started(&mut self, _entry: &ZipEntry) {}

    /// `entry` has been compressed; its sizes and crc are final.
    fn entry_finished(&mut self, _entry: &ZipEntry) {}
}

impl WriteProgress for () {}

/// Builds archive buffers from entry sets.
#[derive(Debug, Clone, Default)]
pub struct ArchiveWriter {
    comment: Vec<u8>,
}

impl ArchiveWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archive comment appended after the end record.
    pub fn with_comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        self.comment = comment.into();
        self
    }

    /// Compresses and lays out every entry in one pass.
    pub fn write(&self, mut entries: Vec<ZipEntry>) -> Result<Vec<u8>> {
        sort_for_write(&mut entries);

        let mut assembly = Assembly::default();
        for mut entry in entries {
            let compressed = codec::prepare(&mut entry)?;
            assembly.push(entry, compressed)?;
        }
        assembly.finish(&self.comment)
    }

    /// Same output as [`write`](Self::write), compressing one entry at a
    /// time on the blocking pool. The next entry's compression runs while
    /// the previous one is being laid out.
    pub async fn write_pipelined<P: WriteProgress>(
        &self,
        mut entries: Vec<ZipEntry>,
        progress: &mut P,
    ) -> Result<Vec<u8>> {
        sort_for_write(&mut entries);
        // Popping from the end must yield the same order as `write`.
        entries.reverse();

        let mut assembly = Assembly::default();
        let mut in_flight = entries.pop().map(|e| spawn_prepare(e, &mut *progress));

        while let Some(task) = in_flight {
            let (entry, compressed) = task
                .await
                .map_err(|e| ZipError::Io(std::io::Error::other(e)))??;
            progress.entry_finished(&entry);

            in_flight = entries.pop().map(|e| spawn_prepare(e, &mut *progress));
            assembly.push(entry, compressed)?;
        }

        assembly.finish(&self.comment)
    }
}

/// Stable ascending sort by lowercase name.
fn sort_for_write(entries: &mut [ZipEntry]) {
    entries.sort_by_cached_key(|e| e.name.to_ascii_lowercase());
}

fn spawn_prepare<P: WriteProgress>(
    entry: ZipEntry,
    progress: &mut P,
) -> JoinHandle<Result<(ZipEntry, Vec<u8>)>> {
    progress.entry_started(&entry);
    tokio::task::spawn_blocking(move || {
        let mut entry = entry;
        let compressed = codec::prepare(&mut entry)?;
        Ok((entry, compressed))
    })
}

/// Output under construction: data block parts plus central directory.
#[derive(Default)]
struct Assembly {
    data_block: Vec<Vec<u8>>,
    data_len: u64,
    central: Vec<u8>,
    count: usize,
}

impl Assembly {
    fn push(&mut self, mut entry: ZipEntry, compressed: Vec<u8>) -> Result<()> {
        entry.local_header_offset =
            u32::try_from(self.data_len).map_err(|_| ZipError::CapacityExceeded("archive size"))?;

        let local = entry.local_header().encode(&entry.name, &entry.extra_field)?;
        let central = entry
            .central_header()
            .encode(&entry.name, &entry.extra_field, &entry.comment)?;

        self.data_len += (local.len() + compressed.len()) as u64;
        self.data_block.push(local);
        self.data_block.push(compressed);
        self.central.extend_from_slice(&central);
        self.count += 1;
        Ok(())
    }

    fn finish(self, comment: &[u8]) -> Result<Vec<u8>> {
        let count =
            u16::try_from(self.count).map_err(|_| ZipError::CapacityExceeded("entry count"))?;
        let cd_offset =
            u32::try_from(self.data_len).map_err(|_| ZipError::CapacityExceeded("archive size"))?;
        let cd_size = u32::try_from(self.central.len())
            .map_err(|_| ZipError::CapacityExceeded("central directory size"))?;

        let end = EndRecord {
            disk_entries: count,
            entry_count: count,
            cd_size,
            cd_offset,
            ..EndRecord::default()
        }
        .encode(comment)?;

        let total = self.data_len as usize + self.central.len() + end.len();
        let mut out = Vec::with_capacity(total);
        for part in &self.data_block {
            out.extend_from_slice(part);
        }
        out.extend_from_slice(&self.central);
        out.extend_from_slice(&end);
        debug_assert_eq!(out.len(), total);

        log::debug!("wrote {} entries, {} bytes", count, total);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::structures::{CentralHeader, CompressionMethod, LocalHeader};

    fn sample() -> Vec<ZipEntry> {
        vec![
            ZipEntry::new("b/", Vec::new()),
            ZipEntry::new("a.txt", b"hello".to_vec()).with_method(CompressionMethod::Stored),
        ]
    }

    #[test]
    fn layout_is_exact() {
        let out = ArchiveWriter::new().write(sample()).unwrap();

        // a.txt comes first: 30 + 5 name + 5 payload
        let local = LocalHeader::from_bytes(&out).unwrap();
        assert_eq!(local.name_length, 5);
        assert_eq!(&out[30..35], b"a.txt");
        assert_eq!(&out[35..40], b"hello");
        // then b/: 30 + 2 name + 0 payload
        assert_eq!(&out[40..44], b"PK\x03\x04");
        let cd_offset = 72;
        let first = CentralHeader::from_bytes(&out[cd_offset..]).unwrap();
        assert_eq!(first.local_header_offset, 0);
        let second = CentralHeader::from_bytes(&out[cd_offset + 51..]).unwrap();
        assert_eq!(second.local_header_offset, 40);

        let end = EndRecord::from_bytes(&out[out.len() - 22..]).unwrap();
        assert_eq!(end.entry_count, 2);
        assert_eq!(end.cd_offset, 72);
        assert_eq!(end.cd_size, 51 + 48);
        assert_eq!(out.len(), 72 + 99 + 22);
    }

    #[test]
    fn comment_is_appended() {
        let out = ArchiveWriter::new()
            .with_comment("built by tests")
            .write(sample())
            .unwrap();
        assert!(out.ends_with(b"built by tests"));
        let end = EndRecord::from_bytes(&out[out.len() - 36..]).unwrap();
        assert_eq!(end.comment_length, 14);
    }

    #[test]
    fn empty_archive_is_just_an_end_record() {
        let out = ArchiveWriter::new().write(Vec::new()).unwrap();
        assert_eq!(out.len(), 22);
        assert_eq!(EndRecord::from_bytes(&out).unwrap().entry_count, 0);
    }

    #[test]
    fn codec_failure_aborts_the_write() {
        let mut entries = sample();
        entries.push(
            ZipEntry::new("c.bin", b"data".to_vec()).with_method(CompressionMethod::Unknown(99)),
        );
        assert!(matches!(
            ArchiveWriter::new().write(entries),
            Err(ZipError::UnsupportedCompressionMethod(99))
        ));
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl WriteProgress for Recorder {
        fn entry_started(&mut self, entry: &ZipEntry) {
            self.events.push(format!("start {}", entry.name_lossy()));
        }

        fn entry_finished(&mut self, entry: &ZipEntry) {
            self.events.push(format!("end {}", entry.name_lossy()));
        }
    }

    #[tokio::test]
    async fn pipelined_matches_bulk() {
        let entries = vec![
            ZipEntry::new("Zeta.txt", b"zzz".repeat(50)),
            ZipEntry::new("alpha/", Vec::new()),
            ZipEntry::new("alpha/one.txt", b"one".to_vec()),
            ZipEntry::new("A.TXT", b"upper".to_vec()),
            ZipEntry::new("a.txt", b"lower".to_vec()),
        ];
        let writer = ArchiveWriter::new().with_comment("c");
        let bulk = writer.write(entries.clone()).unwrap();

        let mut recorder = Recorder::default();
        let piped = writer.write_pipelined(entries, &mut recorder).await.unwrap();
        assert_eq!(bulk, piped);

        assert_eq!(recorder.events.len(), 10);
        assert_eq!(recorder.events[0], "start A.TXT");
        assert_eq!(recorder.events[1], "end A.TXT");
        assert_eq!(recorder.events[2], "start a.txt");
        assert_eq!(recorder.events.last().unwrap(), "end Zeta.txt");
    }

    #[tokio::test]
    async fn pipelined_codec_failure_aborts() {
        let entries = vec![
            ZipEntry::new("a", b"x".to_vec()),
            ZipEntry::new("b", b"y".to_vec()).with_method(CompressionMethod::Unknown(7)),
            ZipEntry::new("c", b"z".to_vec()),
        ];
        let result = ArchiveWriter::new().write_pipelined(entries, &mut ()).await;
        assert!(matches!(result, Err(ZipError::UnsupportedCompressionMethod(7))));
    }
}
