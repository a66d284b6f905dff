//! Walking the central directory.
//!
//! Entries are decoded one after the other in archive order. Nothing is
//! read concurrently; with a remote source that means one round trip per
//! read unless the directory span has been prefetched.

use crate::error::{Result, ZipError};
use crate::io::RandomAccessSource;

use super::entry::ZipEntry;
use super::locator::LocatedEnd;
use super::structures::CentralHeader;

/// Byte range of the central directory, validated against the end record.
///
/// The directory has to end at or before the end record; anything else is
/// a truncated or hostile archive.
pub fn central_directory_span(end: &LocatedEnd) -> Result<std::ops::Range<u64>> {
    let start = end.record.cd_offset as u64;
    let stop = start + end.record.cd_size as u64;
    if stop > end.offset {
        return Err(ZipError::malformed(format!(
            "central directory {}..{} overlaps the end record at {}",
            start, stop, end.offset
        )));
    }
    Ok(start..stop)
}

/// Decodes exactly `entry_count` central directory records.
///
/// Any bad record fails the whole read; no partial list is returned.
pub async fn read_central_directory<S: RandomAccessSource + ?Sized>(
    source: &S,
    end: &LocatedEnd,
) -> Result<Vec<ZipEntry>> {
    let span = central_directory_span(end)?;
    let count = end.record.entry_count as usize;
    let mut entries = Vec::with_capacity(count);
    let mut cursor = span.start;

    for index in 0..count {
        let fixed = source
            .slice(cursor, cursor + CentralHeader::SIZE as u64)
            .await?;
        let header = CentralHeader::from_bytes(&fixed)?;

        let record_end = cursor + header.record_size();
        if record_end > span.end {
            return Err(ZipError::malformed(format!(
                "entry {} runs past the central directory ({} > {})",
                index, record_end, span.end
            )));
        }

        let mut field = cursor + CentralHeader::SIZE as u64;
        let name = read_field(source, &mut field, header.name_length).await?;
        let extra = read_field(source, &mut field, header.extra_length).await?;
        let comment = read_field(source, &mut field, header.comment_length).await?;

        let entry = ZipEntry::from_central(&header, name, extra, comment);
        log::trace!("entry {}: {}", index, entry.name_lossy());
        entries.push(entry);

        cursor = record_end;
    }

    log::debug!("read {} central directory entries", entries.len());
    Ok(entries)
}

async fn read_field<S: RandomAccessSource + ?Sized>(
    source: &S,
    cursor: &mut u64,
    length: u16,
) -> Result<Vec<u8>> {
    if length == 0 {
        return Ok(Vec::new());
    }
    let start = *cursor;
    *cursor += length as u64;
    Ok(source.slice(start, *cursor).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::BufferSource;
    use crate::zip::structures::EndRecord;

    fn located(entry_count: u16, cd_offset: u32, cd_size: u32, offset: u64) -> LocatedEnd {
        LocatedEnd {
            offset,
            record: EndRecord {
                entry_count,
                disk_entries: entry_count,
                cd_offset,
                cd_size,
                ..EndRecord::default()
            },
            comment: Vec::new(),
        }
    }

    #[tokio::test]
    async fn decodes_each_record() {
        let mut data = Vec::new();
        let a = CentralHeader {
            method: 8,
            crc32: 42,
            compressed_size: 3,
            uncompressed_size: 10,
            ..CentralHeader::default()
        };
        data.extend(a.encode(b"dir/", b"", b"").unwrap());
        data.extend(a.encode(b"dir/file.bin", b"\x01\x02", b"note").unwrap());
        let size = data.len() as u32;

        let end = located(2, 0, size, size as u64);
        let entries = read_central_directory(&BufferSource::new(data), &end)
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_directory());
        assert_eq!(entries[1].name, b"dir/file.bin");
        assert_eq!(entries[1].extra_field, vec![1, 2]);
        assert_eq!(entries[1].comment, b"note");
        assert_eq!(entries[1].crc32, 42);
    }

    #[tokio::test]
    async fn bad_signature_aborts_everything() {
        let mut data = CentralHeader::default().encode(b"a", b"", b"").unwrap();
        data.extend(vec![0u8; 47]);
        let end = located(2, 0, data.len() as u32, data.len() as u64);
        assert!(matches!(
            read_central_directory(&BufferSource::new(data), &end).await,
            Err(ZipError::MalformedArchive(_))
        ));
    }

    #[tokio::test]
    async fn directory_overlapping_end_record_is_rejected() {
        let end = located(1, 10, 100, 50);
        assert!(matches!(
            read_central_directory(&BufferSource::new(vec![0u8; 200]), &end).await,
            Err(ZipError::MalformedArchive(_))
        ));
    }
}
