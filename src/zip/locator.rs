//! Finding the End of Central Directory record.
//!
//! The record sits somewhere in the last 65557 bytes of the archive (22
//! fixed bytes plus a comment of up to 65535 bytes), so it is found by
//! scanning backwards from `length - 22`.

use crate::error::{Result, ZipError};
use crate::io::RandomAccessSource;

use super::structures::EndRecord;

/// First byte of every ZIP signature ('P').
const SIGNATURE_LEAD: u8 = 0x50;

/// A located and decoded end record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedEnd {
    /// Offset of the record's signature in the source.
    pub offset: u64,
    pub record: EndRecord,
    /// Archive comment following the fixed fields.
    pub comment: Vec<u8>,
}

/// Byte range the backward scan looks at, for a source of `length` bytes.
///
/// Callers that want to batch reads prefetch exactly this span.
pub fn scan_window(length: u64) -> std::ops::Range<u64> {
    length.saturating_sub(EndRecord::MAX_SPAN)..length
}

/// Scans `source` backwards for the end record and decodes it.
///
/// Candidates are tried from the end toward the start. The first signature
/// whose comment length reaches exactly the end of the source wins, which
/// rejects signature bytes that happen to appear inside the comment. When
/// no candidate is consistent (trailing garbage after the archive), the
/// first signature seen is taken.
pub async fn locate_end_record<S: RandomAccessSource + ?Sized>(source: &S) -> Result<LocatedEnd> {
    let length = source.length().await?;
    if length < EndRecord::SIZE as u64 {
        return Err(ZipError::malformed(format!(
            "{} bytes is too short for an end of central directory record",
            length
        )));
    }

    let last = length - EndRecord::SIZE as u64;
    let first = last.saturating_sub(u16::MAX as u64);

    let mut fallback = None;
    let mut i = last;
    loop {
        if source.read_byte(i).await? == SIGNATURE_LEAD
            && source.read_u32_le(i).await? == EndRecord::SIGNATURE
        {
            let comment_length = comment_length_at(source, i).await?;
            if i + EndRecord::SIZE as u64 + comment_length as u64 == length {
                log::debug!("end of central directory at {}", i);
                return decode_at(source, i, length).await;
            }
            log::trace!("signature at {} does not reach the end of the source", i);
            if fallback.is_none() {
                fallback = Some(i);
            }
        }
        if i == first {
            break;
        }
        i -= 1;
    }

    match fallback {
        Some(offset) => {
            log::debug!("end of central directory at {} (trailing data)", offset);
            decode_at(source, offset, length).await
        }
        None => Err(ZipError::malformed(
            "end of central directory signature not found",
        )),
    }
}

async fn comment_length_at<S: RandomAccessSource + ?Sized>(source: &S, offset: u64) -> Result<u16> {
    let lo = source.read_byte(offset + 20).await?;
    let hi = source.read_byte(offset + 21).await?;
    Ok(u16::from_le_bytes([lo, hi]))
}

async fn decode_at<S: RandomAccessSource + ?Sized>(
    source: &S,
    offset: u64,
    length: u64,
) -> Result<LocatedEnd> {
    let fixed_end = offset + EndRecord::SIZE as u64;
    let data = source.slice(offset, fixed_end).await?;
    let record = EndRecord::from_bytes(&data)?;

    let comment = if record.comment_length > 0 {
        // A truncated comment is tolerated; the archive itself is intact.
        let comment_end = (fixed_end + record.comment_length as u64).min(length);
        source.slice(fixed_end, comment_end).await?
    } else {
        Vec::new()
    };

    Ok(LocatedEnd {
        offset,
        record,
        comment,
    })
}
