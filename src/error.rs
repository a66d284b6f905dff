//! Error types shared by the sources and the archive layer.

use std::ops::Range;

use thiserror::Error;

/// Boxed cause carried by transport failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failure while reading from a [`RandomAccessSource`](crate::io::RandomAccessSource).
#[derive(Debug, Error)]
pub enum SourceError {
    /// The requested span does not fit inside the source.
    #[error("range {start}..{end} is out of bounds for a source of {length} bytes")]
    OutOfBounds { start: u64, end: u64, length: u64 },

    /// The transport failed. `range` is `None` for the length probe.
    #[error("transport error reading {}: {source}", describe_range(.range))]
    Transport {
        range: Option<Range<u64>>,
        #[source]
        source: BoxError,
    },

    /// Local I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_range(range: &Option<Range<u64>>) -> String {
    match range {
        Some(r) => format!("bytes {}..{}", r.start, r.end),
        None => "length".to_string(),
    }
}

/// Errors produced while reading, extracting or writing an archive.
#[derive(Debug, Error)]
pub enum ZipError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The end record was not found, a signature did not match, or a
    /// decoded offset points outside the archive.
    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("unsupported compression method: {0}")]
    UnsupportedCompressionMethod(u16),

    #[error("decompression error: {0}")]
    Decompression(String),

    #[error("CRC mismatch for {name}: expected {expected:#010x}, got {actual:#010x}")]
    CrcMismatch {
        name: String,
        expected: u32,
        actual: u32,
    },

    /// The entry still refers to a source payload that has not been loaded.
    #[error("payload of {0} is not loaded")]
    PayloadNotLoaded(String),

    /// A value does not fit the classic (non-ZIP64) record layout.
    #[error("{0} exceeds the ZIP format limit")]
    CapacityExceeded(&'static str),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZipError {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        ZipError::MalformedArchive(msg.into())
    }
}

/// Result type for archive operations.
pub type Result<T> = std::result::Result<T, ZipError>;
