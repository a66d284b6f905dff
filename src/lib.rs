//! # rangezip
//!
//! Read and write ZIP archives whose bytes live in memory, in a local file,
//! or behind an HTTP endpoint that only serves byte ranges.
//!
//! Everything is built on [`RandomAccessSource`]. Remote sources are read
//! through a read-ahead window, so opening an archive costs one length
//! probe plus one or two ranged reads regardless of how many entries it
//! holds.
//!
//! ## Features
//!
//! - List and extract archives from memory, local files and HTTP/HTTPS URLs
//! - Build archives from scratch or edit opened ones, then serialize them
//!   in one pass or entry by entry with progress notifications
//! - STORED and DEFLATE compression with CRC32 verification
//!
//! ## Example
//!
//! ```no_run
//! use rangezip::{HttpConfig, ZipArchive};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let archive =
//!         ZipArchive::open_url("https://example.com/archive.zip", &HttpConfig::default()).await?;
//!
//!     for entry in archive.entries() {
//!         println!("{}", entry.name_lossy());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, SourceError, ZipError};
pub use io::{
    BufferSource, FileSource, HttpConfig, HttpTransport, RandomAccessSource, RangeTransport,
    ReadAheadSource, RemoteSource,
};
pub use zip::{ArchiveWriter, CompressionMethod, EntryTable, WriteProgress, ZipArchive, ZipEntry};
