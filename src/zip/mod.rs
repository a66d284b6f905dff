//! ZIP archive reading and writing.
//!
//! ## Architecture
//!
//! - [`structures`]: fixed-layout records (end record, central and local headers)
//! - [`locator`]: finds the end record by scanning backwards from the end
//! - [`reader`]: decodes the central directory into [`ZipEntry`] values
//! - [`entry`]: the entry model and the name-indexed [`EntryTable`]
//! - [`codec`]: deflate/store and CRC32
//! - [`writer`]: lays out entries into one archive buffer
//! - [`ZipArchive`]: ties a source, its end record and its entries together
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! Reading starts from the EOCD, then the Central Directory, which allows
//! listing files without touching entry data - perfect for HTTP Range
//! requests.
//!
//! ## Limitations
//!
//! - No ZIP64, encryption or multi-disk archives
//! - STORED and DEFLATE only

mod archive;
pub mod codec;
pub mod entry;
mod extractor;
pub mod locator;
pub mod reader;
pub mod structures;
pub mod writer;

pub use archive::ZipArchive;
pub use entry::{EntryPayload, EntryTable, ZipEntry};
pub use extractor::sanitized_path;
pub use locator::{LocatedEnd, locate_end_record};
pub use reader::read_central_directory;
pub use structures::*;
pub use writer::{ArchiveWriter, WriteProgress};
