//! Compression and checksums for entry payloads.

use flate2::Compression;
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use std::io::{Read, Write};

use super::entry::{EntryPayload, ZipEntry};
use super::structures::CompressionMethod;
use crate::error::{Result, ZipError};

pub fn crc32(data: &[u8]) -> u32 {
    crc32fast::hash(data)
}

pub fn compress(method: CompressionMethod, data: &[u8]) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            Ok(encoder.finish()?)
        }
        CompressionMethod::Unknown(code) => Err(ZipError::UnsupportedCompressionMethod(code)),
    }
}

/// Decompresses `data`; `expected_len` only sizes the output buffer.
pub fn decompress(method: CompressionMethod, data: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    match method {
        CompressionMethod::Stored => Ok(data.to_vec()),
        CompressionMethod::Deflate => {
            let mut out = Vec::with_capacity(expected_len);
            DeflateDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| ZipError::Decompression(e.to_string()))?;
            Ok(out)
        }
        CompressionMethod::Unknown(code) => Err(ZipError::UnsupportedCompressionMethod(code)),
    }
}

/// Produces the bytes to store for `entry`, updating its crc and sizes
/// when the payload is raw. Compressed payloads are reused untouched.
pub fn prepare(entry: &mut ZipEntry) -> Result<Vec<u8>> {
    match std::mem::replace(&mut entry.payload, EntryPayload::Archived) {
        EntryPayload::Raw(data) => {
            let compressed = compress(entry.compression_method, &data)?;
            entry.crc32 = crc32(&data);
            entry.uncompressed_size =
                u32::try_from(data.len()).map_err(|_| ZipError::CapacityExceeded("entry size"))?;
            entry.compressed_size = u32::try_from(compressed.len())
                .map_err(|_| ZipError::CapacityExceeded("entry size"))?;
            entry.payload = EntryPayload::Raw(data);
            Ok(compressed)
        }
        EntryPayload::Compressed(bytes) => {
            entry.compressed_size =
                u32::try_from(bytes.len()).map_err(|_| ZipError::CapacityExceeded("entry size"))?;
            let out = bytes.clone();
            entry.payload = EntryPayload::Compressed(bytes);
            Ok(out)
        }
        EntryPayload::Archived => Err(ZipError::PayloadNotLoaded(entry.name_lossy())),
    }
}
