//! Fixed-layout ZIP records.
//!
//! Decoding checks the signature and nothing else; range validation is up
//! to the caller. Encoding writes the fixed prefix followed by the variable
//! fields in declared order.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Cursor;

use crate::error::{Result, ZipError};

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unknown(v) => *v,
        }
    }

    /// "Version needed to extract" for this method.
    pub fn version_needed(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 10,
            _ => 20,
        }
    }
}

fn check_signature(data: &[u8], expected: u32, min_size: usize, what: &str) -> Result<()> {
    if data.len() < min_size {
        return Err(ZipError::malformed(format!(
            "{} truncated: {} of {} bytes",
            what,
            data.len(),
            min_size
        )));
    }
    let actual = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    if actual != expected {
        return Err(ZipError::malformed(format!(
            "invalid {} signature: expected {:#010x}, got {:#010x}",
            what, expected, actual
        )));
    }
    Ok(())
}

/// Length of a variable field as stored in a `u16` header slot.
pub(crate) fn field_len(data: &[u8], what: &'static str) -> Result<u16> {
    u16::try_from(data.len()).map_err(|_| ZipError::CapacityExceeded(what))
}

/// End of Central Directory (EOCD) - 22 bytes + comment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EndRecord {
    pub disk_number: u16,
    pub disk_with_cd: u16,
    pub disk_entries: u16,
    pub entry_count: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_length: u16,
}

impl EndRecord {
    pub const SIGNATURE: u32 = 0x0605_4b50;
    pub const SIZE: usize = 22;
    /// Largest span from the end record's start to the end of the archive.
    pub const MAX_SPAN: u64 = Self::SIZE as u64 + u16::MAX as u64;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_signature(data, Self::SIGNATURE, Self::SIZE, "end of central directory")?;

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            disk_number: cursor.read_u16::<LittleEndian>()?,
            disk_with_cd: cursor.read_u16::<LittleEndian>()?,
            disk_entries: cursor.read_u16::<LittleEndian>()?,
            entry_count: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Encodes the record followed by `comment`. The stored comment length
    /// is taken from `comment`, not from `self.comment_length`.
    pub fn encode(&self, comment: &[u8]) -> Result<Vec<u8>> {
        let comment_length = field_len(comment, "archive comment")?;
        let mut out = Vec::with_capacity(Self::SIZE + comment.len());
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.disk_number)?;
        out.write_u16::<LittleEndian>(self.disk_with_cd)?;
        out.write_u16::<LittleEndian>(self.disk_entries)?;
        out.write_u16::<LittleEndian>(self.entry_count)?;
        out.write_u32::<LittleEndian>(self.cd_size)?;
        out.write_u32::<LittleEndian>(self.cd_offset)?;
        out.write_u16::<LittleEndian>(comment_length)?;
        out.extend_from_slice(comment);
        Ok(out)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes + name/extra/comment
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CentralHeader {
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_length: u16,
    pub extra_length: u16,
    pub comment_length: u16,
    pub disk_start: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub local_header_offset: u32,
}

impl CentralHeader {
    pub const SIGNATURE: u32 = 0x0201_4b50;
    pub const SIZE: usize = 46;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_signature(data, Self::SIGNATURE, Self::SIZE, "central directory header")?;

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            version_made_by: cursor.read_u16::<LittleEndian>()?,
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            name_length: cursor.read_u16::<LittleEndian>()?,
            extra_length: cursor.read_u16::<LittleEndian>()?,
            comment_length: cursor.read_u16::<LittleEndian>()?,
            disk_start: cursor.read_u16::<LittleEndian>()?,
            internal_attributes: cursor.read_u16::<LittleEndian>()?,
            external_attributes: cursor.read_u32::<LittleEndian>()?,
            local_header_offset: cursor.read_u32::<LittleEndian>()?,
        })
    }

    /// Size of the whole record including its variable fields.
    pub fn record_size(&self) -> u64 {
        Self::SIZE as u64
            + self.name_length as u64
            + self.extra_length as u64
            + self.comment_length as u64
    }

    /// Encodes the header followed by name, extra and comment. The stored
    /// lengths are taken from the slices.
    pub fn encode(&self, name: &[u8], extra: &[u8], comment: &[u8]) -> Result<Vec<u8>> {
        let name_length = field_len(name, "entry name")?;
        let extra_length = field_len(extra, "extra field")?;
        let comment_length = field_len(comment, "entry comment")?;

        let mut out = Vec::with_capacity(Self::SIZE + name.len() + extra.len() + comment.len());
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_made_by)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.method)?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(name_length)?;
        out.write_u16::<LittleEndian>(extra_length)?;
        out.write_u16::<LittleEndian>(comment_length)?;
        out.write_u16::<LittleEndian>(self.disk_start)?;
        out.write_u16::<LittleEndian>(self.internal_attributes)?;
        out.write_u32::<LittleEndian>(self.external_attributes)?;
        out.write_u32::<LittleEndian>(self.local_header_offset)?;
        out.extend_from_slice(name);
        out.extend_from_slice(extra);
        out.extend_from_slice(comment);
        Ok(out)
    }
}

/// Local File Header (LFH) - 30 bytes + name/extra
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalHeader {
    pub version_needed: u16,
    pub flags: u16,
    pub method: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub name_length: u16,
    pub extra_length: u16,
}

impl LocalHeader {
    pub const SIGNATURE: u32 = 0x0403_4b50;
    pub const SIZE: usize = 30;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        check_signature(data, Self::SIGNATURE, Self::SIZE, "local file header")?;

        let mut cursor = Cursor::new(&data[4..]);

        Ok(Self {
            version_needed: cursor.read_u16::<LittleEndian>()?,
            flags: cursor.read_u16::<LittleEndian>()?,
            method: cursor.read_u16::<LittleEndian>()?,
            last_mod_time: cursor.read_u16::<LittleEndian>()?,
            last_mod_date: cursor.read_u16::<LittleEndian>()?,
            crc32: cursor.read_u32::<LittleEndian>()?,
            compressed_size: cursor.read_u32::<LittleEndian>()?,
            uncompressed_size: cursor.read_u32::<LittleEndian>()?,
            name_length: cursor.read_u16::<LittleEndian>()?,
            extra_length: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// Size of the header plus name and extra; the payload follows.
    pub fn record_size(&self) -> u64 {
        Self::SIZE as u64 + self.name_length as u64 + self.extra_length as u64
    }

    pub fn encode(&self, name: &[u8], extra: &[u8]) -> Result<Vec<u8>> {
        let name_length = field_len(name, "entry name")?;
        let extra_length = field_len(extra, "extra field")?;

        let mut out = Vec::with_capacity(Self::SIZE + name.len() + extra.len());
        out.write_u32::<LittleEndian>(Self::SIGNATURE)?;
        out.write_u16::<LittleEndian>(self.version_needed)?;
        out.write_u16::<LittleEndian>(self.flags)?;
        out.write_u16::<LittleEndian>(self.method)?;
        out.write_u16::<LittleEndian>(self.last_mod_time)?;
        out.write_u16::<LittleEndian>(self.last_mod_date)?;
        out.write_u32::<LittleEndian>(self.crc32)?;
        out.write_u32::<LittleEndian>(self.compressed_size)?;
        out.write_u32::<LittleEndian>(self.uncompressed_size)?;
        out.write_u16::<LittleEndian>(name_length)?;
        out.write_u16::<LittleEndian>(extra_length)?;
        out.extend_from_slice(name);
        out.extend_from_slice(extra);
        Ok(out)
    }
}

/// Packs a calendar date into the MS-DOS date format.
pub fn dos_date(year: u16, month: u8, day: u8) -> u16 {
    let year = year.clamp(1980, 2107) - 1980;
    (year << 9) | ((month as u16 & 0x0F) << 5) | (day as u16 & 0x1F)
}

/// Packs a wall-clock time into the MS-DOS time format (2 second steps).
pub fn dos_time(hour: u8, minute: u8, second: u8) -> u16 {
    ((hour as u16 & 0x1F) << 11) | ((minute as u16 & 0x3F) << 5) | ((second as u16 / 2) & 0x1F)
}
