use std::collections::HashMap;

use super::structures::{CentralHeader, CompressionMethod, LocalHeader, dos_date, dos_time};

/// General purpose flag bit 3: sizes and CRC follow the payload.
const DATA_DESCRIPTOR_FLAG: u16 = 0x0008;

/// Where an entry's bytes currently live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryPayload {
    /// Still in the source archive, at `local_header_offset`.
    Archived,
    /// Uncompressed bytes waiting to be compressed on write.
    Raw(Vec<u8>),
    /// Compressed bytes matching the entry's method, crc and sizes.
    Compressed(Vec<u8>),
}

/// Parsed ZIP file entry information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    /// Raw name bytes; ZIP names are not guaranteed to be UTF-8.
    pub name: Vec<u8>,
    pub compression_method: CompressionMethod,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub crc32: u32,
    pub local_header_offset: u32,
    pub extra_field: Vec<u8>,
    pub comment: Vec<u8>,
    pub version_made_by: u16,
    pub version_needed: u16,
    pub flags: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub internal_attributes: u16,
    pub external_attributes: u32,
    pub payload: EntryPayload,
}

impl ZipEntry {
    /// New entry holding uncompressed `data`. Directories and empty files
    /// are stored, everything else is deflated.
    pub fn new(name: impl Into<Vec<u8>>, data: Vec<u8>) -> Self {
        let name = name.into();
        let method = if name.ends_with(b"/") || data.is_empty() {
            CompressionMethod::Stored
        } else {
            CompressionMethod::Deflate
        };
        Self {
            compression_method: method,
            compressed_size: 0,
            uncompressed_size: data.len() as u32,
            crc32: 0,
            local_header_offset: 0,
            extra_field: Vec::new(),
            comment: Vec::new(),
            version_made_by: 20,
            version_needed: method.version_needed(),
            flags: 0,
            last_mod_time: 0,
            last_mod_date: dos_date(1980, 1, 1),
            internal_attributes: 0,
            external_attributes: 0,
            payload: EntryPayload::Raw(data),
            name,
        }
    }

    /// New directory entry; a trailing `/` is added when missing.
    pub fn directory(name: impl Into<Vec<u8>>) -> Self {
        let mut name = name.into();
        if !name.ends_with(b"/") {
            name.push(b'/');
        }
        let mut entry = Self::new(name, Vec::new());
        // MS-DOS directory attribute
        entry.external_attributes = 0x10;
        entry
    }

    pub fn with_method(mut self, method: CompressionMethod) -> Self {
        self.compression_method = method;
        self.version_needed = method.version_needed();
        self
    }

    pub fn with_comment(mut self, comment: impl Into<Vec<u8>>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn with_extra_field(mut self, extra: impl Into<Vec<u8>>) -> Self {
        self.extra_field = extra.into();
        self
    }

    /// Sets the DOS modification timestamp.
    pub fn with_modified(
        mut self,
        (year, month, day): (u16, u8, u8),
        (hour, minute, second): (u8, u8, u8),
    ) -> Self {
        self.last_mod_date = dos_date(year, month, day);
        self.last_mod_time = dos_time(hour, minute, second);
        self
    }

    /// Builds an entry from a decoded central directory record.
    pub fn from_central(
        header: &CentralHeader,
        name: Vec<u8>,
        extra_field: Vec<u8>,
        comment: Vec<u8>,
    ) -> Self {
        Self {
            name,
            compression_method: CompressionMethod::from_u16(header.method),
            compressed_size: header.compressed_size,
            uncompressed_size: header.uncompressed_size,
            crc32: header.crc32,
            local_header_offset: header.local_header_offset,
            extra_field,
            comment,
            version_made_by: header.version_made_by,
            version_needed: header.version_needed,
            flags: header.flags,
            last_mod_time: header.last_mod_time,
            last_mod_date: header.last_mod_date,
            internal_attributes: header.internal_attributes,
            external_attributes: header.external_attributes,
            payload: EntryPayload::Archived,
        }
    }

    /// Central directory header describing this entry. Variable-length
    /// fields are counted from the entry itself.
    pub fn central_header(&self) -> CentralHeader {
        CentralHeader {
            version_made_by: self.version_made_by,
            version_needed: self.version_needed,
            flags: self.header_flags(),
            method: self.compression_method.as_u16(),
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            name_length: self.name.len() as u16,
            extra_length: self.extra_field.len() as u16,
            comment_length: self.comment.len() as u16,
            disk_start: 0,
            internal_attributes: self.internal_attributes,
            external_attributes: self.external_attributes,
            local_header_offset: self.local_header_offset,
        }
    }

    /// General purpose flags as written. Sizes are always known up front,
    /// so the data descriptor bit is cleared in both headers.
    fn header_flags(&self) -> u16 {
        self.flags & !DATA_DESCRIPTOR_FLAG
    }

    /// Local header written in front of the payload.
    pub fn local_header(&self) -> LocalHeader {
        LocalHeader {
            version_needed: self.version_needed,
            flags: self.header_flags(),
            method: self.compression_method.as_u16(),
            last_mod_time: self.last_mod_time,
            last_mod_date: self.last_mod_date,
            crc32: self.crc32,
            compressed_size: self.compressed_size,
            uncompressed_size: self.uncompressed_size,
            name_length: self.name.len() as u16,
            extra_length: self.extra_field.len() as u16,
        }
    }

    pub fn is_directory(&self) -> bool {
        self.name.ends_with(b"/")
    }

    /// Name decoded lossily for display and path building.
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Ordered entries plus a name index. Names are unique: inserting an
/// existing name replaces the older entry.
#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    entries: Vec<ZipEntry>,
    index: HashMap<Vec<u8>, usize>,
}

impl EntryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, ZipEntry> {
        self.entries.iter()
    }

    pub fn as_slice(&self) -> &[ZipEntry] {
        &self.entries
    }

    pub fn get(&self, name: &[u8]) -> Option<&ZipEntry> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn get_mut(&mut self, name: &[u8]) -> Option<&mut ZipEntry> {
        self.index.get(name).map(|&i| &mut self.entries[i])
    }

    pub fn contains(&self, name: &[u8]) -> bool {
        self.index.contains_key(name)
    }

    /// Appends `entry`, evicting any previous entry with the same name.
    /// Returns the evicted entry.
    pub fn insert(&mut self, entry: ZipEntry) -> Option<ZipEntry> {
        let previous = self.remove(&entry.name);
        self.index.insert(entry.name.clone(), self.entries.len());
        self.entries.push(entry);
        previous
    }

    pub fn remove(&mut self, name: &[u8]) -> Option<ZipEntry> {
        let position = self.index.remove(name)?;
        let removed = self.entries.remove(position);
        for slot in self.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(removed)
    }

    /// Entries whose name starts with `prefix`.
    pub fn with_prefix<'a>(&'a self, prefix: &[u8]) -> impl Iterator<Item = &'a ZipEntry> {
        self.entries.iter().filter(move |e| e.name.starts_with(prefix))
    }

    pub fn into_vec(self) -> Vec<ZipEntry> {
        self.entries
    }
}

impl FromIterator<ZipEntry> for EntryTable {
    fn from_iter<I: IntoIterator<Item = ZipEntry>>(iter: I) -> Self {
        let mut table = EntryTable::new();
        for entry in iter {
            table.insert(entry);
        }
        table
    }
}

impl<'a> IntoIterator for &'a EntryTable {
    type Item = &'a ZipEntry;
    type IntoIter = std::slice::Iter<'a, ZipEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_detection() {
        assert!(ZipEntry::directory("b").is_directory());
        assert_eq!(ZipEntry::directory("b").name, b"b/");
        assert!(!ZipEntry::new("a.txt", b"hello".to_vec()).is_directory());
    }

    #[test]
    fn default_methods() {
        assert_eq!(
            ZipEntry::new("a.txt", b"hello".to_vec()).compression_method,
            CompressionMethod::Deflate
        );
        assert_eq!(
            ZipEntry::new("empty", Vec::new()).compression_method,
            CompressionMethod::Stored
        );
        let stored = ZipEntry::new("a.txt", b"x".to_vec()).with_method(CompressionMethod::Stored);
        assert_eq!(stored.version_needed, 10);
    }

    #[test]
    fn duplicate_insert_keeps_latest() {
        let mut table = EntryTable::new();
        table.insert(ZipEntry::new("a.txt", b"first".to_vec()));
        table.insert(ZipEntry::new("b.txt", b"other".to_vec()));
        let evicted = table.insert(ZipEntry::new("a.txt", b"second!".to_vec()));

        assert!(evicted.is_some());
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(b"a.txt").unwrap().uncompressed_size, 7);
        let names: Vec<_> = table.iter().map(|e| e.name.as_slice()).collect();
        assert_eq!(names, vec![b"b.txt".as_slice(), b"a.txt".as_slice()]);
    }

    #[test]
    fn remove_reindexes() {
        let mut table: EntryTable = ["a", "b", "c"]
            .into_iter()
            .map(|n| ZipEntry::new(n, Vec::new()))
            .collect();
        assert!(table.remove(b"a").is_some());
        assert!(table.remove(b"a").is_none());
        assert_eq!(table.get(b"c").unwrap().name, b"c");
        assert_eq!(table.get(b"b").unwrap().name, b"b");
    }

    #[test]
    fn rewritten_headers_drop_data_descriptor_bit() {
        let mut entry = ZipEntry::new("streamed.bin", b"payload".to_vec());
        // language encoding flag plus data descriptor
        entry.flags = 0x0808;
        assert_eq!(entry.central_header().flags, 0x0800);
        assert_eq!(entry.local_header().flags, 0x0800);
        assert_eq!(entry.flags, 0x0808);
    }

    #[test]
    fn mod_time_round_trip() {
        let entry = ZipEntry::new("a", Vec::new()).with_modified((2024, 5, 17), (13, 45, 30));
        assert_eq!(entry.mod_date(), (2024, 5, 17));
        assert_eq!(entry.mod_time(), (13, 45, 30));
    }
}
