#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rangezip::error::BoxError;
use rangezip::{CompressionMethod, RangeTransport, ZipArchive, ZipEntry};

/// Serves a fixed buffer the way a blob store answers HEAD and ranged GET.
#[derive(Clone)]
pub struct MockTransport {
    data: Arc<Vec<u8>>,
    pub probes: Arc<AtomicUsize>,
    pub fetches: Arc<AtomicUsize>,
    pub fail_fetches: Arc<AtomicBool>,
}

impl MockTransport {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            probes: Arc::new(AtomicUsize::new(0)),
            fetches: Arc::new(AtomicUsize::new(0)),
            fail_fetches: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RangeTransport for MockTransport {
    async fn content_length(&self) -> Result<u64, BoxError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        Ok(self.data.len() as u64)
    }

    async fn fetch_range(&self, start: u64, end: u64) -> Result<Vec<u8>, BoxError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err("HTTP request failed with status: 503 Service Unavailable".into());
        }
        if end > self.data.len() as u64 || start > end {
            return Err("HTTP request failed with status: 416 Range Not Satisfiable".into());
        }
        Ok(self.data[start as usize..end as usize].to_vec())
    }
}

/// A small archive with files, nested directories, a stored entry,
/// per-entry comments and an archive comment.
pub async fn sample_archive() -> Vec<u8> {
    let mut archive = ZipArchive::new();
    archive.add_file("README.md", b"# sample\n".repeat(40));
    archive.add_directory("src/");
    archive.add_file("src/main.rs", b"fn main() {}\n".to_vec());
    archive.add_entry(
        ZipEntry::new("src/data.bin", (0..=255u8).cycle().take(4096).collect())
            .with_method(CompressionMethod::Stored)
            .with_comment("raw bytes"),
    );
    archive.add_directory("empty/");
    archive.add_entry(
        ZipEntry::new("notes.txt", b"remember the milk".to_vec())
            .with_modified((2023, 11, 2), (8, 15, 0))
            .with_extra_field(vec![0xca, 0xfe, 0x02, 0x00, 0x01, 0x02]),
    );
    archive.set_comment("sample archive");
    archive.to_bytes().await.expect("sample archive")
}
