use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;
use crate::io::RandomAccessSource;

use super::archive::ZipArchive;
use super::entry::ZipEntry;

impl<S: RandomAccessSource> ZipArchive<S> {
    /// Extract file to disk, creating parent directories. Directory
    /// entries just create the directory.
    pub async fn extract_to_file(&self, entry: &ZipEntry, output_path: &Path) -> Result<()> {
        if entry.is_directory() {
            fs::create_dir_all(output_path).await?;
            return Ok(());
        }

        // Create parent directories if needed
        if let Some(parent) = output_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let data = self.read(entry).await?;

        let mut file = fs::File::create(output_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        Ok(())
    }

    /// Extract file contents into any async writer (stdout, a socket, ...).
    pub async fn extract_to_writer<W>(&self, entry: &ZipEntry, writer: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let data = self.read(entry).await?;
        writer.write_all(&data).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Relative path for an entry name, or `None` if the name would escape
/// the extraction directory (absolute paths, `..`, drive prefixes).
pub fn sanitized_path(name: &str) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in Path::new(&name.replace('\\', "/")).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ZipArchive;

    #[test]
    fn sanitizes_names() {
        assert_eq!(sanitized_path("a/b.txt"), Some(PathBuf::from("a/b.txt")));
        assert_eq!(sanitized_path("./a/"), Some(PathBuf::from("a")));
        assert_eq!(sanitized_path("../evil"), None);
        assert_eq!(sanitized_path("/etc/passwd"), None);
        assert_eq!(sanitized_path("a\\..\\..\\b"), None);
        assert_eq!(sanitized_path(""), None);
    }

    #[tokio::test]
    async fn extracts_into_directory() {
        let mut archive = ZipArchive::new();
        archive.add_directory("docs/");
        archive.add_file("docs/readme.txt", b"read me".to_vec());
        let archive = ZipArchive::open_bytes(archive.to_bytes().await.unwrap())
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        for entry in archive.entries() {
            let path = dir.path().join(sanitized_path(&entry.name_lossy()).unwrap());
            archive.extract_to_file(entry, &path).await.unwrap();
        }

        assert!(dir.path().join("docs").is_dir());
        assert_eq!(
            std::fs::read(dir.path().join("docs/readme.txt")).unwrap(),
            b"read me"
        );
    }

    #[tokio::test]
    async fn extracts_into_writer() {
        let mut archive = ZipArchive::new();
        archive.add_file("a", b"abc".to_vec());
        let entry = archive.entry("a").unwrap().clone();

        let mut out: Vec<u8> = Vec::new();
        archive.extract_to_writer(&entry, &mut out).await.unwrap();
        assert_eq!(out, b"abc");
    }
}
