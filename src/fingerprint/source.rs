/// Byte sources the chunked hasher can read from.
///
/// A source exposes its length and a byte-range read. The hasher reads
/// windows strictly in order, so implementations never see concurrent reads.
use std::path::Path;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::Mutex;

use super::FileDescriptor;
use crate::error::{ProofError, Result};

/// A file-like handle with a length and a ranged read.
#[async_trait]
pub trait ByteSource: Send + Sync {
    /// Total length in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read up to `len` bytes starting at `offset`.
    /// Returns fewer bytes only if the source ends early.
    async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>>;
}

/// A file on the local filesystem.
pub struct LocalFile {
    file: Mutex<File>,
    len: u64,
}

impl LocalFile {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref()).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file: Mutex::new(file),
            len,
        })
    }
}

#[async_trait]
impl ByteSource for LocalFile {
    fn len(&self) -> u64 {
        self.len
    }

    async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset)).await?;

        let mut buf = Vec::with_capacity(len);
        (&mut *file).take(len as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }
}

/// Bytes already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }
}

#[async_trait]
impl ByteSource for MemorySource {
    fn len(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_at(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        let start = usize::try_from(offset)
            .map_err(|_| ProofError::Read(format!("offset {offset} out of range")))?;
        if start > self.data.len() {
            return Err(ProofError::Read(format!("offset {offset} past end of data")));
        }
        let end = std::cmp::min(start.saturating_add(len), self.data.len());
        Ok(self.data[start..end].to_vec())
    }
}

/// A user-selected file: what the backend is told about it, and where its bytes live.
pub struct SelectedFile {
    pub descriptor: FileDescriptor,
    pub source: Box<dyn ByteSource>,
}

impl SelectedFile {
    pub fn new(descriptor: FileDescriptor, source: impl ByteSource + 'static) -> Self {
        Self {
            descriptor,
            source: Box::new(source),
        }
    }

    /// Build a selection from in-memory bytes.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        let source = MemorySource::new(data);
        let descriptor = FileDescriptor::new(name, source.len(), None);
        Self::new(descriptor, source)
    }

    /// Open a file from disk; the name is the path's final component.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        let source = LocalFile::open(path).await?;
        let descriptor = FileDescriptor::new(name, source.len(), None);
        Ok(Self::new(descriptor, source))
    }
}

impl std::fmt::Debug for SelectedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectedFile")
            .field("descriptor", &self.descriptor)
            .field("len", &self.source.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_memory_source_ranges() {
        let src = MemorySource::new(b"0123456789".to_vec());
        assert_eq!(src.len(), 10);
        assert_eq!(src.read_at(0, 4).await.unwrap(), b"0123");
        assert_eq!(src.read_at(8, 4).await.unwrap(), b"89");
        assert!(src.read_at(10, 4).await.unwrap().is_empty());
        assert!(src.read_at(11, 1).await.is_err());
    }

    #[tokio::test]
    async fn test_local_file_reads_windows() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello local file").unwrap();

        let src = LocalFile::open(tmp.path()).await.unwrap();
        assert_eq!(src.len(), 16);
        assert_eq!(src.read_at(6, 5).await.unwrap(), b"local");
        assert_eq!(src.read_at(11, 100).await.unwrap(), b" file");
    }

    #[tokio::test]
    async fn test_selected_file_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        std::fs::write(&path, b"%PDF-1.7").unwrap();

        let selected = SelectedFile::open(&path).await.unwrap();
        assert_eq!(selected.descriptor.name, "report.pdf");
        assert_eq!(selected.descriptor.size, 8);
        assert_eq!(selected.descriptor.mime_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = SelectedFile::open(dir.path().join("missing.bin")).await.unwrap_err();
        assert!(matches!(err, ProofError::Io(_)));
    }
}
