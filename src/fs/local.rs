//! Local filesystem adapter.
//!
//! All writes follow the temp-fsync-rename pattern so a reader never
//! observes a partially written file.  Ranged reads seek to the window
//! start and cap the stream at the window length.

use bytes::Bytes;
use futures::StreamExt;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio_util::io::ReaderStream;

use super::adapter::{ByteStream, DirEntry, FileStat, Filesystem, TMP_PREFIX};

/// Filesystem adapter backed by `tokio::fs`.
#[derive(Debug, Default)]
pub struct LocalFilesystem;

impl LocalFilesystem {
    pub fn new() -> Self {
        Self
    }

    /// Temporary sibling path for an atomic write of `path`.
    fn temp_path(path: &Path) -> PathBuf {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        parent.join(format!("{TMP_PREFIX}{}", uuid::Uuid::new_v4()))
    }
}

impl Filesystem for LocalFilesystem {
    fn mkdir(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move { tokio::fs::create_dir_all(&path).await })
    }

    fn rmdir(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move { tokio::fs::remove_dir(&path).await })
    }

    fn read_dir(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<DirEntry>>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let mut entries = Vec::new();
            let mut reader = tokio::fs::read_dir(&path).await?;
            while let Some(entry) = reader.next_entry().await? {
                let name = entry.file_name().to_string_lossy().into_owned();
                let is_dir = entry.file_type().await?.is_dir();
                entries.push(DirEntry { name, is_dir });
            }
            Ok(entries)
        })
    }

    fn stat(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = io::Result<FileStat>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let meta = tokio::fs::metadata(&path).await?;
            Ok(FileStat {
                size: meta.len(),
                modified: meta.modified()?,
                is_dir: meta.is_dir(),
            })
        })
    }

    fn open_read(
        &self,
        path: &Path,
        range: Option<(u64, u64)>,
    ) -> Pin<Box<dyn Future<Output = io::Result<ByteStream>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let mut file = tokio::fs::File::open(&path).await?;
            let stream: ByteStream = match range {
                Some((start, end)) => {
                    file.seek(io::SeekFrom::Start(start)).await?;
                    let window = end - start + 1;
                    Box::pin(ReaderStream::new(file.take(window)))
                }
                None => Box::pin(ReaderStream::new(file)),
            };
            Ok(stream)
        })
    }

    fn write_atomic(
        &self,
        path: &Path,
        mut data: ByteStream,
    ) -> Pin<Box<dyn Future<Output = io::Result<u64>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let tmp = Self::temp_path(&path);

            let result: io::Result<u64> = async {
                let mut file = tokio::fs::File::create(&tmp).await?;
                let mut written: u64 = 0;
                while let Some(chunk) = data.next().await {
                    let chunk: Bytes = chunk?;
                    file.write_all(&chunk).await?;
                    written += chunk.len() as u64;
                }
                file.sync_all().await?;
                tokio::fs::rename(&tmp, &path).await?;
                Ok(written)
            }
            .await;

            if result.is_err() {
                let _ = tokio::fs::remove_file(&tmp).await;
            }
            result
        })
    }

    fn remove(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move { tokio::fs::remove_file(&path).await })
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::adapter::bytes_stream;
    use futures::TryStreamExt;

    async fn collect(stream: ByteStream) -> Vec<u8> {
        stream
            .try_fold(Vec::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok(acc)
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_write_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let path = dir.path().join("file.txt");

        let written = fs
            .write_atomic(&path, bytes_stream(Bytes::from("hello world")))
            .await
            .unwrap();
        assert_eq!(written, 11);

        let body = collect(fs.open_read(&path, None).await.unwrap()).await;
        assert_eq!(body, b"hello world");
    }

    #[tokio::test]
    async fn test_open_read_window() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let path = dir.path().join("file.txt");
        fs.write_atomic(&path, bytes_stream(Bytes::from("hello")))
            .await
            .unwrap();

        let body = collect(fs.open_read(&path, Some((1, 3))).await.unwrap()).await;
        assert_eq!(body, b"ell");
    }

    #[tokio::test]
    async fn test_write_atomic_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let path = dir.path().join("file.txt");
        fs.write_atomic(&path, bytes_stream(Bytes::from("data")))
            .await
            .unwrap();

        let entries = fs.read_dir(dir.path()).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "file.txt");
    }

    #[tokio::test]
    async fn test_failed_write_discards_temp_and_target() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let path = dir.path().join("file.txt");

        let failing: ByteStream = Box::pin(futures::stream::iter(vec![
            Ok(Bytes::from("partial")),
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "client gone")),
        ]));
        assert!(fs.write_atomic(&path, failing).await.is_err());

        assert!(fs.read_dir(dir.path()).await.unwrap().is_empty());
        assert!(fs.stat(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_rmdir_refuses_non_empty() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let sub = dir.path().join("bucket");
        fs.mkdir(&sub).await.unwrap();
        fs.write_atomic(&sub.join("obj"), bytes_stream(Bytes::from("x")))
            .await
            .unwrap();

        assert!(fs.rmdir(&sub).await.is_err());
        fs.remove(&sub.join("obj")).await.unwrap();
        fs.rmdir(&sub).await.unwrap();
    }

    #[tokio::test]
    async fn test_stat_reports_size_and_kind() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LocalFilesystem::new();
        let path = dir.path().join("file.txt");
        fs.write_atomic(&path, bytes_stream(Bytes::from("12345")))
            .await
            .unwrap();

        let stat = fs.stat(&path).await.unwrap();
        assert_eq!(stat.size, 5);
        assert!(!stat.is_dir);

        let stat = fs.stat(dir.path()).await.unwrap();
        assert!(stat.is_dir);
    }
}
