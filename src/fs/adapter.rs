//! Abstract filesystem trait.
//!
//! A narrow interface over directory and file primitives.
//! The trait is object-safe (manual pinned-future methods) so the store
//! can hold an `Arc<dyn Filesystem>`.

use bytes::Bytes;
use futures::Stream;
use std::future::Future;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::time::SystemTime;

/// One-shot stream of body chunks.
pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + 'static>>;

/// Name prefix reserved for in-flight atomic writes.  Entries carrying
/// it are never surfaced by directory walks.
pub const TMP_PREFIX: &str = ".tmp-";

/// Result of a `stat` call.
#[derive(Debug, Clone)]
pub struct FileStat {
    /// File size in bytes (0 for directories).
    pub size: u64,
    /// Last modification time.
    pub modified: SystemTime,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// A single directory entry.
#[derive(Debug, Clone)]
pub struct DirEntry {
    /// Entry name (not a full path).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
}

/// Wrap a fully materialized buffer as a [`ByteStream`].
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Async filesystem contract.
///
/// `write_atomic` is the linchpin: it must publish the file with a
/// rename so readers never observe a partial write.
pub trait Filesystem: Send + Sync + 'static {
    /// Create a directory, including missing ancestors.
    fn mkdir(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;

    /// Remove a directory; fails if it is not empty.
    fn rmdir(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;

    /// List the entries of a directory.
    fn read_dir(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<DirEntry>>> + Send + '_>>;

    /// Stat a file or directory.
    fn stat(&self, path: &Path)
        -> Pin<Box<dyn Future<Output = io::Result<FileStat>> + Send + '_>>;

    /// Open a file for reading.  With `range = Some((start, end))` the
    /// stream yields exactly the inclusive byte window `[start, end]`.
    fn open_read(
        &self,
        path: &Path,
        range: Option<(u64, u64)>,
    ) -> Pin<Box<dyn Future<Output = io::Result<ByteStream>> + Send + '_>>;

    /// Drain `data` into a temporary file and rename it into place,
    /// returning the number of bytes written.  On failure the temporary
    /// is discarded and the destination is untouched.
    fn write_atomic(
        &self,
        path: &Path,
        data: ByteStream,
    ) -> Pin<Box<dyn Future<Output = io::Result<u64>> + Send + '_>>;

    /// Unlink a file.
    fn remove(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>>;
}
