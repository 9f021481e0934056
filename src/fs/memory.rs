//! In-memory filesystem adapter.
//!
//! Used by unit tests and available for embedding the server without
//! touching disk.  Semantics mirror [`super::local::LocalFilesystem`]:
//! writes publish atomically, directories must exist before files are
//! written into them, and `rmdir` refuses non-empty directories.

use bytes::Bytes;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Mutex;
use std::time::SystemTime;

use super::adapter::{bytes_stream, ByteStream, DirEntry, FileStat, Filesystem};

#[derive(Debug, Clone)]
struct MemFile {
    data: Bytes,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct MemState {
    files: BTreeMap<PathBuf, MemFile>,
    dirs: BTreeMap<PathBuf, SystemTime>,
}

/// Filesystem adapter holding everything in a mutex-guarded map.
#[derive(Debug, Default)]
pub struct MemoryFilesystem {
    state: Mutex<MemState>,
}

impl MemoryFilesystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemState> {
        self.state.lock().expect("memory fs lock")
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{}", path.display()))
}

impl Filesystem for MemoryFilesystem {
    fn mkdir(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let mut state = self.lock();
            let now = SystemTime::now();
            let mut current = PathBuf::new();
            for component in path.components() {
                current.push(component);
                state.dirs.entry(current.clone()).or_insert(now);
            }
            Ok(())
        })
    }

    fn rmdir(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let mut state = self.lock();
            if !state.dirs.contains_key(&path) {
                return Err(not_found(&path));
            }
            let occupied = state
                .files
                .keys()
                .chain(state.dirs.keys())
                .any(|p| p != &path && p.starts_with(&path));
            if occupied {
                return Err(io::Error::new(
                    io::ErrorKind::DirectoryNotEmpty,
                    format!("{}", path.display()),
                ));
            }
            state.dirs.remove(&path);
            Ok(())
        })
    }

    fn read_dir(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn Future<Output = io::Result<Vec<DirEntry>>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let state = self.lock();
            if !state.dirs.contains_key(&path) {
                return Err(not_found(&path));
            }
            let mut entries = Vec::new();
            for dir in state.dirs.keys() {
                if dir.parent() == Some(path.as_path()) {
                    if let Some(name) = dir.file_name() {
                        entries.push(DirEntry {
                            name: name.to_string_lossy().into_owned(),
                            is_dir: true,
                        });
                    }
                }
            }
            for file in state.files.keys() {
                if file.parent() == Some(path.as_path()) {
                    if let Some(name) = file.file_name() {
                        entries.push(DirEntry {
                            name: name.to_string_lossy().into_owned(),
                            is_dir: false,
                        });
                    }
                }
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
            let state = self.lock();
            if let Some(file) = state.files.get(&path) {
                return Ok(FileStat {
                    size: file.data.len() as u64,
                    modified: file.modified,
                    is_dir: false,
                });
            }
            if let Some(created) = state.dirs.get(&path) {
                return Ok(FileStat {
                    size: 0,
                    modified: *created,
                    is_dir: true,
                });
            }
            Err(not_found(&path))
        })
    }

    fn open_read(
        &self,
        path: &Path,
        range: Option<(u64, u64)>,
    ) -> Pin<Box<dyn Future<Output = io::Result<ByteStream>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let state = self.lock();
            let file = state.files.get(&path).ok_or_else(|| not_found(&path))?;
            let data = match range {
                Some((start, end)) => {
                    let len = file.data.len() as u64;
                    if start >= len {
                        return Err(io::Error::new(
                            io::ErrorKind::InvalidInput,
                            "range start beyond end of file",
                        ));
                    }
                    let end = end.min(len - 1);
                    file.data.slice(start as usize..(end + 1) as usize)
                }
                None => file.data.clone(),
            };
            Ok(bytes_stream(data))
        })
    }

    fn write_atomic(
        &self,
        path: &Path,
        mut data: ByteStream,
    ) -> Pin<Box<dyn Future<Output = io::Result<u64>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            // Drain the stream fully before touching shared state; a
            // mid-stream failure therefore publishes nothing.
            let mut buf = Vec::new();
            while let Some(chunk) = data.next().await {
                buf.extend_from_slice(&chunk?);
            }

            let mut state = self.lock();
            let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
            if !parent.as_os_str().is_empty() && !state.dirs.contains_key(&parent) {
                return Err(not_found(&parent));
            }
            let written = buf.len() as u64;
            state.files.insert(
                path,
                MemFile {
                    data: Bytes::from(buf),
                    modified: SystemTime::now(),
                },
            );
            Ok(written)
        })
    }

    fn remove(&self, path: &Path) -> Pin<Box<dyn Future<Output = io::Result<()>> + Send + '_>> {
        let path = path.to_path_buf();
        Box::pin(async move {
            let mut state = self.lock();
            state
                .files
                .remove(&path)
                .map(|_| ())
                .ok_or_else(|| not_found(&path))
        })
    }
}

// ── Tests ───────────────────────────────────────────────────────────
