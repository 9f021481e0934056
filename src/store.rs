//! File-backed object store.
//!
//! Buckets are directories under the configured root; an object's body
//! lives at `<root>/<bucket>/<key>` with a JSON metadata sidecar beside
//! it at `<key>.metadata.json`.  Writes stream through an MD5 hasher
//! into an atomic rename, and the sidecar is only published after the
//! body is in place -- the sidecar write is the linearization point for
//! concurrent readers.

use bytes::Bytes;
use chrono::{DateTime, Timelike, Utc};
use futures::{StreamExt, TryStreamExt};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;

use crate::fs::adapter::{bytes_stream, ByteStream, Filesystem, TMP_PREFIX};

/// Suffix of the metadata sidecar files.
pub const METADATA_SUFFIX: &str = ".metadata.json";

/// Default page size for listings.
pub const DEFAULT_MAX_KEYS: usize = 1000;

// ── Types ───────────────────────────────────────────────────────────

/// A bucket: one directory under the root.
#[derive(Debug, Clone)]
pub struct Bucket {
    pub name: String,
    /// Directory mtime stands in for the creation date.
    pub creation_date: DateTime<Utc>,
}

/// One `x-amz-meta-*` header preserved from upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaHeader {
    pub name: String,
    pub value: String,
}

/// Object metadata, persisted verbatim as the JSON sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    /// Original object key.
    pub key: String,
    /// Byte length of the stored body.
    pub size: u64,
    /// Lowercase hex MD5 of the stored body; the unquoted ETag.
    pub md5: String,
    /// Last write time, second resolution.
    pub modified_date: DateTime<Utc>,
    /// MIME type from upload.
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_disposition: Option<String>,
    /// `x-amz-meta-*` headers in upload order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_meta_data: Vec<MetaHeader>,
}

/// Headers an upload (or metadata-replacing copy) carries into the store.
#[derive(Debug, Clone, Default)]
pub struct ObjectAttrs {
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub content_disposition: Option<String>,
    pub custom_meta_data: Vec<MetaHeader>,
}

impl From<&ObjectMeta> for ObjectAttrs {
    fn from(meta: &ObjectMeta) -> Self {
        ObjectAttrs {
            content_type: Some(meta.content_type.clone()),
            content_encoding: meta.content_encoding.clone(),
            content_disposition: meta.content_disposition.clone(),
            custom_meta_data: meta.custom_meta_data.clone(),
        }
    }
}

/// Listing parameters, per S3 list-objects semantics.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub prefix: Option<String>,
    pub marker: Option<String>,
    pub max_keys: usize,
    pub delimiter: Option<String>,
}

impl Default for ListOptions {
    fn default() -> Self {
        ListOptions {
            prefix: None,
            marker: None,
            max_keys: DEFAULT_MAX_KEYS,
            delimiter: None,
        }
    }
}

/// A page of listing results.
#[derive(Debug, Default)]
pub struct Listing {
    pub objects: Vec<ObjectMeta>,
    pub common_prefixes: Vec<String>,
    pub is_truncated: bool,
}

/// An opened object: metadata, the resolved range (if any) and a
/// one-shot body stream over exactly that window.
pub struct ObjectRead {
    pub meta: ObjectMeta,
    pub range: Option<(u64, u64)>,
    pub body: ByteStream,
}

/// Store-level failures, translated to S3 errors by the handlers.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("entry not found")]
    NotFound,
    #[error("bucket is not empty")]
    BucketNotEmpty,
    #[error("invalid object key")]
    InvalidKey,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("metadata sidecar unreadable: {0}")]
    Metadata(#[from] serde_json::Error),
}

fn map_io(err: io::Error) -> StoreError {
    match err.kind() {
        io::ErrorKind::NotFound => StoreError::NotFound,
        io::ErrorKind::DirectoryNotEmpty => StoreError::BucketNotEmpty,
        _ => StoreError::Io(err),
    }
}

/// Current time truncated to whole seconds, matching the resolution of
/// `Last-Modified` and `If-Modified-Since`.
fn now_second_precision() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(0).unwrap_or(now)
}

async fn collect_stream(mut stream: ByteStream) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        buf.extend_from_slice(&chunk?);
    }
    Ok(buf)
}

// ── Store ───────────────────────────────────────────────────────────

/// The bucket/key namespace over a [`Filesystem`].
pub struct ObjectStore {
    root: PathBuf,
    fs: Arc<dyn Filesystem>,
}

impl ObjectStore {
    pub fn new(root: impl Into<PathBuf>, fs: Arc<dyn Filesystem>) -> Self {
        ObjectStore {
            root: root.into(),
            fs,
        }
    }

    /// Ensure the root directory exists.
    pub async fn init(&self) -> Result<(), StoreError> {
        self.fs.mkdir(&self.root).await.map_err(map_io)
    }

    fn bucket_path(&self, bucket: &str) -> PathBuf {
        self.root.join(bucket)
    }

    /// Map a key onto its body and sidecar paths, rejecting traversal.
    fn object_paths(&self, bucket: &str, key: &str) -> Result<(PathBuf, PathBuf), StoreError> {
        let mut body = self.bucket_path(bucket);
        let mut segments = 0;
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            if segment == ".." {
                return Err(StoreError::InvalidKey);
            }
            body.push(segment);
            segments += 1;
        }
        if segments == 0 {
            return Err(StoreError::InvalidKey);
        }
        let mut sidecar = body.clone().into_os_string();
        sidecar.push(METADATA_SUFFIX);
        Ok((body, PathBuf::from(sidecar)))
    }

    // ── Buckets ─────────────────────────────────────────────────────

    /// Look up a bucket by name; the directory mtime is its creation date.
    pub async fn get_bucket(&self, name: &str) -> Result<Option<Bucket>, StoreError> {
        match self.fs.stat(&self.bucket_path(name)).await {
            Ok(stat) if stat.is_dir => Ok(Some(Bucket {
                name: name.to_string(),
                creation_date: DateTime::<Utc>::from(stat.modified),
            })),
            Ok(_) => Ok(None),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// List all buckets, sorted by name.
    pub async fn get_buckets(&self) -> Result<Vec<Bucket>, StoreError> {
        let entries = self.fs.read_dir(&self.root).await.map_err(map_io)?;
        let mut buckets = Vec::new();
        for entry in entries {
            if !entry.is_dir {
                continue;
            }
            if let Some(bucket) = self.get_bucket(&entry.name).await? {
                buckets.push(bucket);
            }
        }
        buckets.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(buckets)
    }

    /// Create a bucket directory.  The caller checks for prior existence.
    pub async fn put_bucket(&self, name: &str) -> Result<(), StoreError> {
        self.fs.mkdir(&self.bucket_path(name)).await.map_err(map_io)
    }

    /// Remove a bucket; fails with [`StoreError::BucketNotEmpty`] if it
    /// still holds anything.
    pub async fn delete_bucket(&self, name: &str) -> Result<(), StoreError> {
        let path = self.bucket_path(name);
        let entries = self.fs.read_dir(&path).await.map_err(map_io)?;
        if !entries.is_empty() {
            return Err(StoreError::BucketNotEmpty);
        }
        self.fs.rmdir(&path).await.map_err(map_io)
    }

    // ── Objects ─────────────────────────────────────────────────────

    /// Stat-only existence check on the object body.
    pub async fn object_exists(&self, bucket: &str, key: &str) -> Result<bool, StoreError> {
        let (body, _) = self.object_paths(bucket, key)?;
        match self.fs.stat(&body).await {
            Ok(stat) => Ok(!stat.is_dir),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn read_meta(&self, sidecar: &Path) -> Result<Option<ObjectMeta>, StoreError> {
        let stream = match self.fs.open_read(sidecar, None).await {
            Ok(stream) => stream,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let raw = collect_stream(stream).await?;
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Open an object for reading.  `range` is `(start, optional end)`
    /// straight from the Range header; the returned range is clamped to
    /// the object size.  An unsatisfiable range degrades to a full read.
    pub async fn get_object(
        &self,
        bucket: &str,
        key: &str,
        range: Option<(u64, Option<u64>)>,
    ) -> Result<Option<ObjectRead>, StoreError> {
        let (body_path, sidecar) = self.object_paths(bucket, key)?;
        let meta = match self.read_meta(&sidecar).await? {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let resolved = range.and_then(|(start, end)| {
            if meta.size == 0 || start >= meta.size {
                return None;
            }
            let end = end.map_or(meta.size - 1, |e| e.min(meta.size - 1));
            (start <= end).then_some((start, end))
        });

        let body = match self.fs.open_read(&body_path, resolved).await {
            Ok(stream) => stream,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        Ok(Some(ObjectRead {
            meta,
            range: resolved,
            body,
        }))
    }

    /// Store an object: stream the body through an MD5 hasher into an
    /// atomic write, then publish the sidecar.  A failed upload leaves
    /// no sidecar behind, so readers never see a half-written object.
    pub async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        attrs: ObjectAttrs,
        body: ByteStream,
    ) -> Result<ObjectMeta, StoreError> {
        let (body_path, sidecar) = self.object_paths(bucket, key)?;
        if let Some(parent) = body_path.parent() {
            self.fs.mkdir(parent).await.map_err(map_io)?;
        }

        let hasher = Arc::new(Mutex::new(Md5::new()));
        let tee = hasher.clone();
        let hashed: ByteStream = Box::pin(body.inspect_ok(move |chunk: &Bytes| {
            tee.lock().expect("md5 hasher lock").update(chunk);
        }));

        let size = self.fs.write_atomic(&body_path, hashed).await?;
        let md5 = hex::encode(hasher.lock().expect("md5 hasher lock").clone().finalize());

        let meta = ObjectMeta {
            key: key.to_string(),
            size,
            md5,
            modified_date: now_second_precision(),
            content_type: attrs
                .content_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            content_encoding: attrs.content_encoding,
            content_disposition: attrs.content_disposition,
            custom_meta_data: attrs.custom_meta_data,
        };

        let raw = serde_json::to_vec(&meta)?;
        self.fs
            .write_atomic(&sidecar, bytes_stream(Bytes::from(raw)))
            .await?;

        Ok(meta)
    }

    /// Copy an object by streaming the source body into a fresh put at
    /// the destination.  Metadata comes from `new_attrs` when
    /// `replace_metadata` is set, otherwise from the source sidecar;
    /// the MD5 and modification date are recomputed either way.
    /// Returns `None` when the source object does not exist.
    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
        replace_metadata: bool,
        new_attrs: ObjectAttrs,
    ) -> Result<Option<ObjectMeta>, StoreError> {
        let (src_body, src_sidecar) = self.object_paths(src_bucket, src_key)?;
        let src_meta = match self.read_meta(&src_sidecar).await? {
            Some(meta) => meta,
            None => return Ok(None),
        };

        let attrs = if replace_metadata {
            new_attrs
        } else {
            ObjectAttrs::from(&src_meta)
        };

        let body = match self.fs.open_read(&src_body, None).await {
            Ok(stream) => stream,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let meta = self.put_object(dst_bucket, dst_key, attrs, body).await?;
        Ok(Some(meta))
    }

    /// Remove an object: sidecar first, so a concurrent reader resolves
    /// to a clean miss, then the body.  Errors if the body is absent.
    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), StoreError> {
        let (body, sidecar) = self.object_paths(bucket, key)?;
        match self.fs.remove(&sidecar).await {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        self.fs.remove(&body).await.map_err(map_io)
    }

    // ── Listing ─────────────────────────────────────────────────────

    /// Collect every key in the bucket, lexicographically sorted.
    /// Sidecars and in-flight temporaries are invisible.
    async fn walk_keys(&self, bucket: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut stack = vec![(self.bucket_path(bucket), String::new())];

        while let Some((dir, key_prefix)) = stack.pop() {
            let entries = self.fs.read_dir(&dir).await.map_err(map_io)?;
            for entry in entries {
                if entry.name.starts_with(TMP_PREFIX) || entry.name.ends_with(METADATA_SUFFIX) {
                    continue;
                }
                let key = if key_prefix.is_empty() {
                    entry.name.clone()
                } else {
                    format!("{key_prefix}/{}", entry.name)
                };
                if entry.is_dir {
                    stack.push((dir.join(&entry.name), key));
                } else {
                    keys.push(key);
                }
            }
        }

        keys.sort();
        Ok(keys)
    }

    /// List objects in a bucket with prefix/marker/delimiter paging.
    ///
    /// Keys at or before the marker are skipped; with a delimiter, keys
    /// sharing a `prefix + segment + delimiter` head collapse into one
    /// common prefix.  At most `max_keys` objects plus prefixes are
    /// returned, with `is_truncated` set when more remained.
    pub async fn list_objects(
        &self,
        bucket: &str,
        options: &ListOptions,
    ) -> Result<Listing, StoreError> {
        let keys = self.walk_keys(bucket).await?;

        let prefix = options.prefix.as_deref().unwrap_or("");
        let marker = options.marker.as_deref();
        let delimiter = options.delimiter.as_deref();

        let mut listing = Listing::default();
        let mut seen_prefixes: HashSet<String> = HashSet::new();
        let mut count = 0usize;

        for key in &keys {
            if let Some(marker) = marker {
                if key.as_str() <= marker {
                    continue;
                }
            }
            if !key.starts_with(prefix) {
                continue;
            }

            if let Some(delimiter) = delimiter {
                if let Some(idx) = key[prefix.len()..].find(delimiter) {
                    let end = prefix.len() + idx + delimiter.len();
                    let common = &key[..end];
                    if seen_prefixes.contains(common) {
                        continue;
                    }
                    if count == options.max_keys {
                        listing.is_truncated = true;
                        break;
                    }
                    seen_prefixes.insert(common.to_string());
                    listing.common_prefixes.push(common.to_string());
                    count += 1;
                    continue;
                }
            }

            if count == options.max_keys {
                listing.is_truncated = true;
                break;
            }
            let (_, sidecar) = self.object_paths(bucket, key)?;
            if let Some(meta) = self.read_meta(&sidecar).await? {
                listing.objects.push(meta);
                count += 1;
            }
        }

        Ok(listing)
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::memory::MemoryFilesystem;

    async fn test_store() -> ObjectStore {
        let store = ObjectStore::new("root", Arc::new(MemoryFilesystem::new()));
        store.init().await.unwrap();
        store
    }

    async fn put(store: &ObjectStore, bucket: &str, key: &str, body: &str) -> ObjectMeta {
        store
            .put_object(
                bucket,
                key,
                ObjectAttrs::default(),
                bytes_stream(Bytes::from(body.to_string())),
            )
            .await
            .unwrap()
    }

    async fn read_body(read: ObjectRead) -> Vec<u8> {
        collect_stream(read.body).await.unwrap()
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let store = test_store().await;
        assert!(store.get_bucket("foo").await.unwrap().is_none());

        store.put_bucket("foo").await.unwrap();
        let bucket = store.get_bucket("foo").await.unwrap().unwrap();
        assert_eq!(bucket.name, "foo");

        let buckets = store.get_buckets().await.unwrap();
        assert_eq!(buckets.len(), 1);

        store.delete_bucket("foo").await.unwrap();
        assert!(store.get_bucket("foo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_bucket_refuses_non_empty() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        assert!(matches!(
            store.delete_bucket("foo").await,
            Err(StoreError::BucketNotEmpty)
        ));
        // Bucket and contents unchanged.
        assert!(store.object_exists("foo", "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_put_object_computes_md5_and_size() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();

        let meta = put(&store, "foo", "a.txt", "hello").await;
        assert_eq!(meta.md5, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(meta.size, 5);
        assert_eq!(meta.content_type, "application/octet-stream");
        assert_eq!(meta.modified_date.nanosecond(), 0);
    }

    #[tokio::test]
    async fn test_put_empty_object() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        let meta = put(&store, "foo", "empty", "").await;
        assert_eq!(meta.md5, "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(meta.size, 0);
    }

    #[tokio::test]
    async fn test_get_object_roundtrip() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        let read = store.get_object("foo", "a.txt", None).await.unwrap().unwrap();
        assert_eq!(read.meta.key, "a.txt");
        assert!(read.range.is_none());
        assert_eq!(read_body(read).await, b"hello");
    }

    #[tokio::test]
    async fn test_get_object_with_range() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        let read = store
            .get_object("foo", "a.txt", Some((1, Some(3))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.range, Some((1, 3)));
        assert_eq!(read_body(read).await, b"ell");
    }

    #[tokio::test]
    async fn test_get_object_open_ended_range_clamps() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        let read = store
            .get_object("foo", "a.txt", Some((2, None)))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.range, Some((2, 4)));
        assert_eq!(read_body(read).await, b"llo");

        let read = store
            .get_object("foo", "a.txt", Some((0, Some(999))))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.range, Some((0, 4)));
    }

    #[tokio::test]
    async fn test_unsatisfiable_range_degrades_to_full_read() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        let read = store
            .get_object("foo", "a.txt", Some((99, None)))
            .await
            .unwrap()
            .unwrap();
        assert!(read.range.is_none());
        assert_eq!(read_body(read).await, b"hello");
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        assert!(store.get_object("foo", "nope", None).await.unwrap().is_none());
        assert!(!store.object_exists("foo", "nope").await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_keys() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a/b/c.txt", "nested").await;

        assert!(store.object_exists("foo", "a/b/c.txt").await.unwrap());
        let read = store
            .get_object("foo", "a/b/c.txt", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.meta.key, "a/b/c.txt");
        assert_eq!(read_body(read).await, b"nested");
    }

    #[tokio::test]
    async fn test_traversal_is_rejected() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        assert!(matches!(
            store.object_exists("foo", "../escape").await,
            Err(StoreError::InvalidKey)
        ));
    }

    #[tokio::test]
    async fn test_overwrite_replaces_body_and_metadata() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        let first = put(&store, "foo", "a.txt", "version 1").await;
        let second = put(&store, "foo", "a.txt", "version 2!").await;

        assert_ne!(first.md5, second.md5);
        let read = store.get_object("foo", "a.txt", None).await.unwrap().unwrap();
        assert_eq!(read.meta.md5, second.md5);
        assert_eq!(read.meta.size, 10);
        assert_eq!(read_body(read).await, b"version 2!");
    }

    #[tokio::test]
    async fn test_put_preserves_headers() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        let attrs = ObjectAttrs {
            content_type: Some("text/plain".to_string()),
            content_encoding: Some("gzip".to_string()),
            content_disposition: Some("attachment".to_string()),
            custom_meta_data: vec![MetaHeader {
                name: "x-amz-meta-owner".to_string(),
                value: "tests".to_string(),
            }],
        };
        store
            .put_object("foo", "a.txt", attrs, bytes_stream(Bytes::from("x")))
            .await
            .unwrap();

        let meta = store
            .get_object("foo", "a.txt", None)
            .await
            .unwrap()
            .unwrap()
            .meta;
        assert_eq!(meta.content_type, "text/plain");
        assert_eq!(meta.content_encoding.as_deref(), Some("gzip"));
        assert_eq!(meta.content_disposition.as_deref(), Some("attachment"));
        assert_eq!(meta.custom_meta_data.len(), 1);
        assert_eq!(meta.custom_meta_data[0].name, "x-amz-meta-owner");
    }

    #[tokio::test]
    async fn test_copy_preserves_source_metadata() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        let attrs = ObjectAttrs {
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        };
        let src = store
            .put_object("foo", "a.txt", attrs, bytes_stream(Bytes::from("hello")))
            .await
            .unwrap();

        let copied = store
            .copy_object("foo", "a.txt", "foo", "b.txt", false, ObjectAttrs::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(copied.md5, src.md5);
        assert_eq!(copied.content_type, "text/plain");
        assert!(copied.modified_date >= src.modified_date);

        let read = store.get_object("foo", "b.txt", None).await.unwrap().unwrap();
        assert_eq!(read_body(read).await, b"hello");
        // Source untouched.
        assert!(store.object_exists("foo", "a.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_copy_with_replaced_metadata() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        store.put_bucket("bar").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        let replacement = ObjectAttrs {
            content_type: Some("text/html".to_string()),
            custom_meta_data: vec![MetaHeader {
                name: "x-amz-meta-copied".to_string(),
                value: "yes".to_string(),
            }],
            ..Default::default()
        };
        let copied = store
            .copy_object("foo", "a.txt", "bar", "b.txt", true, replacement)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(copied.content_type, "text/html");
        assert_eq!(copied.custom_meta_data[0].value, "yes");
        assert_eq!(copied.md5, "5d41402abc4b2a76b9719d911017c592");
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        let result = store
            .copy_object("foo", "nope", "foo", "b.txt", false, ObjectAttrs::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_object() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        store.delete_object("foo", "a.txt").await.unwrap();
        assert!(!store.object_exists("foo", "a.txt").await.unwrap());
        assert!(store.get_object("foo", "a.txt", None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_missing_object_errors() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        assert!(matches!(
            store.delete_object("foo", "nope").await,
            Err(StoreError::NotFound)
        ));
    }

    async fn listing_fixture() -> ObjectStore {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        for key in [
            "a.txt",
            "b.txt",
            "photos/2025/jan.jpg",
            "photos/2025/feb.jpg",
            "photos/2026/mar.jpg",
            "zebra.txt",
        ] {
            put(&store, "foo", key, "data").await;
        }
        store
    }

    #[tokio::test]
    async fn test_list_all_keys_sorted() {
        let store = listing_fixture().await;
        let listing = store
            .list_objects("foo", &ListOptions::default())
            .await
            .unwrap();
        let keys: Vec<&str> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "a.txt",
                "b.txt",
                "photos/2025/feb.jpg",
                "photos/2025/jan.jpg",
                "photos/2026/mar.jpg",
                "zebra.txt"
            ]
        );
        assert!(!listing.is_truncated);
        assert!(listing.common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_list_with_prefix() {
        let store = listing_fixture().await;
        let options = ListOptions {
            prefix: Some("photos/2025/".to_string()),
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        assert_eq!(listing.objects.len(), 2);
        assert!(listing
            .objects
            .iter()
            .all(|o| o.key.starts_with("photos/2025/")));
    }

    #[tokio::test]
    async fn test_list_with_delimiter_collapses_prefixes() {
        let store = listing_fixture().await;
        let options = ListOptions {
            delimiter: Some("/".to_string()),
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        let keys: Vec<&str> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt", "b.txt", "zebra.txt"]);
        assert_eq!(listing.common_prefixes, vec!["photos/"]);
    }

    #[tokio::test]
    async fn test_list_prefix_and_delimiter() {
        let store = listing_fixture().await;
        let options = ListOptions {
            prefix: Some("photos/".to_string()),
            delimiter: Some("/".to_string()),
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        assert!(listing.objects.is_empty());
        assert_eq!(listing.common_prefixes, vec!["photos/2025/", "photos/2026/"]);
    }

    #[tokio::test]
    async fn test_list_with_marker() {
        let store = listing_fixture().await;
        let options = ListOptions {
            marker: Some("b.txt".to_string()),
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        // Keys <= marker are skipped.
        assert_eq!(listing.objects[0].key, "photos/2025/feb.jpg");
        assert_eq!(listing.objects.len(), 4);
    }

    #[tokio::test]
    async fn test_list_truncation() {
        let store = listing_fixture().await;
        let options = ListOptions {
            max_keys: 2,
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        assert_eq!(listing.objects.len(), 2);
        assert!(listing.is_truncated);

        let options = ListOptions {
            max_keys: 6,
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        assert_eq!(listing.objects.len(), 6);
        assert!(!listing.is_truncated);
    }

    #[tokio::test]
    async fn test_list_counts_prefixes_toward_max_keys() {
        let store = listing_fixture().await;
        let options = ListOptions {
            delimiter: Some("/".to_string()),
            max_keys: 3,
            ..Default::default()
        };
        let listing = store.list_objects("foo", &options).await.unwrap();
        assert_eq!(listing.objects.len() + listing.common_prefixes.len(), 3);
        assert!(listing.is_truncated);
    }

    #[tokio::test]
    async fn test_sidecars_and_temporaries_invisible_in_listing() {
        let store = test_store().await;
        store.put_bucket("foo").await.unwrap();
        put(&store, "foo", "a.txt", "hello").await;

        let listing = store
            .list_objects("foo", &ListOptions::default())
            .await
            .unwrap();
        let keys: Vec<&str> = listing.objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a.txt"]);
    }
}
