//! In-process source and sink.
//!
//! `MemorySource` and `MemorySink` implement the collaborator traits without a
//! network. They back the test suite and are handy for wiring checks; the sink
//! keeps S3's put semantics (whole object or nothing, overwrite on re-put,
//! missing bucket rejected).

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;
use log::debug;

use crate::cloud::sink::{ObjectBody, ObjectStoreSink, SinkError};
use crate::cloud::source::{RemoteFile, RemoteFileSource, SourceError};

/// Reader that serves `content` up to `fail_after` bytes and then fails,
/// mimicking a connection dropped mid-transfer.
#[derive(Debug)]
pub struct FailingReader {
    content: Cursor<Vec<u8>>,
    fail_after: u64,
}

impl FailingReader {
    pub fn new(content: Vec<u8>, fail_after: u64) -> Self {
        Self {
            content: Cursor::new(content),
            fail_after,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.fail_after.saturating_sub(self.content.position());
        if remaining == 0 {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }

        let limit = buf.len().min(remaining as usize);
        self.content.read(&mut buf[..limit])
    }
}

#[derive(Clone, Debug)]
struct MemoryFile {
    content: Vec<u8>,
    fail_after: Option<u64>,
}

/// A remote file source backed by a map of paths to contents.
#[derive(Debug, Default)]
pub struct MemorySource {
    files: Mutex<HashMap<String, MemoryFile>>,
    opens: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) a file
    pub fn with_file(self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        self.put_file(path, content);
        self
    }

    /// Add a file whose reads fail after `fail_after` bytes
    pub fn with_failing_file(self, path: &str, content: impl Into<Vec<u8>>, fail_after: u64) -> Self {
        self.lock_files().insert(
            path.to_string(),
            MemoryFile {
                content: content.into(),
                fail_after: Some(fail_after),
            },
        );
        self
    }

    pub fn put_file(&self, path: &str, content: impl Into<Vec<u8>>) {
        self.lock_files().insert(
            path.to_string(),
            MemoryFile {
                content: content.into(),
                fail_after: None,
            },
        );
    }

    pub fn remove_file(&self, path: &str) -> bool {
        self.lock_files().remove(path).is_some()
    }

    /// Number of read channels opened so far
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, HashMap<String, MemoryFile>> {
        // A poisoned map is still a usable map for a test double
        self.files.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RemoteFileSource for MemorySource {
    fn describe(&self) -> String {
        "memory://source".to_string()
    }

    fn exists(&self, path: &str) -> Result<bool, SourceError> {
        Ok(self.lock_files().contains_key(path))
    }

    fn open_read(&self, path: &str) -> Result<RemoteFile, SourceError> {
        let file = self
            .lock_files()
            .get(path)
            .cloned()
            .ok_or_else(|| SourceError::NotFound(path.to_string()))?;

        self.opens.fetch_add(1, Ordering::SeqCst);
        let size = Some(file.content.len() as u64);

        let reader: Box<dyn Read + Send> = match file.fail_after {
            Some(limit) => Box::new(FailingReader::new(file.content, limit)),
            None => Box::new(Cursor::new(file.content)),
        };

        Ok(RemoteFile::new(reader, size))
    }
}

/// An object store kept in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    buckets: Mutex<BTreeSet<String>>,
    objects: Mutex<BTreeMap<(String, String), Vec<u8>>>,
    puts: AtomicUsize,
    rejection: Mutex<Option<String>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bucket(self, bucket: &str) -> Self {
        self.create_bucket(bucket);
        self
    }

    pub fn create_bucket(&self, bucket: &str) {
        lock(&self.buckets).insert(bucket.to_string());
    }

    /// Remove an empty bucket; returns false if it is missing or not empty
    pub fn delete_bucket(&self, bucket: &str) -> bool {
        let occupied = lock(&self.objects).keys().any(|(b, _)| b == bucket);
        if occupied {
            return false;
        }
        lock(&self.buckets).remove(bucket)
    }

    pub fn has_bucket(&self, bucket: &str) -> bool {
        lock(&self.buckets).contains(bucket)
    }

    /// Make every following put fail with `reason`, as an access-denied store would
    pub fn reject_puts(&self, reason: &str) {
        *lock(&self.rejection) = Some(reason.to_string());
    }

    /// Keys in `bucket` starting with `prefix`, in lexical order
    pub fn list_objects(&self, bucket: &str, prefix: &str) -> Vec<String> {
        lock(&self.objects)
            .keys()
            .filter(|(b, k)| b == bucket && k.starts_with(prefix))
            .map(|(_, k)| k.clone())
            .collect()
    }

    pub fn get_object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        lock(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Number of successful puts so far
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[async_trait]
impl ObjectStoreSink for MemorySink {
    fn describe(&self) -> String {
        "memory://sink".to_string()
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool, SinkError> {
        Ok(self.has_bucket(bucket))
    }

    async fn put_object(&self, bucket: &str, key: &str, body: ObjectBody) -> Result<(), SinkError> {
        if !self.has_bucket(bucket) {
            return Err(SinkError::BucketNotFound(bucket.to_string()));
        }
        if let Some(reason) = lock(&self.rejection).clone() {
            return Err(SinkError::Rejected(reason));
        }

        let expected = body.content_length();
        let content = match body {
            ObjectBody::Stream { mut stream, .. } => {
                let mut content = Vec::new();
                while let Some(chunk) = stream.next().await {
                    content.extend_from_slice(&chunk?);
                }
                content
            }
            ObjectBody::File { path, .. } => tokio::fs::read(&path).await?,
        };

        if let Some(expected) = expected {
            if content.len() as u64 != expected {
                return Err(SinkError::Rejected(format!(
                    "content length {} does not match body of {} bytes",
                    expected,
                    content.len()
                )));
            }
        }

        debug!("Stored {} bytes at memory://{}/{}", content.len(), bucket, key);
        lock(&self.objects).insert((bucket.to_string(), key.to_string()), content);
        self.puts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), SinkError> {
        lock(&self.objects).remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}
