use std::fmt;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use log::{debug, info, warn};

use crate::cloud::resolver::ConnectionResolver;
use crate::cloud::sink::{ObjectBody, ObjectStoreSink, SinkError};
use crate::cloud::source::{RemoteFile, RemoteFileSource, SourceError};
use crate::cloud::streaming::reader_stream;
use crate::constants::STREAM_CHUNK_SIZE;
use crate::models::{TransferMode, TransferOutcome, TransferReport};
use crate::transfer::error::TransferError;
use crate::transfer::request::TransferRequest;
use crate::transfer::staging::stage_remote_file;
use crate::utils::hash::sha256_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransferState {
    Init,
    SourceChecked,
    Skipped,
    Reading,
    Staged,
    Uploaded,
    Done,
    Failed,
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransferState::Init => "init",
            TransferState::SourceChecked => "source-checked",
            TransferState::Skipped => "skipped",
            TransferState::Reading => "reading",
            TransferState::Staged => "staged",
            TransferState::Uploaded => "uploaded",
            TransferState::Done => "done",
            TransferState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one execution's progress for the debug log
struct Progress<'a> {
    sftp_path: &'a str,
    state: TransferState,
}

impl<'a> Progress<'a> {
    fn new(sftp_path: &'a str, state: TransferState) -> Self {
        Self { sftp_path, state }
    }

    fn advance(&mut self, next: TransferState) {
        debug!("{}: {} -> {}", self.sftp_path, self.state, next);
        self.state = next;
    }
}

/// Copies one SFTP file into one S3 object.
///
/// The remote path is checked when the task is built. A task can be executed
/// more than once; each execution overwrites the destination object.
pub struct TransferTask {
    request: TransferRequest,
    source: Arc<dyn RemoteFileSource>,
    sink: Arc<dyn ObjectStoreSink>,
    source_missing: bool,
}

impl fmt::Debug for TransferTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferTask")
            .field("request", &self.request)
            .field("source", &self.source.describe())
            .field("source_missing", &self.source_missing)
            .finish_non_exhaustive()
    }
}

impl TransferTask {
    /// Resolve both connections and check the remote path.
    ///
    /// The sink connection is only resolved once the remote path has been
    /// checked. Blocking: the SFTP session is opened here.
    pub fn new(request: TransferRequest, resolver: &dyn ConnectionResolver) -> Result<Self, TransferError> {
        let source = resolver.remote_source(request.sftp_conn_id())?;
        let exists = check_source(&request, source.as_ref())?;
        let sink = resolver.object_sink(request.s3_conn_id())?;
        Ok(Self::assemble(request, source, sink, exists))
    }

    /// Build a task over already constructed clients.
    ///
    /// Fails with [`TransferError::SourceNotFound`] when the remote path is
    /// missing and the request does not tolerate that. The sink is not used.
    pub fn with_clients(
        request: TransferRequest,
        source: Arc<dyn RemoteFileSource>,
        sink: Arc<dyn ObjectStoreSink>,
    ) -> Result<Self, TransferError> {
        let exists = check_source(&request, source.as_ref())?;
        Ok(Self::assemble(request, source, sink, exists))
    }

    fn assemble(
        request: TransferRequest,
        source: Arc<dyn RemoteFileSource>,
        sink: Arc<dyn ObjectStoreSink>,
        exists: bool,
    ) -> Self {
        debug!(
            "Prepared transfer {}{} -> s3://{}/{}",
            source.describe(),
            request.sftp_path(),
            request.s3_bucket(),
            request.s3_key()
        );

        Self {
            request,
            source,
            sink,
            source_missing: !exists,
        }
    }

    pub fn request(&self) -> &TransferRequest {
        &self.request
    }

    /// Copy the file, returning `Skipped` when it was missing and tolerated.
    pub async fn execute(&self) -> Result<TransferOutcome, TransferError> {
        let mut progress = Progress::new(self.request.sftp_path(), TransferState::SourceChecked);

        if self.source_missing {
            return Ok(self.skip(&mut progress));
        }

        let result = self.run(&mut progress).await;

        match &result {
            Ok(TransferOutcome::Transferred(report)) => {
                progress.advance(TransferState::Done);
                info!(
                    "Transferred {} to s3://{}/{} ({} bytes, {}, {} ms)",
                    report.sftp_path, report.bucket, report.key, report.bytes, report.mode, report.elapsed_ms
                );
            }
            Ok(TransferOutcome::Skipped { .. }) => {}
            Err(e) => {
                progress.advance(TransferState::Failed);
                warn!("Transfer of {} failed: {}", self.request.sftp_path(), e);
            }
        }

        result
    }

    fn skip(&self, progress: &mut Progress<'_>) -> TransferOutcome {
        progress.advance(TransferState::Skipped);
        info!(
            "File {} not found on {}, skipping upload",
            self.request.sftp_path(),
            self.source.describe()
        );
        progress.advance(TransferState::Done);

        TransferOutcome::Skipped {
            sftp_path: self.request.sftp_path().to_string(),
        }
    }

    async fn run(&self, progress: &mut Progress<'_>) -> Result<TransferOutcome, TransferError> {
        let started = Instant::now();
        let started_at = Utc::now().to_rfc3339();
        let bucket = self.request.s3_bucket();
        let key = self.request.s3_key();

        match self.sink.bucket_exists(bucket).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(TransferError::sink_write(
                    bucket,
                    key,
                    SinkError::BucketNotFound(bucket.to_string()),
                ))
            }
            Err(e) => return Err(TransferError::sink_write(bucket, key, e)),
        }

        progress.advance(TransferState::Reading);

        let remote = match self.open_remote().await {
            Ok(remote) => remote,
            // Removed between the construction check and now
            Err(TransferError::SourceNotFound(_)) if !self.request.fail_on_file_not_exist() => {
                return Ok(self.skip(progress));
            }
            Err(e) => return Err(e),
        };

        let (bytes, sha256, mode) = if self.request.use_temp_file() {
            let (bytes, digest) = self.upload_staged(remote, progress).await?;
            (bytes, Some(digest), TransferMode::Staged)
        } else {
            (self.upload_direct(remote).await?, None, TransferMode::Direct)
        };

        progress.advance(TransferState::Uploaded);

        Ok(TransferOutcome::Transferred(TransferReport {
            sftp_path: self.request.sftp_path().to_string(),
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes,
            mode,
            sha256,
            started_at,
            elapsed_ms: started.elapsed().as_millis() as u64,
        }))
    }

    async fn open_remote(&self) -> Result<RemoteFile, TransferError> {
        let source = Arc::clone(&self.source);
        let path = self.request.sftp_path().to_string();

        tokio::task::spawn_blocking(move || source.open_read(&path))
            .await
            .map_err(|e| {
                TransferError::source_read(
                    self.request.sftp_path(),
                    SourceError::Protocol(format!("open task failed: {}", e)),
                )
            })?
            .map_err(|e| TransferError::source_read(self.request.sftp_path(), e))
    }

    /// Stream straight from the read channel into a single put.
    async fn upload_direct(&self, remote: RemoteFile) -> Result<u64, TransferError> {
        let bucket = self.request.s3_bucket();
        let key = self.request.s3_key();
        let expected = remote.size;

        let (stream, monitor) = reader_stream(remote.reader, STREAM_CHUNK_SIZE);
        let body = ObjectBody::Stream { stream, content_length: expected };

        let put_result = self.sink.put_object(bucket, key, body).await;
        let summary = monitor.finish().await;

        if let Some(error) = summary.error {
            if put_result.is_ok() {
                self.discard_partial_object().await;
            }
            return Err(TransferError::source_read(self.request.sftp_path(), SourceError::Io(error)));
        }

        put_result.map_err(|e| TransferError::sink_write(bucket, key, e))?;

        if let Some(expected) = expected {
            if summary.bytes_read != expected {
                self.discard_partial_object().await;
                return Err(TransferError::source_read(
                    self.request.sftp_path(),
                    SourceError::SizeMismatch { expected, actual: summary.bytes_read },
                ));
            }
        }

        Ok(summary.bytes_read)
    }

    /// Copy into a staging file, then put the finished file.
    async fn upload_staged(
        &self,
        remote: RemoteFile,
        progress: &mut Progress<'_>,
    ) -> Result<(u64, String), TransferError> {
        let bucket = self.request.s3_bucket();
        let key = self.request.s3_key();
        let sftp_path = self.request.sftp_path().to_string();
        let staging_dir = self.request.staging_dir().map(|d| d.to_path_buf());

        let staged = tokio::task::spawn_blocking(move || {
            stage_remote_file(remote, &sftp_path, staging_dir.as_deref())
        })
        .await
        .map_err(|e| {
            TransferError::staging(
                self.request.sftp_path(),
                io::Error::new(io::ErrorKind::Other, format!("staging task failed: {}", e)),
            )
        })??;

        progress.advance(TransferState::Staged);

        let local_path = staged.path().to_path_buf();
        let digest = {
            let path = local_path.clone();
            tokio::task::spawn_blocking(move || sha256_file(&path))
                .await
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
                .and_then(|r| r)
                .map_err(|e| TransferError::staging(&local_path.display().to_string(), e))?
        };

        debug!("Staged copy of {} has sha256 {}", self.request.sftp_path(), digest);

        let body = ObjectBody::File {
            path: local_path,
            content_length: staged.len(),
        };

        self.sink
            .put_object(bucket, key, body)
            .await
            .map_err(|e| TransferError::sink_write(bucket, key, e))?;

        let bytes = staged.len();
        drop(staged);

        Ok((bytes, digest))
    }

    /// Remove an object whose body turned out to be incomplete.
    async fn discard_partial_object(&self) {
        let bucket = self.request.s3_bucket();
        let key = self.request.s3_key();

        warn!("Removing incomplete object s3://{}/{}", bucket, key);
        if let Err(e) = self.sink.delete_object(bucket, key).await {
            warn!("Failed to remove incomplete object s3://{}/{}: {}", bucket, key, e);
        }
    }
}

/// Check the remote path; `Ok(false)` means missing but tolerated.
fn check_source(request: &TransferRequest, source: &dyn RemoteFileSource) -> Result<bool, TransferError> {
    let mut progress = Progress::new(request.sftp_path(), TransferState::Init);

    let exists = source
        .exists(request.sftp_path())
        .map_err(|e| TransferError::source_read(request.sftp_path(), e))?;

    if !exists && request.fail_on_file_not_exist() {
        progress.advance(TransferState::Failed);
        return Err(TransferError::SourceNotFound(request.sftp_path().to_string()));
    }

    progress.advance(TransferState::SourceChecked);
    Ok(exists)
}

/// Build a task for `request` and execute it once.
pub async fn run_transfer(
    request: TransferRequest,
    resolver: &dyn ConnectionResolver,
) -> Result<TransferOutcome, TransferError> {
    TransferTask::new(request, resolver)?.execute().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::memory::{MemorySink, MemorySource};
    use crate::cloud::resolver::{ResolveError, StaticResolver};
    use crate::cloud::sink::MockObjectStoreSink;
    use futures::StreamExt;
    use std::io::Cursor;

    const CSV: &[u8] = b"id,value\n1,10\n2,20\n3,30\n";

    fn request(path: &str, use_temp_file: bool, fail: bool) -> TransferRequest {
        TransferRequest::builder()
            .sftp_path(path)
            .s3_bucket("test-bucket")
            .s3_key("test/test_1_file.csv")
            .use_temp_file(use_temp_file)
            .fail_on_file_not_exist(fail)
            .build()
            .unwrap()
    }

    /// A source whose server announces more bytes than it serves
    struct ShortSource;

    impl RemoteFileSource for ShortSource {
        fn describe(&self) -> String {
            "short://".to_string()
        }

        fn exists(&self, _path: &str) -> Result<bool, SourceError> {
            Ok(true)
        }

        fn open_read(&self, _path: &str) -> Result<RemoteFile, SourceError> {
            Ok(RemoteFile::new(Box::new(Cursor::new(vec![b'x'; 10])), Some(100)))
        }
    }

    /// Drain a streamed body the way an unverifying store would
    fn drain(body: ObjectBody) {
        if let ObjectBody::Stream { mut stream, .. } = body {
            futures::executor::block_on(async move { while stream.next().await.is_some() {} });
        }
    }

    #[test]
    fn test_missing_file_fails_without_touching_sink() {
        // No expectations: any call on the mock panics
        let sink = MockObjectStoreSink::new();
        let result = TransferTask::with_clients(
            request("/tmp/wrong_path.txt", true, true),
            Arc::new(MemorySource::new()),
            Arc::new(sink),
        );

        assert!(matches!(result, Err(TransferError::SourceNotFound(p)) if p == "/tmp/wrong_path.txt"));
    }

    #[tokio::test]
    async fn test_missing_file_skipped_without_touching_sink() {
        let sink = MockObjectStoreSink::new();
        let task = TransferTask::with_clients(
            request("/tmp/wrong_path.txt", true, false),
            Arc::new(MemorySource::new()),
            Arc::new(sink),
        ).unwrap();

        let outcome = task.execute().await.unwrap();
        assert_eq!(outcome, TransferOutcome::Skipped { sftp_path: "/tmp/wrong_path.txt".to_string() });
    }

    #[tokio::test]
    async fn test_missing_bucket_reads_nothing() {
        let source = Arc::new(MemorySource::new().with_file("/upload/a.csv", CSV));
        let mut sink = MockObjectStoreSink::new();
        sink.expect_bucket_exists().times(1).returning(|_| Ok(false));
        sink.expect_put_object().times(0);

        let task = TransferTask::with_clients(
            request("/upload/a.csv", false, true),
            source.clone(),
            Arc::new(sink),
        ).unwrap();

        let error = task.execute().await.unwrap_err();
        assert!(error.is_bucket_not_found());
        assert_eq!(source.open_count(), 0);
    }

    #[tokio::test]
    async fn test_direct_read_failure_discards_accepted_object() {
        let source = MemorySource::new().with_failing_file("/upload/big.bin", vec![5u8; 256 * 1024], 70_000);
        let mut sink = MockObjectStoreSink::new();
        sink.expect_bucket_exists().returning(|_| Ok(true));
        sink.expect_put_object().times(1).returning(|_, _, body| {
            drain(body);
            Ok(())
        });
        sink.expect_delete_object().times(1).returning(|_, _| Ok(()));

        let task = TransferTask::with_clients(
            request("/upload/big.bin", false, true),
            Arc::new(source),
            Arc::new(sink),
        ).unwrap();

        let error = task.execute().await.unwrap_err();
        assert!(matches!(error, TransferError::SourceRead { source: SourceError::Io(_), .. }));
    }

    #[tokio::test]
    async fn test_direct_short_read_discards_object() {
        let mut sink = MockObjectStoreSink::new();
        sink.expect_bucket_exists().returning(|_| Ok(true));
        sink.expect_put_object().times(1).returning(|_, _, body| {
            assert_eq!(body.content_length(), Some(100));
            drain(body);
            Ok(())
        });
        sink.expect_delete_object().times(1).returning(|_, _| Ok(()));

        let task = TransferTask::with_clients(
            request("/upload/short.bin", false, true),
            Arc::new(ShortSource),
            Arc::new(sink),
        ).unwrap();

        let error = task.execute().await.unwrap_err();
        assert!(matches!(
            error,
            TransferError::SourceRead { source: SourceError::SizeMismatch { expected: 100, actual: 10 }, .. }
        ));
    }

    #[tokio::test]
    async fn test_staged_short_read_never_uploads() {
        let mut sink = MockObjectStoreSink::new();
        sink.expect_bucket_exists().returning(|_| Ok(true));
        sink.expect_put_object().times(0);
        sink.expect_delete_object().times(0);

        let task = TransferTask::with_clients(
            request("/upload/short.bin", true, true),
            Arc::new(ShortSource),
            Arc::new(sink),
        ).unwrap();

        assert!(matches!(task.execute().await, Err(TransferError::SourceRead { .. })));
    }

    #[tokio::test]
    async fn test_staged_upload_sends_file_body() {
        let mut sink = MockObjectStoreSink::new();
        sink.expect_bucket_exists().returning(|_| Ok(true));
        sink.expect_put_object().times(1).returning(|bucket, key, body| {
            assert_eq!(bucket, "test-bucket");
            assert_eq!(key, "test/test_1_file.csv");
            match body {
                ObjectBody::File { path, content_length } => {
                    assert_eq!(content_length, CSV.len() as u64);
                    assert_eq!(std::fs::read(path).unwrap(), CSV);
                }
                other => panic!("expected a file body, got {:?}", other),
            }
            Ok(())
        });

        let task = TransferTask::with_clients(
            request("/upload/a.csv", true, true),
            Arc::new(MemorySource::new().with_file("/upload/a.csv", CSV)),
            Arc::new(sink),
        ).unwrap();

        let outcome = task.execute().await.unwrap();
        let report = outcome.report().unwrap();
        assert_eq!(report.mode, TransferMode::Staged);
        assert_eq!(report.bytes, CSV.len() as u64);
        assert_eq!(report.sha256.as_ref().map(|s| s.len()), Some(64));
    }

    #[tokio::test]
    async fn test_file_removed_after_construction() {
        let source = Arc::new(MemorySource::new().with_file("/upload/a.csv", CSV));
        let sink = Arc::new(MemorySink::new().with_bucket("test-bucket"));

        let strict = TransferTask::with_clients(request("/upload/a.csv", true, true), source.clone(), sink.clone()).unwrap();
        let lenient = TransferTask::with_clients(request("/upload/a.csv", true, false), source.clone(), sink.clone()).unwrap();
        source.remove_file("/upload/a.csv");

        assert!(matches!(strict.execute().await, Err(TransferError::SourceNotFound(_))));
        assert!(lenient.execute().await.unwrap().is_skipped());
        assert_eq!(sink.put_count(), 0);
    }

    #[tokio::test]
    async fn test_run_transfer_unknown_connection() {
        let resolver = StaticResolver::new()
            .with_source("ssh_default", Arc::new(MemorySource::new().with_file("/upload/a.csv", CSV)));

        let error = run_transfer(request("/upload/a.csv", true, true), &resolver).await.unwrap_err();
        assert!(matches!(error, TransferError::Connection(ResolveError::Unknown(id)) if id == "aws_default"));
    }

    #[tokio::test]
    async fn test_missing_file_reported_before_sink_connection() {
        // No sink registered: resolving it would fail with a connection error
        let resolver = StaticResolver::new().with_source("ssh_default", Arc::new(MemorySource::new()));

        let error = TransferTask::new(request("/tmp/wrong_path.txt", false, true), &resolver).unwrap_err();
        assert!(matches!(error, TransferError::SourceNotFound(p) if p == "/tmp/wrong_path.txt"));
    }

    #[tokio::test]
    async fn test_direct_put_error_without_draining_body() {
        let content = vec![3u8; 2 * 1024 * 1024];
        let mut sink = MockObjectStoreSink::new();
        sink.expect_bucket_exists().returning(|_| Ok(true));
        sink.expect_put_object()
            .times(1)
            .returning(|_, _, _body| Err(SinkError::Rejected("AccessDenied".to_string())));
        sink.expect_delete_object().times(0);

        let task = TransferTask::with_clients(
            request("/upload/big.bin", false, true),
            Arc::new(MemorySource::new().with_file("/upload/big.bin", content)),
            Arc::new(sink),
        ).unwrap();

        let result = tokio::time::timeout(std::time::Duration::from_secs(10), task.execute())
            .await
            .expect("reader worker did not stop after the body was dropped");

        assert!(matches!(
            result,
            Err(TransferError::SinkWrite { source: SinkError::Rejected(ref m), .. }) if m == "AccessDenied"
        ));
    }

    #[tokio::test]
    async fn test_direct_failure_with_rejecting_store_leaves_nothing() {
        let source = MemorySource::new().with_failing_file("/upload/big.bin", vec![9u8; 200_000], 1000);
        let sink = Arc::new(MemorySink::new().with_bucket("test-bucket"));

        let task = TransferTask::with_clients(
            request("/upload/big.bin", false, true),
            Arc::new(source),
            sink.clone(),
        ).unwrap();

        assert!(matches!(task.execute().await, Err(TransferError::SourceRead { .. })));
        assert!(sink.list_objects("test-bucket", "").is_empty());
    }
}
