//! End-to-end transfer behaviour against the in-process source and sink.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use sftp_to_s3::cloud::memory::{MemorySink, MemorySource};
use sftp_to_s3::cloud::resolver::StaticResolver;
use sftp_to_s3::cloud::sink::SinkError;
use sftp_to_s3::models::{TransferMode, TransferOutcome};
use sftp_to_s3::transfer::{run_transfer, TransferError, TransferRequest, TransferTask};
use sftp_to_s3::utils::hash::sha256_file;

const SFTP_PATH: &str = "/upload/test_1_file.csv";
const WRONG_PATH: &str = "/tmp/wrong_path.txt";
const BUCKET: &str = "test-bucket";
const KEY: &str = "test/test_1_file.csv";

fn csv_content() -> Vec<u8> {
    let mut content = b"id,name,amount\n".to_vec();
    for i in 0..5000 {
        content.extend_from_slice(format!("{},row-{},{}.{:02}\n", i, i, i * 3, i % 100).as_bytes());
    }
    content
}

struct Fixture {
    source: Arc<MemorySource>,
    sink: Arc<MemorySink>,
    resolver: StaticResolver,
}

fn fixture() -> Fixture {
    let source = Arc::new(MemorySource::new().with_file(SFTP_PATH, csv_content()));
    let sink = Arc::new(MemorySink::new().with_bucket(BUCKET));
    let resolver = StaticResolver::new()
        .with_source("ssh_default", source.clone())
        .with_sink("aws_default", sink.clone());

    Fixture { source, sink, resolver }
}

fn request(path: &str, use_temp_file: bool, fail: bool, staging_dir: Option<&Path>) -> TransferRequest {
    let mut builder = TransferRequest::builder()
        .sftp_path(path)
        .s3_bucket(BUCKET)
        .s3_key(KEY)
        .use_temp_file(use_temp_file)
        .fail_on_file_not_exist(fail);

    if let Some(dir) = staging_dir {
        builder = builder.staging_dir(dir);
    }

    builder.build().unwrap()
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

#[tokio::test]
async fn test_both_modes_copy_content_exactly() {
    for use_temp_file in [true, false] {
        let f = fixture();
        let outcome = run_transfer(request(SFTP_PATH, use_temp_file, true, None), &f.resolver)
            .await
            .unwrap();

        let report = outcome.report().unwrap();
        assert_eq!(report.bytes, csv_content().len() as u64);
        assert_eq!(
            report.mode,
            if use_temp_file { TransferMode::Staged } else { TransferMode::Direct }
        );
        assert_eq!(f.sink.get_object(BUCKET, KEY).unwrap(), csv_content());
    }
}

#[tokio::test]
async fn test_listing_shows_exactly_one_object() {
    for use_temp_file in [true, false] {
        let f = fixture();
        run_transfer(request(SFTP_PATH, use_temp_file, true, None), &f.resolver)
            .await
            .unwrap();

        let listed = f.sink.list_objects(BUCKET, KEY);
        assert_eq!(listed, vec![KEY.to_string()]);
    }
}

#[tokio::test]
async fn test_remote_text_file_lists_under_key() {
    let content = b"This is remote file content\nspread over\nthree lines\n".to_vec();

    for use_temp_file in [true, false] {
        let source = Arc::new(MemorySource::new().with_file("/tmp/remote_path.txt", content.clone()));
        let sink = Arc::new(MemorySink::new().with_bucket(BUCKET));

        let task = TransferTask::with_clients(
            request("/tmp/remote_path.txt", use_temp_file, true, None),
            source,
            sink.clone(),
        ).unwrap();
        task.execute().await.unwrap();

        assert_eq!(sink.list_objects(BUCKET, KEY), vec![KEY.to_string()]);
        assert_eq!(sink.get_object(BUCKET, KEY), Some(content.clone()));
    }
}

#[tokio::test]
async fn test_staged_digest_matches_content() {
    let f = fixture();
    let outcome = run_transfer(request(SFTP_PATH, true, true, None), &f.resolver)
        .await
        .unwrap();

    let scratch = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(scratch.path(), csv_content()).unwrap();
    let expected = sha256_file(scratch.path()).unwrap();

    assert_eq!(outcome.report().unwrap().sha256.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_missing_file_fails_before_sink_is_used() {
    for use_temp_file in [true, false] {
        let f = fixture();
        let result = TransferTask::new(request(WRONG_PATH, use_temp_file, true, None), &f.resolver);

        assert!(matches!(result, Err(TransferError::SourceNotFound(ref p)) if p == WRONG_PATH));
        assert_eq!(f.sink.put_count(), 0);
        assert!(f.sink.list_objects(BUCKET, "").is_empty());
        assert_eq!(f.source.open_count(), 0);
    }
}

#[tokio::test]
async fn test_missing_file_tolerated_writes_nothing() {
    for use_temp_file in [true, false] {
        let f = fixture();
        let task = TransferTask::new(request(WRONG_PATH, use_temp_file, false, None), &f.resolver).unwrap();
        let outcome = task.execute().await.unwrap();

        assert_eq!(outcome, TransferOutcome::Skipped { sftp_path: WRONG_PATH.to_string() });
        assert!(f.sink.list_objects(BUCKET, KEY).is_empty());
        assert_eq!(f.sink.put_count(), 0);
    }
}

#[tokio::test]
async fn test_staging_dir_empty_after_success() {
    let f = fixture();
    let staging = tempfile::tempdir().unwrap();

    run_transfer(request(SFTP_PATH, true, true, Some(staging.path())), &f.resolver)
        .await
        .unwrap();

    assert_eq!(entries(staging.path()), 0);
}

#[tokio::test]
async fn test_staging_dir_empty_after_upload_failure() {
    let f = fixture();
    f.sink.reject_puts("AccessDenied");
    let staging = tempfile::tempdir().unwrap();

    let error = run_transfer(request(SFTP_PATH, true, true, Some(staging.path())), &f.resolver)
        .await
        .unwrap_err();

    assert!(matches!(error, TransferError::SinkWrite { source: SinkError::Rejected(_), .. }));
    assert_eq!(entries(staging.path()), 0);
}

#[tokio::test]
async fn test_direct_upload_rejected_by_store() {
    let source = Arc::new(MemorySource::new().with_file(SFTP_PATH, vec![7u8; 5 * 1024 * 1024]));
    let sink = Arc::new(MemorySink::new().with_bucket(BUCKET));
    sink.reject_puts("AccessDenied");

    let task = TransferTask::with_clients(request(SFTP_PATH, false, true, None), source, sink.clone()).unwrap();

    let error = tokio::time::timeout(Duration::from_secs(30), task.execute())
        .await
        .expect("direct transfer hung after the store rejected the put")
        .unwrap_err();

    assert!(matches!(
        error,
        TransferError::SinkWrite { ref bucket, ref key, source: SinkError::Rejected(_) } if bucket == BUCKET && key == KEY
    ));
    assert!(sink.list_objects(BUCKET, "").is_empty());
}

#[tokio::test]
async fn test_staging_dir_empty_after_read_failure() {
    let source = Arc::new(MemorySource::new().with_failing_file(SFTP_PATH, csv_content(), 4096));
    let sink = Arc::new(MemorySink::new().with_bucket(BUCKET));
    let staging = tempfile::tempdir().unwrap();

    let task = TransferTask::with_clients(
        request(SFTP_PATH, true, true, Some(staging.path())),
        source,
        sink.clone(),
    ).unwrap();

    assert!(matches!(task.execute().await, Err(TransferError::SourceRead { .. })));
    assert_eq!(entries(staging.path()), 0);
    assert_eq!(sink.put_count(), 0);
}

#[tokio::test]
async fn test_mid_stream_failure_leaves_no_object() {
    let source = Arc::new(MemorySource::new().with_failing_file(SFTP_PATH, csv_content(), 20_000));
    let sink = Arc::new(MemorySink::new().with_bucket(BUCKET));

    let task = TransferTask::with_clients(request(SFTP_PATH, false, true, None), source, sink.clone()).unwrap();

    let error = task.execute().await.unwrap_err();
    assert!(matches!(error, TransferError::SourceRead { ref path, .. } if path == SFTP_PATH));
    assert!(sink.get_object(BUCKET, KEY).is_none());
}

#[tokio::test]
async fn test_second_execution_overwrites() {
    for use_temp_file in [true, false] {
        let f = fixture();
        let task = TransferTask::new(request(SFTP_PATH, use_temp_file, true, None), &f.resolver).unwrap();

        task.execute().await.unwrap();
        f.source.put_file(SFTP_PATH, b"replaced\n".to_vec());
        task.execute().await.unwrap();

        assert_eq!(f.sink.get_object(BUCKET, KEY).unwrap(), b"replaced\n".to_vec());
        assert_eq!(f.sink.list_objects(BUCKET, KEY).len(), 1);
        assert_eq!(f.sink.put_count(), 2);
    }
}

#[tokio::test]
async fn test_missing_bucket_is_reported() {
    let f = fixture();
    assert!(f.sink.delete_bucket(BUCKET));

    let error = run_transfer(request(SFTP_PATH, false, true, None), &f.resolver)
        .await
        .unwrap_err();

    assert!(error.is_bucket_not_found());
    assert_eq!(f.source.open_count(), 0);
}

#[tokio::test]
async fn test_url_key_lands_on_plain_key() {
    let f = fixture();
    let request = TransferRequest::builder()
        .sftp_path(SFTP_PATH)
        .s3_bucket(BUCKET)
        .s3_key(format!("s3://{}/{}", BUCKET, KEY))
        .build()
        .unwrap();

    run_transfer(request, &f.resolver).await.unwrap();
    assert_eq!(f.sink.list_objects(BUCKET, ""), vec![KEY.to_string()]);
}

#[tokio::test]
async fn test_empty_file_transfers() {
    for use_temp_file in [true, false] {
        let source = Arc::new(MemorySource::new().with_file("/upload/empty.csv", Vec::new()));
        let sink = Arc::new(MemorySink::new().with_bucket(BUCKET));

        let task = TransferTask::with_clients(
            request("/upload/empty.csv", use_temp_file, true, None),
            source,
            sink.clone(),
        ).unwrap();

        let outcome = task.execute().await.unwrap();
        assert_eq!(outcome.report().unwrap().bytes, 0);
        assert_eq!(sink.get_object(BUCKET, KEY), Some(Vec::new()));
    }
}
