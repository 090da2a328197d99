use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::channel::mpsc;
use futures::SinkExt;
use log::{debug, warn};
use tokio::task::JoinHandle;

use crate::cloud::sink::BodyStream;
use crate::constants::STREAM_CHANNEL_DEPTH;

/// What the reader worker saw by the time it stopped.
#[derive(Debug)]
pub struct PumpSummary {
    pub bytes_read: u64,
    pub error: Option<io::Error>,
}

/// Handle on the blocking worker that feeds a [`BodyStream`].
///
/// The worker stops at end of file, on the first read error, or as soon as
/// the consumer drops the stream.
pub struct ReadMonitor {
    bytes_read: Arc<AtomicU64>,
    worker: JoinHandle<Option<io::Error>>,
}

impl ReadMonitor {
    /// Wait for the worker to stop and report what it saw.
    ///
    /// Only call this once the stream has been consumed or dropped.
    pub async fn finish(self) -> PumpSummary {
        let error = match self.worker.await {
            Ok(error) => error,
            Err(e) => Some(io::Error::new(
                io::ErrorKind::Other,
                format!("reader task failed: {}", e),
            )),
        };

        PumpSummary {
            bytes_read: self.bytes_read.load(Ordering::SeqCst),
            error,
        }
    }
}

/// Turn a blocking reader into a chunked body stream.
///
/// Reads run on a tokio blocking worker and are handed over through a bounded
/// channel, so at most `STREAM_CHANNEL_DEPTH` chunks are held in memory. A read
/// error is forwarded into the stream (failing the upload) and recorded on the
/// returned [`ReadMonitor`].
///
/// Must be called from within a tokio runtime.
pub fn reader_stream(mut reader: Box<dyn Read + Send>, chunk_size: usize) -> (BodyStream, ReadMonitor) {
    let (mut sender, receiver) = mpsc::channel::<io::Result<Bytes>>(STREAM_CHANNEL_DEPTH);
    let bytes_read = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&bytes_read);

    let worker = tokio::task::spawn_blocking(move || {
        let mut buffer = vec![0u8; chunk_size.max(1)];

        loop {
            match reader.read(&mut buffer) {
                Ok(0) => return None,
                Ok(n) => {
                    counter.fetch_add(n as u64, Ordering::SeqCst);
                    let chunk = Bytes::copy_from_slice(&buffer[..n]);

                    if futures::executor::block_on(sender.send(Ok(chunk))).is_err() {
                        debug!(
                            "Upload stopped consuming after {} bytes",
                            counter.load(Ordering::SeqCst)
                        );
                        return None;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(
                        "Remote read failed after {} bytes: {}",
                        counter.load(Ordering::SeqCst),
                        e
                    );
                    let forwarded = io::Error::new(e.kind(), e.to_string());
                    let _ = futures::executor::block_on(sender.send(Err(forwarded)));
                    return Some(e);
                }
            }
        }
    });

    (Box::pin(receiver), ReadMonitor { bytes_read, worker })
}
