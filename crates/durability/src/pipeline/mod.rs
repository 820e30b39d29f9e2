//! Double-buffered background writer
//!
//! Decouples tick ingestion from blocking disk writes. The producer fills a
//! buffer, hands it over with [`WritePipeline::submit`] and continues with a
//! recycled one from [`WritePipeline::take_buffer`]. A single writer thread
//! drains the queue into a [`BlockSink`].
//!
//! ```text
//!   producer ──submit──▶ [ to_write ] ──writer thread──▶ sink
//!      ▲                                    │
//!      └──take_buffer── [ available ] ◀─────┘ (recycled)
//! ```
//!
//! # Failure Policy
//!
//! Sink I/O errors are retried forever with a fixed delay; each retry is
//! logged and counted. Any other sink error is logged, the buffer is dropped
//! and the failure is reported by the next `flush` or `close`.
//!
//! # Thread Lifecycle
//!
//! - `shutdown` flag plus `work_ready` condvar stop the writer
//! - `close()` flushes, joins the writer and performs a durable flush
//! - `Drop` stops and joins the writer without the durable flush

mod counters;
mod sink;

pub use counters::{PipelineCounters, PipelineStats};
pub use sink::{BlockSink, FileSink};

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tickstore_core::{StoreError, StoreResult};
use tracing::{debug, error, info, warn};

/// Name of the writer thread
pub const WRITER_THREAD_NAME: &str = "tickstore-writer";

/// Default delay between write retries
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(3);

/// How long the writer sleeps before re-checking for work it may have missed
const IDLE_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct Queues {
    to_write: VecDeque<Vec<u8>>,
    available: Vec<Vec<u8>>,
    in_flight: bool,
}

struct Shared {
    queues: Mutex<Queues>,
    /// Wakes the writer
    work_ready: Condvar,
    /// Wakes callers of `flush`
    idle: Condvar,
    /// Held for the duration of one drain
    drain_lock: Mutex<()>,
    sink: Mutex<Box<dyn BlockSink>>,
    retry_delay: Duration,
    buffer_capacity: usize,
    shutdown: AtomicBool,
    failure: Mutex<Option<String>>,
    counters: PipelineCounters,
}

/// Background writer for one file.
pub struct WritePipeline {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl WritePipeline {
    /// Start a pipeline writing to `sink`.
    ///
    /// `buffer_capacity` is the initial capacity of freshly allocated buffers.
    pub fn start(
        sink: Box<dyn BlockSink>,
        retry_delay: Duration,
        buffer_capacity: usize,
    ) -> StoreResult<Self> {
        let shared = Arc::new(Shared {
            queues: Mutex::new(Queues::default()),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            drain_lock: Mutex::new(()),
            sink: Mutex::new(sink),
            retry_delay,
            buffer_capacity,
            shutdown: AtomicBool::new(false),
            failure: Mutex::new(None),
            counters: PipelineCounters::default(),
        });

        let worker_shared = Arc::clone(&shared);
        let handle = thread::Builder::new()
            .name(WRITER_THREAD_NAME.to_string())
            .spawn(move || worker_shared.writer_loop())?;

        Ok(WritePipeline {
            shared,
            worker: Mutex::new(Some(handle)),
            closed: AtomicBool::new(false),
        })
    }

    /// Queue a filled buffer for writing. Empty buffers are recycled at once.
    pub fn submit(&self, buffer: Vec<u8>) -> StoreResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(StoreError::InvalidOperation(
                "write pipeline is closed".to_string(),
            ));
        }
        let mut queues = self.shared.queues.lock();
        if buffer.is_empty() {
            queues.available.push(buffer);
            return Ok(());
        }
        queues.to_write.push_back(buffer);
        drop(queues);
        self.shared.work_ready.notify_one();
        Ok(())
    }

    /// An empty buffer: recycled if one is available, otherwise new.
    pub fn take_buffer(&self) -> Vec<u8> {
        let recycled = self.shared.queues.lock().available.pop();
        recycled.unwrap_or_else(|| Vec::with_capacity(self.shared.buffer_capacity))
    }

    /// Write every queued buffer on the calling thread.
    ///
    /// Fails with [`StoreError::ReentrantDrain`] if a drain is already running.
    pub fn drain(&self) -> StoreResult<()> {
        self.shared.drain()
    }

    /// Block until every submitted buffer has been written.
    pub fn flush(&self) -> StoreResult<()> {
        {
            let mut queues = self.shared.queues.lock();
            while !queues.to_write.is_empty() || queues.in_flight {
                if self.shared.shutdown.load(Ordering::SeqCst) {
                    break;
                }
                self.shared.work_ready.notify_one();
                self.shared.idle.wait_for(&mut queues, IDLE_POLL);
            }
        }
        self.shared.take_failure()
    }

    /// Flush, stop the writer and force the sink to stable storage.
    pub fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let flushed = self.flush();
        self.stop_worker();
        // Anything the writer did not get to is written here
        self.shared.drain()?;
        flushed?;
        self.shared.sink.lock().sync_durable()?;
        self.shared.take_failure()?;
        info!(
            target: "tickstore::pipeline",
            bytes = self.shared.counters.snapshot().bytes_written,
            "Write pipeline closed"
        );
        Ok(())
    }

    /// Counter snapshot
    pub fn stats(&self) -> PipelineStats {
        self.shared.counters.snapshot()
    }

    /// Bytes committed to the sink so far
    pub fn committed_len(&self) -> u64 {
        self.shared.sink.lock().committed_len()
    }

    /// Number of buffers waiting to be written
    pub fn pending(&self) -> usize {
        self.shared.queues.lock().to_write.len()
    }

    fn stop_worker(&self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.work_ready.notify_all();
        if let Some(handle) = self.worker.lock().take() {
            if handle.join().is_err() {
                error!(target: "tickstore::pipeline", "Writer thread panicked");
            }
        }
    }
}

impl Shared {
    fn writer_loop(&self) {
        debug!(target: "tickstore::pipeline", "Writer thread started");
        loop {
            {
                let mut queues = self.queues.lock();
                while queues.to_write.is_empty() && !self.shutdown.load(Ordering::SeqCst) {
                    self.work_ready.wait_for(&mut queues, IDLE_POLL);
                }
                if queues.to_write.is_empty() && self.shutdown.load(Ordering::SeqCst) {
                    break;
                }
            }
            match self.drain() {
                Ok(()) => {}
                Err(StoreError::ReentrantDrain) => {
                    // A second drainer breaks the single-writer rule
                    error!(
                        target: "tickstore::pipeline",
                        "Writer found a drain already running"
                    );
                    self.counters.record_reentrant_drain();
                    thread::sleep(IDLE_POLL);
                }
                Err(e) => {
                    error!(target: "tickstore::pipeline", error = %e, "Writer drain failed");
                    self.record_failure(e.to_string());
                }
            }
        }
        debug!(target: "tickstore::pipeline", "Writer thread stopped");
    }

    fn drain(&self) -> StoreResult<()> {
        let _draining = self.drain_lock.try_lock().ok_or(StoreError::ReentrantDrain)?;
        loop {
            let buffer = {
                let mut queues = self.queues.lock();
                match queues.to_write.pop_front() {
                    Some(buffer) => {
                        queues.in_flight = true;
                        buffer
                    }
                    None => break,
                }
            };

            self.write_with_retry(&buffer);

            let mut buffer = buffer;
            buffer.clear();
            let mut queues = self.queues.lock();
            queues.in_flight = false;
            queues.available.push(buffer);
            drop(queues);
            self.idle.notify_all();
        }
        Ok(())
    }

    fn write_with_retry(&self, buffer: &[u8]) {
        let mut attempts = 0u64;
        loop {
            let result = self.sink.lock().write_all_at_end(buffer);
            match result {
                Ok(()) => {
                    self.counters.record_write(buffer.len());
                    if attempts > 0 {
                        info!(
                            target: "tickstore::pipeline",
                            attempts,
                            "Write succeeded after retry"
                        );
                    }
                    return;
                }
                Err(StoreError::Io(e)) => {
                    attempts += 1;
                    self.counters.record_retry();
                    warn!(
                        target: "tickstore::pipeline",
                        error = %e,
                        attempt = attempts,
                        delay_ms = self.retry_delay.as_millis() as u64,
                        "Write failed, retrying"
                    );
                    thread::sleep(self.retry_delay);
                }
                Err(e) => {
                    error!(target: "tickstore::pipeline", error = %e, "Write failed, buffer dropped");
                    self.record_failure(e.to_string());
                    return;
                }
            }
        }
    }

    fn record_failure(&self, message: String) {
        let mut failure = self.failure.lock();
        if failure.is_none() {
            *failure = Some(message);
        }
    }

    fn take_failure(&self) -> StoreResult<()> {
        match self.failure.lock().take() {
            Some(message) => Err(StoreError::InvalidOperation(format!(
                "background write failed: {}",
                message
            ))),
            None => Ok(()),
        }
    }
}

impl Drop for WritePipeline {
    fn drop(&mut self) {
        // Stops the writer only; durability is close()'s job
        self.closed.store(true, Ordering::SeqCst);
        self.stop_worker();
    }
}

impl std::fmt::Debug for WritePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WritePipeline")
            .field("retry_delay", &self.shared.retry_delay)
            .field("pending", &self.pending())
            .field("stats", &self.stats())
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    /// In-memory sink that fails the first `failures` writes.
    struct FlakySink {
        data: Arc<Mutex<Vec<u8>>>,
        failures: usize,
        synced: Arc<AtomicBool>,
    }

    impl BlockSink for FlakySink {
        fn write_all_at_end(&mut self, bytes: &[u8]) -> StoreResult<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(io::Error::new(io::ErrorKind::Other, "disk busy").into());
            }
            self.data.lock().extend_from_slice(bytes);
            Ok(())
        }

        fn sync_durable(&mut self) -> StoreResult<()> {
            self.synced.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn committed_len(&self) -> u64 {
            self.data.lock().len() as u64
        }
    }

    fn pipeline(failures: usize) -> (WritePipeline, Arc<Mutex<Vec<u8>>>, Arc<AtomicBool>) {
        let data = Arc::new(Mutex::new(Vec::new()));
        let synced = Arc::new(AtomicBool::new(false));
        let sink = FlakySink {
            data: Arc::clone(&data),
            failures,
            synced: Arc::clone(&synced),
        };
        let pipeline = WritePipeline::start(Box::new(sink), Duration::from_millis(1), 64).unwrap();
        (pipeline, data, synced)
    }

    #[test]
    fn test_buffers_written_in_order() {
        let (pipeline, data, _) = pipeline(0);
        for i in 0..20u8 {
            let mut buffer = pipeline.take_buffer();
            buffer.extend_from_slice(&[i; 4]);
            pipeline.submit(buffer).unwrap();
        }
        pipeline.flush().unwrap();

        let written = data.lock().clone();
        assert_eq!(written.len(), 80);
        for (i, chunk) in written.chunks(4).enumerate() {
            assert_eq!(chunk, &[i as u8; 4]);
        }
        assert_eq!(pipeline.stats().buffers_written, 20);
        assert_eq!(pipeline.pending(), 0);
    }

    #[test]
    fn test_retries_until_success() {
        let (pipeline, data, _) = pipeline(3);
        pipeline.submit(vec![7; 10]).unwrap();
        pipeline.flush().unwrap();
        assert_eq!(*data.lock(), vec![7; 10]);
        let stats = pipeline.stats();
        assert_eq!(stats.retries, 3);
        assert_eq!(stats.bytes_written, 10);
    }

    #[test]
    fn test_buffers_are_recycled() {
        let (pipeline, _, _) = pipeline(0);
        pipeline.submit(Vec::with_capacity(4096)).unwrap();
        let mut buffer = Vec::with_capacity(4096);
        buffer.push(1);
        pipeline.submit(buffer).unwrap();
        pipeline.flush().unwrap();
        let recycled = pipeline.take_buffer();
        assert!(recycled.is_empty());
        assert!(recycled.capacity() >= 4096);
    }

    #[test]
    fn test_close_syncs_and_rejects_writes() {
        let (pipeline, data, synced) = pipeline(0);
        pipeline.submit(vec![1, 2, 3]).unwrap();
        pipeline.close().unwrap();
        assert!(synced.load(Ordering::SeqCst));
        assert_eq!(*data.lock(), vec![1, 2, 3]);
        assert!(pipeline.submit(vec![4]).is_err());
        // Second close is a no-op
        pipeline.close().unwrap();
    }

    #[test]
    fn test_writer_reports_concurrent_drain() {
        let (pipeline, data, _) = pipeline(0);
        let held = pipeline.shared.drain_lock.lock();
        pipeline.submit(vec![9; 4]).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while pipeline.stats().reentrant_drains == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(pipeline.stats().reentrant_drains >= 1);
        assert!(data.lock().is_empty());

        drop(held);
        pipeline.flush().unwrap();
        assert_eq!(*data.lock(), vec![9; 4]);
    }

    #[test]
    fn test_drain_is_not_reentrant() {
        let (pipeline, _, _) = pipeline(0);
        let _held = pipeline.shared.drain_lock.lock();
        assert!(matches!(pipeline.drain(), Err(StoreError::ReentrantDrain)));
    }
}
