//! Pipeline driver: producer thread, rings, and shutdown.
//!
//! The producer thread owns the tuner and is the sole writer to both
//! rings; the audio callback is the sole reader of the audio ring and
//! the GUI thread the sole reader of the GUI ring, so each ring stays
//! strictly SPSC.
//!
//! Shutdown is a single monotonic signal: the run flag drops to false
//! exactly once, every retry loop checks it, and blocking reads are
//! allowed to complete naturally before the thread exits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use airwave_core::rt::{ByteRing, RingError};

use crate::hal::{Tuner, TunerError};

/// Bytes per blocking read; librtlsdr's default bulk transfer size.
pub const TRANSFER_SIZE: usize = 16 * 16384;

/// Capacity of the audio and GUI rings, in bytes.
pub const RING_CAPACITY: usize = 1 << 20;

/// Backoff while the audio ring is full.
const PUSH_RETRY: Duration = Duration::from_micros(100);

/// Blocking byte source feeding the producer loop.
///
/// The seam exists so the loop can be exercised with a stub source; the
/// real implementation is [`Tuner`].
pub trait SampleSource: Send + 'static {
    fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize, TunerError>;
}

impl SampleSource for Tuner {
    fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize, TunerError> {
        Tuner::read_sync(self, buf)
    }
}

/// The running capture pipeline: two rings, a run flag, and the
/// producer thread.
///
/// Dropping the pipeline lowers the flag and joins the producer, so the
/// rings always outlive the threads using them.
pub struct Pipeline {
    audio_ring: Arc<ByteRing>,
    gui_ring: Arc<ByteRing>,
    running: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// Build the rings and spawn the producer thread over `source`.
    pub fn start<S: SampleSource>(source: S) -> Result<Self, RingError> {
        let audio_ring = Arc::new(ByteRing::with_capacity(RING_CAPACITY)?);
        let gui_ring = Arc::new(ByteRing::with_capacity(RING_CAPACITY)?);
        let running = Arc::new(AtomicBool::new(true));

        let producer = {
            let audio_ring = Arc::clone(&audio_ring);
            let gui_ring = Arc::clone(&gui_ring);
            let running = Arc::clone(&running);
            thread::spawn(move || producer_loop(source, audio_ring, gui_ring, running))
        };

        Ok(Self {
            audio_ring,
            gui_ring,
            running,
            producer: Some(producer),
        })
    }

    pub fn audio_ring(&self) -> Arc<ByteRing> {
        Arc::clone(&self.audio_ring)
    }

    pub fn gui_ring(&self) -> Arc<ByteRing> {
        Arc::clone(&self.gui_ring)
    }

    /// The shared run flag; true until shutdown begins.
    pub fn run_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Lower the run flag and join the producer.
    ///
    /// The producer notices the flag at its next retry check or after its
    /// current blocking read completes, so this returns within roughly
    /// one read period.
    pub fn shutdown(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.producer.take() {
            if handle.join().is_err() {
                tracing::error!("producer thread panicked");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn producer_loop<S: SampleSource>(
    mut source: S,
    audio_ring: Arc<ByteRing>,
    gui_ring: Arc<ByteRing>,
    running: Arc<AtomicBool>,
) {
    let mut buf = vec![0u8; TRANSFER_SIZE];

    while running.load(Ordering::Relaxed) {
        let n = match source.read_sync(&mut buf) {
            Ok(n) => n,
            Err(e) => {
                tracing::error!("device read failed: {}", e);
                running.store(false, Ordering::Relaxed);
                break;
            }
        };
        if n == 0 {
            continue;
        }

        // Only the bytes actually read are enqueued; a short read never
        // publishes a stale tail.
        let chunk = &buf[..n];

        // Audio is authoritative: hold the data until the callback drains
        // enough room, unless shutdown wins first.
        while running.load(Ordering::Relaxed) && !audio_ring.push(chunk) {
            thread::sleep(PUSH_RETRY);
        }

        // Visualization is best-effort: a full GUI ring drops the chunk.
        gui_ring.push(chunk);
    }

    tracing::debug!("producer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// Source yielding an incrementing byte pattern at a fixed pace.
    struct StubSource {
        counter: u8,
        delay: Duration,
    }

    impl StubSource {
        fn new(delay: Duration) -> Self {
            Self { counter: 0, delay }
        }
    }

    impl SampleSource for StubSource {
        fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize, TunerError> {
            thread::sleep(self.delay);
            for b in buf.iter_mut() {
                *b = self.counter;
                self.counter = self.counter.wrapping_add(1);
            }
            Ok(buf.len())
        }
    }

    /// Source that fails on the second read.
    struct FailingSource {
        reads: usize,
    }

    impl SampleSource for FailingSource {
        fn read_sync(&mut self, buf: &mut [u8]) -> Result<usize, TunerError> {
            self.reads += 1;
            if self.reads > 1 {
                return Err(TunerError::ReadFailed(-5));
            }
            buf.fill(0);
            Ok(buf.len())
        }
    }

    #[test]
    fn test_producer_feeds_both_rings() {
        let mut pipeline = Pipeline::start(StubSource::new(Duration::from_millis(1))).unwrap();
        let audio = pipeline.audio_ring();
        let gui = pipeline.gui_ring();

        let deadline = Instant::now() + Duration::from_secs(5);
        while (audio.is_empty() || gui.is_empty()) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!audio.is_empty());
        assert!(!gui.is_empty());

        pipeline.shutdown();
    }

    #[test]
    fn test_audio_stream_is_ordered_and_lossless() {
        let mut pipeline = Pipeline::start(StubSource::new(Duration::from_micros(100))).unwrap();
        let audio = pipeline.audio_ring();

        let mut scratch = Vec::new();
        let mut received: Vec<u8> = Vec::new();
        while received.len() < 4 * TRANSFER_SIZE {
            let n = audio.pop(&mut scratch, 4096);
            if n == 0 {
                thread::sleep(Duration::from_micros(200));
                continue;
            }
            received.extend_from_slice(&scratch);
        }
        pipeline.shutdown();

        for (i, window) in received.windows(2).enumerate() {
            assert_eq!(
                window[1],
                window[0].wrapping_add(1),
                "gap in stream at byte {}",
                i
            );
        }
    }

    #[test]
    fn test_shutdown_joins_within_one_read_period() {
        let mut pipeline = Pipeline::start(StubSource::new(Duration::from_millis(20))).unwrap();
        thread::sleep(Duration::from_millis(50));

        let start = Instant::now();
        pipeline.shutdown();
        assert!(
            start.elapsed() < Duration::from_secs(1),
            "join took {:?}",
            start.elapsed()
        );
    }

    #[test]
    fn test_shutdown_unblocks_full_ring_retry() {
        // Fast source, nobody draining: the producer parks in its push
        // retry loop. Shutdown must still return promptly.
        let mut pipeline = Pipeline::start(StubSource::new(Duration::ZERO)).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(pipeline.audio_ring().free_space(), 0);

        let start = Instant::now();
        pipeline.shutdown();
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_read_error_lowers_run_flag() {
        let pipeline = Pipeline::start(FailingSource { reads: 0 }).unwrap();
        let running = pipeline.run_flag();

        let deadline = Instant::now() + Duration::from_secs(5);
        while running.load(Ordering::Relaxed) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(!running.load(Ordering::Relaxed));
    }
}
