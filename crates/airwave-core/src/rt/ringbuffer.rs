//! # Lock-Free SPSC Byte Ring
//!
//! A bounded single-producer, single-consumer queue of raw bytes, sized to
//! decouple a blocking USB reader from the audio callback and the display
//! thread.
//!
//! ## Design
//!
//! - Power-of-two capacity; indices are `counter & (capacity - 1)`
//! - `head` and `tail` are monotonically increasing counters on separate
//!   cache lines so producer and consumer never contend on one line
//! - `push` is transactional: the whole slice is enqueued or nothing is
//! - `pop` returns up to the requested number of bytes; an empty ring is
//!   flow control, not an error
//!
//! ## Memory Ordering
//!
//! The producer loads its own `head` relaxed, loads `tail` with Acquire and
//! publishes `head` with Release; the consumer is symmetric. A consumer
//! that observes a new `head` therefore also observes every byte written
//! before it. Weakening the publication to Relaxed breaks the queue.

use std::cell::UnsafeCell;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::CACHE_LINE_SIZE;

/// Error type for ring construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum RingError {
    #[error("ring capacity must be a power of two, got {0}")]
    InvalidCapacity(usize),
}

/// Cache-line aligned atomic counter.
#[repr(align(64))]
struct PaddedAtomicUsize {
    value: AtomicUsize,
    _pad: [u8; CACHE_LINE_SIZE - std::mem::size_of::<AtomicUsize>()],
}

impl PaddedAtomicUsize {
    fn new(v: usize) -> Self {
        Self {
            value: AtomicUsize::new(v),
            _pad: [0; CACHE_LINE_SIZE - std::mem::size_of::<AtomicUsize>()],
        }
    }
}

/// Single-producer, single-consumer lock-free byte ring.
///
/// Exactly one thread may call [`ByteRing::push`] and exactly one thread
/// may call [`ByteRing::pop`] over the ring's lifetime.
///
/// # Example
///
/// ```rust
/// use airwave_core::rt::ByteRing;
///
/// let ring = ByteRing::with_capacity(8).unwrap();
/// assert!(ring.push(&[1, 2, 3]));
///
/// let mut out = Vec::new();
/// assert_eq!(ring.pop(&mut out, 16), 3);
/// assert_eq!(out, [1, 2, 3]);
/// ```
pub struct ByteRing {
    /// Byte storage; slots are only ever touched by the side that owns
    /// them per the head/tail protocol.
    buffer: Box<[UnsafeCell<u8>]>,
    /// Write counter (modified by the producer).
    head: PaddedAtomicUsize,
    /// Read counter (modified by the consumer).
    tail: PaddedAtomicUsize,
    /// `capacity - 1`, for index masking.
    mask: usize,
}

// The head/tail protocol makes concurrent producer/consumer access sound;
// the atomics carry the synchronization.
unsafe impl Send for ByteRing {}
unsafe impl Sync for ByteRing {}

impl std::fmt::Debug for ByteRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteRing")
            .field("capacity", &(self.mask + 1))
            .field("head", &self.head.value.load(Ordering::Relaxed))
            .field("tail", &self.tail.value.load(Ordering::Relaxed))
            .finish()
    }
}

impl ByteRing {
    /// Create a ring with the given capacity in bytes.
    ///
    /// The capacity must be a nonzero power of two; anything else is
    /// rejected at construction.
    pub fn with_capacity(capacity: usize) -> Result<Self, RingError> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(RingError::InvalidCapacity(capacity));
        }
        let buffer: Vec<UnsafeCell<u8>> = (0..capacity).map(|_| UnsafeCell::new(0)).collect();
        Ok(Self {
            buffer: buffer.into_boxed_slice(),
            head: PaddedAtomicUsize::new(0),
            tail: PaddedAtomicUsize::new(0),
            mask: capacity - 1,
        })
    }

    /// Total capacity in bytes.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Bytes currently enqueued. A snapshot; may change immediately.
    #[inline]
    pub fn len(&self) -> usize {
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Relaxed);
        head.wrapping_sub(tail)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Free space in bytes.
    #[inline]
    pub fn free_space(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Enqueue the entire slice, or nothing.
    ///
    /// Returns `false` without touching the ring when the slice does not
    /// fit; the producer is expected to retry later. Producer side only.
    pub fn push(&self, bytes: &[u8]) -> bool {
        let head = self.head.value.load(Ordering::Relaxed);
        let tail = self.tail.value.load(Ordering::Acquire);

        if bytes.len() > self.capacity() - head.wrapping_sub(tail) {
            return false;
        }

        let index = head & self.mask;
        let first = bytes.len().min(self.capacity() - index);
        unsafe {
            ptr::copy_nonoverlapping(bytes.as_ptr(), self.slot(index), first);
            if first < bytes.len() {
                // Wrapped: the remainder lands at the physical start.
                ptr::copy_nonoverlapping(bytes.as_ptr().add(first), self.slot(0), bytes.len() - first);
            }
        }

        self.head
            .value
            .store(head.wrapping_add(bytes.len()), Ordering::Release);
        true
    }

    /// Dequeue up to `max` bytes into `dst`.
    ///
    /// `dst` is resized to exactly the number of bytes returned, so it
    /// never carries a stale suffix. Returns 0 when the ring is empty.
    /// Consumer side only.
    pub fn pop(&self, dst: &mut Vec<u8>, max: usize) -> usize {
        let tail = self.tail.value.load(Ordering::Relaxed);
        let head = self.head.value.load(Ordering::Acquire);

        let count = max.min(head.wrapping_sub(tail));
        dst.resize(count, 0);
        if count == 0 {
            return 0;
        }

        let index = tail & self.mask;
        let first = count.min(self.capacity() - index);
        unsafe {
            ptr::copy_nonoverlapping(self.slot(index) as *const u8, dst.as_mut_ptr(), first);
            if first < count {
                ptr::copy_nonoverlapping(
                    self.slot(0) as *const u8,
                    dst.as_mut_ptr().add(first),
                    count - first,
                );
            }
        }

        self.tail
            .value
            .store(tail.wrapping_add(count), Ordering::Release);
        count
    }

    #[inline]
    fn slot(&self, index: usize) -> *mut u8 {
        self.buffer[index].get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_capacity_must_be_power_of_two() {
        assert_eq!(
            ByteRing::with_capacity(1000).unwrap_err(),
            RingError::InvalidCapacity(1000)
        );
        assert_eq!(
            ByteRing::with_capacity(0).unwrap_err(),
            RingError::InvalidCapacity(0)
        );
        assert!(ByteRing::with_capacity(1024).is_ok());
    }

    #[test]
    fn test_push_full_then_drain() {
        let ring = ByteRing::with_capacity(8).unwrap();

        assert!(ring.push(&[1, 2, 3, 4, 5, 6, 7, 8]));
        assert!(!ring.push(&[9]));

        let mut out = Vec::new();
        assert_eq!(ring.pop(&mut out, 16), 8);
        assert_eq!(out, [1, 2, 3, 4, 5, 6, 7, 8]);

        assert!(ring.push(&[9]));
        assert_eq!(ring.pop(&mut out, 16), 1);
        assert_eq!(out, [9]);
    }

    #[test]
    fn test_failed_push_leaves_ring_unchanged() {
        let ring = ByteRing::with_capacity(8).unwrap();
        assert!(ring.push(&[10, 20, 30]));

        assert!(!ring.push(&[0; 6]));
        assert_eq!(ring.len(), 3);

        let mut out = Vec::new();
        assert_eq!(ring.pop(&mut out, 8), 3);
        assert_eq!(out, [10, 20, 30]);
    }

    #[test]
    fn test_wraparound_preserves_bytes() {
        let ring = ByteRing::with_capacity(8).unwrap();
        let mut out = Vec::new();

        assert!(ring.push(&[1, 2, 3, 4, 5, 6]));
        assert_eq!(ring.pop(&mut out, 6), 6);

        // This push crosses the physical end of the buffer at index 4.
        assert!(ring.push(&[11, 12, 13, 14, 15, 16]));
        assert_eq!(ring.pop(&mut out, 6), 6);
        assert_eq!(out, [11, 12, 13, 14, 15, 16]);
    }

    #[test]
    fn test_pop_advances_tail_exactly() {
        let ring = ByteRing::with_capacity(16).unwrap();
        assert!(ring.push(&[0; 10]));

        let mut out = Vec::new();
        assert_eq!(ring.pop(&mut out, 4), 4);
        assert_eq!(ring.len(), 6);
        assert_eq!(ring.pop(&mut out, 100), 6);
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.pop(&mut out, 1), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_pop_clears_stale_suffix() {
        let ring = ByteRing::with_capacity(8).unwrap();
        let mut out = vec![99u8; 8];

        assert!(ring.push(&[1, 2]));
        assert_eq!(ring.pop(&mut out, 8), 2);
        assert_eq!(out, [1, 2]);
    }

    #[test]
    fn test_one_and_a_half_capacities_match_linear_reference() {
        let ring = ByteRing::with_capacity(16).unwrap();
        let reference: Vec<u8> = (0..24).collect();
        let mut seen = Vec::new();
        let mut scratch = Vec::new();

        // Chunk sizes chosen to cross the physical boundary repeatedly.
        let mut offset = 0;
        for chunk in reference.chunks(5) {
            while !ring.push(chunk) {
                let n = ring.pop(&mut scratch, 7);
                seen.extend_from_slice(&scratch[..n]);
            }
            offset += chunk.len();
        }
        assert_eq!(offset, reference.len());
        loop {
            let n = ring.pop(&mut scratch, 7);
            if n == 0 {
                break;
            }
            seen.extend_from_slice(&scratch);
        }

        assert_eq!(seen, reference);
    }

    #[test]
    fn test_spsc_threaded_stream_equality() {
        let ring = Arc::new(ByteRing::with_capacity(256).unwrap());
        let producer_ring = Arc::clone(&ring);
        let consumer_ring = Arc::clone(&ring);

        const TOTAL: usize = 100_000;
        let expected: Vec<u8> = (0..TOTAL).map(|i| (i % 251) as u8).collect();
        let to_send = expected.clone();

        let producer = thread::spawn(move || {
            // Varying chunk sizes exercise wrap-around and full-ring retry.
            let sizes = [1usize, 7, 64, 13, 100, 3];
            let mut offset = 0;
            let mut round = 0;
            while offset < to_send.len() {
                let size = sizes[round % sizes.len()].min(to_send.len() - offset);
                round += 1;
                let chunk = &to_send[offset..offset + size];
                while !producer_ring.push(chunk) {
                    std::hint::spin_loop();
                }
                offset += size;
            }
        });

        let consumer = thread::spawn(move || {
            let sizes = [3usize, 90, 1, 17, 256];
            let mut received = Vec::with_capacity(TOTAL);
            let mut scratch = Vec::new();
            let mut round = 0;
            while received.len() < TOTAL {
                let max = sizes[round % sizes.len()];
                round += 1;
                let n = consumer_ring.pop(&mut scratch, max);
                if n == 0 {
                    std::hint::spin_loop();
                    continue;
                }
                received.extend_from_slice(&scratch);
            }
            received
        });

        producer.join().unwrap();
        let received = consumer.join().unwrap();
        assert_eq!(received, expected);
    }
}
