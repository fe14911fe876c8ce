//! Real-time primitives for the streaming pipeline.
//!
//! The hot paths here never allocate and never take a lock: the producer
//! thread and its consumers communicate exclusively through bounded
//! SPSC rings with Release/Acquire publication.

mod ringbuffer;

pub use ringbuffer::{ByteRing, RingError};

/// Cache line size used for alignment (64 bytes on common x86/ARM parts).
pub const CACHE_LINE_SIZE: usize = 64;
