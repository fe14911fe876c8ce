//! Hardware access layer: librtlsdr FFI and the owning tuner handle.

pub mod ffi;
pub mod tuner;

pub use ffi::TunerError;
pub use tuner::Tuner;
