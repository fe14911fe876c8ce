//! Airwave — FM Broadcast Receiver
//!
//! The application side of the receiver: tuner access over librtlsdr,
//! the producer/ring pipeline, the cpal audio sink, and the eframe
//! visualization. The DSP lives in `airwave-core`.

pub mod app;
pub mod audio;
pub mod hal;
pub mod pipeline;
pub mod views;

pub use app::ReceiverApp;
