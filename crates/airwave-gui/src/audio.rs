//! Audio sink: pull-mode mono i16 output through cpal.
//!
//! The device pulls `frames` samples per period; the callback pops the
//! matching number of raw I/Q bytes from the audio ring, pads any
//! shortfall with the neutral byte 127 (complex zero, modulo rounding),
//! and demodulates. The buffer is always fully written so an underflow
//! costs silence, never cadence.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use airwave_core::demod::FmDemodulator;
use airwave_core::rt::ByteRing;

/// Audio output rate the demodulator decimates down to.
pub const TARGET_AUDIO_RATE: u32 = 48_000;

/// Neutral pad byte; maps to (almost exactly) complex zero.
const SILENCE_BYTE: u8 = 127;

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,

    #[error("failed to build audio stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

/// A running audio output stream.
///
/// The stream owns the demodulator and a handle to the audio ring; both
/// stay alive until the stream is stopped and dropped, which happens
/// before the pipeline tears down.
pub struct AudioOutput {
    stream: cpal::Stream,
}

impl AudioOutput {
    /// Open the default output device and start pulling.
    pub fn start(
        ring: Arc<ByteRing>,
        mut demod: FmDemodulator,
        audio_rate: u32,
    ) -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;

        let config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(audio_rate),
            buffer_size: cpal::BufferSize::Default,
        };

        let mut scratch: Vec<u8> = Vec::new();
        let stream = device.build_output_stream(
            &config,
            move |frames: &mut [i16], _: &cpal::OutputCallbackInfo| {
                render_frames(&ring, &mut demod, &mut scratch, frames);
            },
            |err| tracing::error!("audio stream error: {}", err),
            None,
        )?;
        stream.play()?;

        tracing::info!("audio output started at {} Hz mono", audio_rate);
        Ok(Self { stream })
    }

    /// Halt playback. The callback no longer fires after this returns.
    pub fn stop(&self) {
        if let Err(e) = self.stream.pause() {
            tracing::warn!("failed to pause audio stream: {}", e);
        }
    }
}

/// Fill one audio period from the ring.
///
/// Pops `frames · D · 2` bytes, pads the deficit with [`SILENCE_BYTE`],
/// demodulates, and writes exactly `frames.len()` samples. The length
/// assertion is the live check that the decimation factor and the device
/// rate agree; release builds zero-fill instead of aborting the audio
/// thread.
fn render_frames(
    ring: &ByteRing,
    demod: &mut FmDemodulator,
    scratch: &mut Vec<u8>,
    frames: &mut [i16],
) {
    let bytes_needed = frames.len() * demod.decimation() * 2;

    ring.pop(scratch, bytes_needed);
    scratch.resize(bytes_needed, SILENCE_BYTE);

    let audio = demod.process(scratch);
    debug_assert_eq!(audio.len(), frames.len());

    let n = audio.len().min(frames.len());
    frames[..n].copy_from_slice(&audio[..n]);
    frames[n..].fill(0);
}
