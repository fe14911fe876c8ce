//! Magnitude Spectrum Estimation
//!
//! Streaming spectrum view of the raw I/Q byte stream: Hann window, FFT,
//! amplitude in dB, FFT-shifted so the tuned center frequency lands in
//! the middle bin. The FFT plan and window are built once and reused
//! every frame.

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::byte_to_level;

/// Floor applied before the log so empty bins stay finite.
const AMPLITUDE_FLOOR: f64 = 1e-10;

/// Reusable windowed-FFT magnitude estimator.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn Fft<f64>>,
    /// Precomputed Hann coefficients, one per FFT bin.
    window: Vec<f64>,
    scratch: Vec<Complex64>,
    fft_size: usize,
}

impl std::fmt::Debug for SpectrumAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectrumAnalyzer")
            .field("fft_size", &self.fft_size)
            .finish()
    }
}

impl SpectrumAnalyzer {
    /// Create an analyzer producing `fft_size` magnitude bins.
    pub fn new(fft_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch = vec![Complex64::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Self {
            fft,
            window: hann_window(fft_size),
            scratch,
            fft_size,
        }
    }

    /// Number of output bins.
    #[inline]
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Compute the shifted magnitude spectrum of a raw I/Q byte buffer.
    ///
    /// Uses the first `fft_size` complex samples; returns `None` when the
    /// buffer is too short for a full frame. Bin 0 of the result is
    /// `-rate/2`, the middle bin is the center frequency.
    pub fn process(&mut self, iq_bytes: &[u8]) -> Option<Vec<f32>> {
        if iq_bytes.len() < 2 * self.fft_size {
            return None;
        }

        let mut buf: Vec<Complex64> = iq_bytes
            .chunks_exact(2)
            .take(self.fft_size)
            .zip(self.window.iter())
            .map(|(pair, &w)| {
                Complex64::new(byte_to_level(pair[0]) * w, byte_to_level(pair[1]) * w)
            })
            .collect();

        self.fft.process_with_scratch(&mut buf, &mut self.scratch);

        let scale = 1.0 / self.fft_size as f64;
        let magnitudes: Vec<f32> = buf
            .iter()
            .map(|c| amplitude_db(c.norm() * scale) as f32)
            .collect();

        Some(fft_shift(&magnitudes))
    }
}

/// Amplitude to dB, floored to keep `-inf` out of the display path.
#[inline]
fn amplitude_db(amplitude: f64) -> f64 {
    20.0 * amplitude.max(AMPLITUDE_FLOOR).log10()
}

/// Hann window coefficients.
fn hann_window(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / (n - 1) as f64).cos()))
        .collect()
}

/// Swap spectrum halves so DC sits in the middle bin.
pub fn fft_shift<T: Copy>(data: &[T]) -> Vec<T> {
    let half = data.len() / 2;
    let mut shifted = Vec::with_capacity(data.len());
    shifted.extend_from_slice(&data[half..]);
    shifted.extend_from_slice(&data[..half]);
    shifted
}
