//! FM Demodulator — discriminator, decimation, de-emphasis
//!
//! Converts raw unsigned-byte I/Q from the tuner into signed 16-bit mono
//! audio at the target rate, in one stateful pass:
//!
//! ```text
//! u8 pairs → complex → arg(s[n]·conj(s[n-1])) → /D moving average
//!          → 50 µs de-emphasis → ×16000 → clamp → i16
//! ```
//!
//! The phase of `s[n]·conj(s[n-1])` is the per-sample instantaneous
//! frequency estimate; for wideband FM the audio is proportional to it.
//! Averaging groups of `D = sample_rate / audio_rate` estimates decimates
//! to the audio rate, and the single-pole de-emphasis undoes the
//! transmitter's pre-emphasis (50 µs time constant in Europe).

use num_complex::Complex64;

use crate::byte_to_level;

/// European broadcast de-emphasis time constant (75 µs in North America).
pub const DEEMPHASIS_TAU: f64 = 50e-6;

/// Linear gain applied before the i16 conversion.
const OUTPUT_GAIN: f64 = 16000.0;

/// Stateful FM demodulation chain.
///
/// Feeding the same byte stream through the same sequence of
/// [`FmDemodulator::process`] calls always yields the same output; all
/// state is explicit.
#[derive(Debug, Clone)]
pub struct FmDemodulator {
    /// Input samples folded into one audio sample.
    decimation: usize,
    /// Phase deltas accumulated in the current window, in `[0, D)`.
    counter: usize,
    /// Running sum of phase deltas for the current window.
    sum: f64,
    /// Previous complex sample for the discriminator.
    prev: Complex64,
    /// De-emphasis coefficient, `1 - exp(-dt/τ)`.
    alpha: f64,
    /// Previous de-emphasized output.
    deemph_state: f64,
}

impl FmDemodulator {
    /// Create a demodulator for the given tuner and audio rates.
    ///
    /// The decimation factor is `sample_rate / audio_rate`, clamped to at
    /// least 1. When the division is not exact the effective output rate
    /// is `sample_rate / D`; the caller decides whether to warn or accept
    /// the pitch offset.
    pub fn new(sample_rate: u32, audio_rate: u32) -> Self {
        let decimation = (sample_rate / audio_rate).max(1) as usize;
        let dt = 1.0 / audio_rate as f64;
        let alpha = 1.0 - (-dt / DEEMPHASIS_TAU).exp();
        Self {
            decimation,
            counter: 0,
            sum: 0.0,
            prev: Complex64::new(1.0, 0.0),
            alpha,
            deemph_state: 0.0,
        }
    }

    /// The decimation factor `D`.
    #[inline]
    pub fn decimation(&self) -> usize {
        self.decimation
    }

    /// Demodulate a buffer of interleaved I/Q bytes.
    ///
    /// Produces one audio sample per `2·D` input bytes; a partial window
    /// carries over to the next call and an odd trailing byte is
    /// discarded.
    pub fn process(&mut self, iq: &[u8]) -> Vec<i16> {
        let mut out = Vec::with_capacity(iq.len() / (2 * self.decimation));

        for pair in iq.chunks_exact(2) {
            let sample = Complex64::new(byte_to_level(pair[0]), byte_to_level(pair[1]));
            let delta = sample * self.prev.conj();
            self.prev = sample;

            self.sum += delta.arg();
            self.counter += 1;
            if self.counter == self.decimation {
                let avg = self.sum / self.decimation as f64;
                self.sum = 0.0;
                self.counter = 0;

                self.deemph_state = self.alpha * avg + (1.0 - self.alpha) * self.deemph_state;

                let amplified = (self.deemph_state * OUTPUT_GAIN).clamp(-32768.0, 32767.0);
                out.push(amplified as i16);
            }
        }

        out
    }

    /// Reset all filter state to the initial condition.
    pub fn reset(&mut self) {
        self.counter = 0;
        self.sum = 0.0;
        self.prev = Complex64::new(1.0, 0.0);
        self.deemph_state = 0.0;
    }
}
