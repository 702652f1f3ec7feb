//! Audio data-link library: Ethernet-style frames over FSK tones
//!
//! Frames carry a 48-bit destination/source address pair, a 16-bit payload
//! length, a text payload and a CRC-32, line-coded 4b/5b and keyed onto two
//! sine frequencies (one bit per tone). The receiver recovers bits with a
//! per-bit-period FFT and a preamble synchronization state machine.

pub mod demodulator;
pub mod error;
pub mod framing;
pub mod modulator;
pub mod spectrum;
pub mod stream;

pub use demodulator::Demodulator;
pub use error::{LinkError, Result};
pub use framing::{decode, encode, Frame};
pub use modulator::Modulator;
pub use stream::{MemorySink, MemorySource, SampleSink, SampleSource};

// Physical layer configuration
pub const SAMPLE_RATE: usize = 44100;
pub const BIT_DURATION_MS: usize = 100;
pub const SAMPLES_PER_BIT: usize = (SAMPLE_RATE * BIT_DURATION_MS) / 1000; // 4410

/// Tone frequency transmitted for a `0` bit
pub const FREQ_ZERO: f32 = 1000.0;
/// Tone frequency transmitted for a `1` bit
pub const FREQ_ONE: f32 = 2000.0;
/// A detected peak within this distance (Hz, inclusive) of a target
/// frequency counts as that symbol; anything else is treated as no tone.
pub const FREQ_MARGIN: f32 = 50.0;

/// Output amplitude factor relative to full scale (0 < factor <= 1)
pub const AMPLITUDE: f32 = 0.8;

// Frame layout (bit widths)
pub const ADDRESS_BITS: usize = 48;
pub const LENGTH_BITS: usize = 16;
pub const CHECKSUM_BITS: usize = 32;
pub const PREAMBLE_BITS: usize = 56;
pub const DELIMITER_BITS: usize = 8;
/// Preamble plus start delimiter, discarded when decoding a full frame
pub const SYNC_HEADER_BITS: usize = PREAMBLE_BITS + DELIMITER_BITS;

/// Modem parameters consumed by the modulator and demodulator.
///
/// `Default` mirrors the crate-level constants; tests and callers with
/// unusual audio paths can override individual fields.
#[derive(Debug, Clone)]
pub struct ModemConfig {
    pub sample_rate: usize,
    pub samples_per_bit: usize,
    pub freq_zero: f32,
    pub freq_one: f32,
    pub freq_margin: f32,
    pub amplitude: f32,
    /// Fraction of a bit period the clock-sync search slides per step
    pub sync_step: f32,
    /// FFT peak magnitudes at or below this level count as silence
    pub silence_threshold: f32,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE,
            samples_per_bit: SAMPLES_PER_BIT,
            freq_zero: FREQ_ZERO,
            freq_one: FREQ_ONE,
            freq_margin: FREQ_MARGIN,
            amplitude: AMPLITUDE,
            sync_step: 0.1,
            silence_threshold: 1.0,
        }
    }
}

impl ModemConfig {
    /// Number of samples the synchronization search slides per step,
    /// always at least one sample.
    pub fn sync_step_samples(&self) -> usize {
        ((self.samples_per_bit as f32 * self.sync_step) as usize).max(1)
    }
}
