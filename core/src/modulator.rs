//! Bit-to-tone FSK modulation.

use std::f32::consts::PI;

use bitvec::prelude::*;

use crate::error::Result;
use crate::stream::SampleSink;
use crate::ModemConfig;

/// Keys each bit onto one of two sine tones, one bit period per bit.
pub struct Modulator {
    config: ModemConfig,
}

impl Modulator {
    pub fn new(config: ModemConfig) -> Self {
        Self { config }
    }

    /// Synthesize one bit period of a pure tone at `frequency`.
    pub fn tone(&self, frequency: f32) -> Vec<f32> {
        let rate = self.config.sample_rate as f32;
        (0..self.config.samples_per_bit)
            .map(|n| self.config.amplitude * (2.0 * PI * frequency * n as f32 / rate).sin())
            .collect()
    }

    fn bit_frequency(&self, bit: bool) -> f32 {
        if bit {
            self.config.freq_one
        } else {
            self.config.freq_zero
        }
    }

    /// Render a bit sequence into a contiguous sample buffer.
    pub fn modulate(&self, bits: &BitSlice<u8, Msb0>) -> Vec<f32> {
        let mut samples = Vec::with_capacity(bits.len() * self.config.samples_per_bit);
        for bit in bits {
            samples.extend_from_slice(&self.tone(self.bit_frequency(*bit)));
        }
        samples
    }

    /// Write each bit's tone to the sink in order, with no gaps, then
    /// drain so playback has completed when this returns.
    pub fn transmit(&self, bits: &BitSlice<u8, Msb0>, sink: &mut impl SampleSink) -> Result<()> {
        for bit in bits {
            sink.write(&self.tone(self.bit_frequency(*bit)))?;
        }
        sink.drain()
    }
}

impl Default for Modulator {
    fn default() -> Self {
        Self::new(ModemConfig::default())
    }
}
