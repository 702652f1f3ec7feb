//! Per-window spectral peak detection for the demodulator.

use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::error::{LinkError, Result};

/// Strongest frequency component of one analysis window.
#[derive(Debug, Clone, Copy)]
pub struct Peak {
    pub frequency: f32,
    pub magnitude: f32,
}

/// Real-input FFT wrapper sized for one bit period.
///
/// Plans the transform once and reuses scratch buffers across windows.
pub struct SpectrumAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    window_len: usize,
    sample_rate: f32,
    input: Vec<f32>,
    output: Vec<Complex<f32>>,
}

impl SpectrumAnalyzer {
    pub fn new(window_len: usize, sample_rate: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(window_len);
        let output = fft.make_output_vec();
        Self {
            fft,
            window_len,
            sample_rate: sample_rate as f32,
            input: vec![0.0; window_len],
            output,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    /// Locate the frequency bin with the largest magnitude.
    ///
    /// The window must contain exactly one bit period of samples; anything
    /// else aborts the listen cycle.
    pub fn peak(&mut self, samples: &[f32]) -> Result<Peak> {
        if samples.len() != self.window_len {
            return Err(LinkError::InvalidWindow {
                expected: self.window_len,
                got: samples.len(),
            });
        }
        self.input.copy_from_slice(samples);
        self.fft
            .process(&mut self.input, &mut self.output)
            .map_err(|e| LinkError::Fft(e.to_string()))?;

        let mut best_bin = 0;
        let mut best_magnitude = 0.0f32;
        for (bin, value) in self.output.iter().enumerate() {
            let magnitude = value.norm();
            if magnitude > best_magnitude {
                best_magnitude = magnitude;
                best_bin = bin;
            }
        }

        Ok(Peak {
            frequency: best_bin as f32 * self.sample_rate / self.window_len as f32,
            magnitude: best_magnitude,
        })
    }
}
