//! Sample-stream contract between the modem and the audio medium.
//!
//! Samples are normalized `f32` in `[-1.0, 1.0]`; scaling to the device
//! sample format happens at the boundary that owns the device.

use crate::error::Result;

/// Blocking source of audio samples.
pub trait SampleSource {
    /// Read up to `count` samples. Returning fewer than `count` samples
    /// signals that the stream has ended; callers must not retry past
    /// a short read.
    fn read(&mut self, count: usize) -> Result<Vec<f32>>;
}

/// Blocking sink for audio samples.
pub trait SampleSink {
    fn write(&mut self, samples: &[f32]) -> Result<()>;

    /// Block until every written sample has been played out.
    fn drain(&mut self) -> Result<()>;
}

/// A [`SampleSource`] backed by a buffer, used for captured or file-loaded
/// audio.
#[derive(Debug)]
pub struct MemorySource {
    samples: Vec<f32>,
    position: usize,
}

impl MemorySource {
    pub fn new(samples: Vec<f32>) -> Self {
        Self {
            samples,
            position: 0,
        }
    }

    /// Samples not yet consumed.
    pub fn remaining(&self) -> usize {
        self.samples.len() - self.position
    }
}

impl SampleSource for MemorySource {
    fn read(&mut self, count: usize) -> Result<Vec<f32>> {
        let end = (self.position + count).min(self.samples.len());
        let window = self.samples[self.position..end].to_vec();
        self.position = end;
        Ok(window)
    }
}

/// A [`SampleSink`] collecting everything written into a buffer.
#[derive(Debug, Default)]
pub struct MemorySink {
    samples: Vec<f32>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

impl SampleSink for MemorySink {
    fn write(&mut self, samples: &[f32]) -> Result<()> {
        self.samples.extend_from_slice(samples);
        Ok(())
    }

    fn drain(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_short_read_at_end() {
        let mut source = MemorySource::new(vec![0.5; 10]);
        assert_eq!(source.read(8).unwrap().len(), 8);
        assert_eq!(source.read(8).unwrap().len(), 2);
        assert_eq!(source.read(8).unwrap().len(), 0);
        assert_eq!(source.remaining(), 0);
    }

    #[test]
    fn test_memory_sink_collects_in_order() {
        let mut sink = MemorySink::new();
        sink.write(&[1.0, 2.0]).unwrap();
        sink.write(&[3.0]).unwrap();
        sink.drain().unwrap();
        assert_eq!(sink.into_samples(), vec![1.0, 2.0, 3.0]);
    }
}
