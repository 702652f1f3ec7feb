//! FSK demodulation: window-by-window tone detection, clock
//! synchronization, preamble tracking and loss-of-carrier termination.

use log::{debug, info};

use crate::error::{LinkError, Result};
use crate::framing::{self, BitString, Frame};
use crate::spectrum::{Peak, SpectrumAnalyzer};
use crate::stream::SampleSource;
use crate::ModemConfig;

/// Bits that must accumulate before the start delimiter is looked for.
const MIN_PREAMBLE_BITS: usize = 10;

/// Receiver progress within one listen cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// No tone heard yet
    Idle,
    /// Hill-climbing the sample window against the sender's bit clock
    Syncing,
    /// Tone present, collecting preamble bits
    Preamble,
    /// Start delimiter seen, collecting frame bits
    Payload,
    /// Carrier lost, frame handed to the codec
    Done,
}

/// Recovers one frame from a sample stream.
///
/// All state is owned by the instance and reset at the start of every
/// [`listen`](Self::listen) call; nothing survives between runs.
pub struct Demodulator {
    config: ModemConfig,
    analyzer: SpectrumAnalyzer,
    bits: BitString,
    state: State,
    synced: bool,
}

impl Demodulator {
    pub fn new(config: ModemConfig) -> Self {
        let analyzer = SpectrumAnalyzer::new(config.samples_per_bit, config.sample_rate);
        Self {
            config,
            analyzer,
            bits: BitString::new(),
            state: State::Idle,
            synced: false,
        }
    }

    /// Listen until the carrier drops, then decode the collected bits.
    ///
    /// Returns [`LinkError::NoCarrier`] if the source ends before any
    /// symbol was accepted; any codec failure is passed through.
    pub fn listen(&mut self, source: &mut impl SampleSource) -> Result<Frame> {
        self.reset();

        loop {
            let Some(window) = self.read_window(source)? else {
                if self.bits.is_empty() {
                    return Err(LinkError::NoCarrier);
                }
                break;
            };
            let peak = self.analyzer.peak(&window)?;

            match self.classify(&peak) {
                Some(bit) => {
                    if self.state == State::Idle {
                        info!("Preamble started");
                        self.state = State::Preamble;
                    }
                    if !self.synced && bit {
                        self.synchronize(source, window, peak.magnitude)?;
                        self.synced = true;
                    }
                    self.track_delimiter();
                    self.bits.push(bit);
                    debug!("bits: {}", framing::bit_string(&self.bits));
                }
                None if !self.bits.is_empty() => break,
                None => {}
            }
        }

        self.state = State::Done;
        info!("Carrier lost after {} bits", self.bits.len());
        framing::decode(&self.bits, false)
    }

    fn reset(&mut self) {
        self.bits.clear();
        self.state = State::Idle;
        self.synced = false;
    }

    /// Read one bit period of samples, zero-padding a short read at the
    /// end of the stream. `None` means the stream is exhausted.
    fn read_window(&mut self, source: &mut impl SampleSource) -> Result<Option<Vec<f32>>> {
        let mut window = source.read(self.config.samples_per_bit)?;
        if window.is_empty() {
            return Ok(None);
        }
        window.resize(self.config.samples_per_bit, 0.0);
        Ok(Some(window))
    }

    /// Map a spectral peak to a symbol: within margin (inclusive) of the
    /// low target is `0`, of the high target is `1`, anything else is no
    /// tone.
    fn classify(&self, peak: &Peak) -> Option<bool> {
        if peak.magnitude <= self.config.silence_threshold {
            return None;
        }
        if (peak.frequency - self.config.freq_zero).abs() <= self.config.freq_margin {
            Some(false)
        } else if (peak.frequency - self.config.freq_one).abs() <= self.config.freq_margin {
            Some(true)
        } else {
            None
        }
    }

    /// Align the sampling window to the sender's bit clock.
    ///
    /// Slides the window forward a fraction of a bit period at a time
    /// while the FFT peak magnitude keeps growing, and locks as soon as a
    /// slide loses energy.
    fn synchronize(
        &mut self,
        source: &mut impl SampleSource,
        mut window: Vec<f32>,
        mut best: f32,
    ) -> Result<()> {
        self.state = State::Syncing;
        let step = self.config.sync_step_samples();
        loop {
            let fresh = source.read(step)?;
            if fresh.len() < step {
                break;
            }
            window.drain(..step);
            window.extend_from_slice(&fresh);
            let peak = self.analyzer.peak(&window)?;
            if peak.magnitude < best {
                break;
            }
            best = peak.magnitude;
        }
        self.state = State::Preamble;
        Ok(())
    }

    /// Clear the bit buffer once the delimiter's trailing `11` has been
    /// seen, so only frame content accumulates afterwards. Checked before
    /// the current bit is pushed.
    fn track_delimiter(&mut self) {
        let n = self.bits.len();
        if self.state == State::Preamble
            && n > MIN_PREAMBLE_BITS
            && self.bits[n - 1]
            && self.bits[n - 2]
        {
            info!("Preamble ended");
            self.bits.clear();
            self.state = State::Payload;
        }
    }
}

impl Default for Demodulator {
    fn default() -> Self {
        Self::new(ModemConfig::default())
    }
}
