//! SpectralFilterNode: per-channel IIR filtering of broadband data.
//!
//! Each response is a cascade of second-order sections:
//!
//! - low/high pass: two Butterworth sections (4th order)
//! - band pass: high pass at `low_cutoff_hz` then low pass at `high_cutoff_hz`
//! - band stop: two notches at the geometric centre of the band
//!
//! Channel state persists across records and is primed with the first sample
//! so a DC offset does not ring through. Coefficients and state are rebuilt
//! whenever the incoming sample rate changes.

use crate::ndtp::{BroadbandFrame, ChannelSamples, MAX_BROADBAND_BIT_WIDTH};
use crate::pipeline::error::{PipelineError, PipelineResult};
use crate::pipeline::factory::ConfigureEnv;
use crate::pipeline::graph::NodeConfig;
use crate::pipeline::id::NodeId;
use crate::pipeline::node::{NodeContext, NodePlugin};
use crate::pipeline::node_type::NodeKind;
use crate::pipeline::record::Record;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::f64::consts::PI;

/// Q of the two sections of a 4th-order Butterworth filter.
const BUTTERWORTH_Q: [f64; 2] = [0.541_196_1, 1.306_563];

/// Cutoffs are kept below this fraction of the sample rate.
const MAX_CUTOFF_RATIO: f64 = 0.49;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMethod {
    LowPass,
    HighPass,
    #[default]
    BandPass,
    BandStop,
}

impl FilterMethod {
    /// Whether the response removes DC, so output is centred on zero.
    fn blocks_dc(self) -> bool {
        matches!(self, FilterMethod::HighPass | FilterMethod::BandPass)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralFilterConfig {
    pub method: FilterMethod,
    pub low_cutoff_hz: f64,
    pub high_cutoff_hz: f64,
}

impl Default for SpectralFilterConfig {
    fn default() -> Self {
        Self {
            method: FilterMethod::BandPass,
            low_cutoff_hz: 300.0,
            high_cutoff_hz: 3000.0,
        }
    }
}

impl NodeConfig for SpectralFilterConfig {
    const KIND: NodeKind = NodeKind::SpectralFilter;
}

/// Normalized biquad coefficients (a0 = 1).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    fn normalized(b: [f64; 3], a: [f64; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
        }
    }

    fn omega(cutoff_hz: f64, sample_rate_hz: f64, q: f64) -> (f64, f64) {
        let w0 = 2.0 * PI * cutoff_hz / sample_rate_hz;
        (w0.cos(), w0.sin() / (2.0 * q))
    }

    pub fn low_pass(cutoff_hz: f64, sample_rate_hz: f64, q: f64) -> Self {
        let (cos, alpha) = Self::omega(cutoff_hz, sample_rate_hz, q);
        Self::normalized(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    pub fn high_pass(cutoff_hz: f64, sample_rate_hz: f64, q: f64) -> Self {
        let (cos, alpha) = Self::omega(cutoff_hz, sample_rate_hz, q);
        Self::normalized(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    pub fn notch(centre_hz: f64, sample_rate_hz: f64, q: f64) -> Self {
        let (cos, alpha) = Self::omega(centre_hz, sample_rate_hz, q);
        Self::normalized([1.0, -2.0 * cos, 1.0], [1.0 + alpha, -2.0 * cos, 1.0 - alpha])
    }

    /// Gain at 0 Hz.
    pub fn dc_gain(&self) -> f64 {
        let den = 1.0 + self.a1 + self.a2;
        if den.abs() < f64::EPSILON {
            0.0
        } else {
            (self.b0 + self.b1 + self.b2) / den
        }
    }
}

/// Transposed direct form II state of one section.
#[derive(Debug, Clone, Copy, Default)]
struct SectionState {
    z1: f64,
    z2: f64,
}

impl SectionState {
    fn process(&mut self, c: &Biquad, x: f64) -> f64 {
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Steady state for a constant input `x`; returns the section output.
    fn prime(&mut self, c: &Biquad, x: f64) -> f64 {
        let y = c.dc_gain() * x;
        self.z2 = c.b2 * x - c.a2 * y;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        y
    }
}

/// Section coefficients for `config` at `sample_rate_hz`.
pub fn design(config: &SpectralFilterConfig, sample_rate_hz: u32) -> Vec<Biquad> {
    let fs = f64::from(sample_rate_hz);
    let limit = fs * MAX_CUTOFF_RATIO;
    let low = config.low_cutoff_hz.min(limit);
    let high = config.high_cutoff_hz.min(limit);

    match config.method {
        FilterMethod::LowPass => BUTTERWORTH_Q.iter().map(|&q| Biquad::low_pass(high, fs, q)).collect(),
        FilterMethod::HighPass => BUTTERWORTH_Q.iter().map(|&q| Biquad::high_pass(low, fs, q)).collect(),
        FilterMethod::BandPass => BUTTERWORTH_Q
            .iter()
            .map(|&q| Biquad::high_pass(low, fs, q))
            .chain(BUTTERWORTH_Q.iter().map(|&q| Biquad::low_pass(high, fs, q)))
            .collect(),
        FilterMethod::BandStop => {
            let centre = (low * high).sqrt();
            let q = centre / (high - low).max(f64::EPSILON);
            vec![Biquad::notch(centre, fs, q); 2]
        }
    }
}

pub struct SpectralFilterNode {
    id: NodeId,
    config: SpectralFilterConfig,
    sample_rate_hz: Option<u32>,
    sections: Vec<Biquad>,
    channels: HashMap<u32, Vec<SectionState>>,
    non_broadband: u64,
}

impl SpectralFilterNode {
    pub fn configure(config: SpectralFilterConfig, env: &mut ConfigureEnv) -> PipelineResult<Self> {
        let id = env.node_id;
        let needs_low = config.method != FilterMethod::LowPass;
        let needs_high = config.method != FilterMethod::HighPass;
        if (needs_low && !(config.low_cutoff_hz > 0.0)) || (needs_high && !(config.high_cutoff_hz > 0.0)) {
            return Err(PipelineError::invalid_config(id, "cutoff frequencies must be positive"));
        }
        if needs_low && needs_high && config.low_cutoff_hz >= config.high_cutoff_hz {
            return Err(PipelineError::invalid_config(
                id,
                format!(
                    "low cutoff {} Hz must be below high cutoff {} Hz",
                    config.low_cutoff_hz, config.high_cutoff_hz
                ),
            ));
        }
        Ok(Self {
            id,
            config,
            sample_rate_hz: None,
            sections: Vec::new(),
            channels: HashMap::new(),
            non_broadband: 0,
        })
    }

    fn retune(&mut self, sample_rate_hz: u32) {
        if self.sample_rate_hz == Some(sample_rate_hz) {
            return;
        }
        self.sections = design(&self.config, sample_rate_hz);
        self.channels.clear();
        self.sample_rate_hz = Some(sample_rate_hz);
        tracing::debug!(
            "Spectral filter {} tuned for {} Hz ({} sections)",
            self.id,
            sample_rate_hz,
            self.sections.len()
        );
    }

    /// Filter one frame; output keeps the input format unless the response
    /// removes DC from unsigned input, which then becomes signed.
    pub fn filter(&mut self, frame: &BroadbandFrame) -> BroadbandFrame {
        self.retune(frame.sample_rate_hz);

        let (is_signed, bit_width) = if !frame.is_signed && self.config.method.blocks_dc() {
            (true, (frame.bit_width + 1).min(MAX_BROADBAND_BIT_WIDTH))
        } else {
            (frame.is_signed, frame.bit_width)
        };
        let (lo, hi) = sample_bounds(is_signed, bit_width);

        let sections = &self.sections;
        let channels = frame
            .channels
            .iter()
            .map(|channel| {
                let state = self.channels.entry(channel.channel_id).or_insert_with(|| {
                    let mut state = vec![SectionState::default(); sections.len()];
                    if let Some(&first) = channel.samples.first() {
                        let mut x = f64::from(first);
                        for (s, c) in state.iter_mut().zip(sections) {
                            x = s.prime(c, x);
                        }
                    }
                    state
                });
                let samples = channel
                    .samples
                    .iter()
                    .map(|&sample| {
                        let mut x = f64::from(sample);
                        for (s, c) in state.iter_mut().zip(sections) {
                            x = s.process(c, x);
                        }
                        (x.round() as i64).clamp(lo, hi) as i32
                    })
                    .collect();
                ChannelSamples::new(channel.channel_id, samples)
            })
            .collect();

        BroadbandFrame {
            timestamp_ns: frame.timestamp_ns,
            is_signed,
            bit_width,
            sample_rate_hz: frame.sample_rate_hz,
            channels,
        }
    }
}

fn sample_bounds(is_signed: bool, bit_width: u8) -> (i64, i64) {
    let width = u32::from(bit_width.max(1));
    if is_signed {
        (-(1i64 << (width - 1)), (1i64 << (width - 1)) - 1)
    } else {
        (0, (1i64 << width) - 1)
    }
}

impl NodePlugin for SpectralFilterNode {
    fn kind(&self) -> NodeKind {
        NodeKind::SpectralFilter
    }

    fn on_data_received(&mut self, record: Record, ctx: &NodeContext) {
        match record {
            Record::Broadband(frame) => {
                let filtered = self.filter(&frame);
                ctx.emit(Record::from(filtered));
            }
            Record::Spiketrain(_) => {
                self.non_broadband += 1;
                if self.non_broadband == 1 {
                    tracing::warn!("Spectral filter {} received non-broadband data", self.id);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportSettings;
    use crate::pipeline::factory::PortAllocator;

    fn node(config: SpectralFilterConfig) -> PipelineResult<SpectralFilterNode> {
        let transport = TransportSettings::default();
        let mut ports = PortAllocator::new(0);
        let mut env = ConfigureEnv {
            node_id: NodeId(3),
            transport: &transport,
            ports: &mut ports,
        };
        SpectralFilterNode::configure(config, &mut env)
    }

    fn sine(freq: f64, rate: f64, n: usize, amplitude: f64) -> Vec<i32> {
        (0..n)
            .map(|i| (amplitude * (2.0 * PI * freq * i as f64 / rate).sin()).round() as i32)
            .collect()
    }

    fn rms(samples: &[i32]) -> f64 {
        (samples.iter().map(|&s| f64::from(s).powi(2)).sum::<f64>() / samples.len() as f64).sqrt()
    }

    fn frame(samples: Vec<i32>) -> BroadbandFrame {
        BroadbandFrame {
            timestamp_ns: 0,
            is_signed: true,
            bit_width: 16,
            sample_rate_hz: 16_000,
            channels: vec![ChannelSamples::new(1, samples)],
        }
    }

    #[test]
    fn test_dc_gain_of_sections() {
        assert!((Biquad::low_pass(1000.0, 16000.0, 0.7071).dc_gain() - 1.0).abs() < 1e-9);
        assert!(Biquad::high_pass(1000.0, 16000.0, 0.7071).dc_gain().abs() < 1e-9);
        assert!((Biquad::notch(1000.0, 16000.0, 2.0).dc_gain() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_low_pass_attenuates_high_frequency() {
        let mut filter = node(SpectralFilterConfig {
            method: FilterMethod::LowPass,
            low_cutoff_hz: 0.0,
            high_cutoff_hz: 500.0,
        })
        .unwrap();
        let pass = filter.filter(&frame(sine(50.0, 16000.0, 4000, 10000.0)));
        let mut filter = node(SpectralFilterConfig {
            method: FilterMethod::LowPass,
            low_cutoff_hz: 0.0,
            high_cutoff_hz: 500.0,
        })
        .unwrap();
        let stop = filter.filter(&frame(sine(5000.0, 16000.0, 4000, 10000.0)));

        let tail = |f: &BroadbandFrame| rms(&f.channels[0].samples[2000..]);
        assert!(tail(&pass) > 6000.0);
        assert!(tail(&stop) < 100.0);
    }

    #[test]
    fn test_primed_state_passes_constant_input() {
        let mut filter = node(SpectralFilterConfig {
            method: FilterMethod::LowPass,
            low_cutoff_hz: 0.0,
            high_cutoff_hz: 500.0,
        })
        .unwrap();
        let out = filter.filter(&frame(vec![1000; 64]));
        assert!(out.channels[0].samples.iter().all(|&s| (s - 1000).abs() <= 1));
    }

    #[test]
    fn test_unsigned_high_pass_output_is_signed() {
        let mut filter = node(SpectralFilterConfig {
            method: FilterMethod::HighPass,
            low_cutoff_hz: 300.0,
            high_cutoff_hz: 0.0,
        })
        .unwrap();
        let mut input = frame(vec![2048; 32]);
        input.is_signed = false;
        input.bit_width = 12;
        let out = filter.filter(&input);
        assert!(out.is_signed);
        assert_eq!(out.bit_width, 13);
        assert!(out.channels[0].samples.iter().all(|&s| s.abs() <= 1));
    }

    #[test]
    fn test_state_reset_on_rate_change() {
        let mut filter = node(SpectralFilterConfig::default()).unwrap();
        filter.filter(&frame(vec![1, 2, 3]));
        assert_eq!(filter.channels.len(), 1);
        let mut other = frame(vec![1, 2, 3]);
        other.sample_rate_hz = 30_000;
        other.channels[0].channel_id = 9;
        filter.filter(&other);
        assert_eq!(filter.sample_rate_hz, Some(30_000));
        assert!(filter.channels.contains_key(&9));
        assert!(!filter.channels.contains_key(&1));
    }

    #[test]
    fn test_rejects_inverted_band() {
        let result = node(SpectralFilterConfig {
            method: FilterMethod::BandStop,
            low_cutoff_hz: 500.0,
            high_cutoff_hz: 100.0,
        });
        assert!(matches!(result, Err(PipelineError::InvalidConfig { node_id: NodeId(3), .. })));
    }
}
