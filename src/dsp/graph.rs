//! The kick processing graph.
//!
//! Topology is fixed at construction:
//!
//! ```text
//! source → lowpass → distortion → compressor → makeup gain → out
//! ```
//!
//! Only coefficients change afterwards. A new graph is built when a new
//! source sample is loaded; parameter changes go through
//! [`ProcessingGraph::apply_config`], which mutates each stage in place.
//! There is no amplitude envelope stage: gating a short transient truncates
//! it audibly, so shaping is left to the source's own decay and the
//! compressor.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::KickError;
use crate::params::ProcessingGraphConfig;

use super::compressor::Compressor;
use super::distortion::Distortion;
use super::filter::BiquadFilter;

pub const MAX_CHANNELS: usize = 2;

#[derive(Debug, Clone)]
pub struct ProcessingGraph {
    sample_rate: f64,
    channels: usize,
    filters: [BiquadFilter; MAX_CHANNELS],
    shapers: [Distortion; MAX_CHANNELS],
    compressor: Compressor,
    makeup_gain: f64,
    config: ProcessingGraphConfig,
    scratch: [f64; MAX_CHANNELS],
}

impl ProcessingGraph {
    /// Build a graph for `channels` (1 or 2) at `sample_rate`.
    pub fn new(
        config: &ProcessingGraphConfig,
        sample_rate: f64,
        channels: usize,
    ) -> Result<Self, KickError> {
        if !(1..=MAX_CHANNELS).contains(&channels) {
            return Err(KickError::GraphConstruction(format!(
                "unsupported channel count {channels}"
            )));
        }
        if !sample_rate.is_finite() || sample_rate < 8_000.0 {
            return Err(KickError::GraphConstruction(format!(
                "unsupported sample rate {sample_rate}"
            )));
        }

        let filter = BiquadFilter::new(config.filter_frequency, config.filter_q, sample_rate);
        let shaper = Distortion::new(config.drive);
        let compressor = Compressor::new(
            sample_rate,
            config.compressor_threshold,
            config.compressor_ratio,
            config.compressor_attack,
            config.compressor_release,
        );

        Ok(ProcessingGraph {
            sample_rate,
            channels,
            filters: [filter.clone(), filter],
            shapers: [shaper.clone(), shaper],
            compressor,
            makeup_gain: config.makeup_gain,
            config: *config,
            scratch: [0.0; MAX_CHANNELS],
        })
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// The coefficients currently in effect.
    pub fn config(&self) -> &ProcessingGraphConfig {
        &self.config
    }

    /// Update every stage's coefficients without touching its state.
    pub fn apply_config(&mut self, config: &ProcessingGraphConfig) {
        for f in self.filters.iter_mut() {
            f.set_frequency(config.filter_frequency);
            f.set_q(config.filter_q);
        }
        for d in self.shapers.iter_mut() {
            d.set_drive(config.drive);
        }
        self.compressor.set_threshold(config.compressor_threshold);
        self.compressor.set_ratio(config.compressor_ratio);
        self.compressor.set_attack(config.compressor_attack);
        self.compressor.set_release(config.compressor_release);
        self.makeup_gain = config.makeup_gain;
        self.config = *config;
    }

    /// Run one interleaved frame through the chain in place.
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f32]) {
        let ch = self.channels.min(frame.len());
        for c in 0..ch {
            let filtered = self.filters[c].process(f64::from(frame[c]));
            self.scratch[c] = self.shapers[c].process(filtered);
        }

        self.compressor.process_frame(&mut self.scratch[..ch]);

        for c in 0..ch {
            frame[c] = (self.scratch[c] * self.makeup_gain) as f32;
        }
    }

    /// Run an interleaved block through the chain in place.
    pub fn process_interleaved(&mut self, data: &mut [f32]) {
        let ch = self.channels;
        for frame in data.chunks_exact_mut(ch) {
            self.process_frame(frame);
        }
    }

    /// Clear all stage state (filter memory, oversampler history, envelope).
    pub fn reset(&mut self) {
        for f in self.filters.iter_mut() {
            f.reset();
        }
        for d in self.shapers.iter_mut() {
            d.reset();
        }
        self.compressor.reset();
    }
}

// ── Control → audio handoff ─────────────────────────────────

const CONFIG_FIELDS: usize = 8;

/// Lock-free handoff of a [`ProcessingGraphConfig`] from the control path
/// to the audio path.
///
/// Single writer, single reader. The writer bumps `sequence` to an odd
/// value, stores the fields, then bumps it to even again. The reader takes
/// a copy only when it sees the same even sequence before and after the
/// read, so it never applies a half-written config and never waits.
#[derive(Debug)]
pub struct LiveConfig {
    sequence: AtomicU64,
    fields: [AtomicU64; CONFIG_FIELDS],
}

impl LiveConfig {
    pub fn new(config: &ProcessingGraphConfig) -> Self {
        let live = LiveConfig {
            sequence: AtomicU64::new(0),
            fields: Default::default(),
        };
        live.store_fields(config);
        live
    }

    fn store_fields(&self, config: &ProcessingGraphConfig) {
        for (slot, value) in self.fields.iter().zip(to_fields(config)) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
    }

    /// Publish a new config. Control path only.
    pub fn store(&self, config: &ProcessingGraphConfig) {
        self.sequence.fetch_add(1, Ordering::AcqRel);
        self.store_fields(config);
        self.sequence.fetch_add(1, Ordering::Release);
    }

    /// Current publication counter; changes on every [`store`](Self::store).
    pub fn version(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Read a consistent copy, or `None` if a write is in flight.
    pub fn try_load(&self) -> Option<(u64, ProcessingGraphConfig)> {
        let before = self.sequence.load(Ordering::Acquire);
        if before % 2 == 1 {
            return None;
        }
        let mut values = [0.0; CONFIG_FIELDS];
        for (v, slot) in values.iter_mut().zip(self.fields.iter()) {
            *v = f64::from_bits(slot.load(Ordering::Relaxed));
        }
        std::sync::atomic::fence(Ordering::Acquire);
        let after = self.sequence.load(Ordering::Relaxed);
        (before == after).then(|| (before, from_fields(values)))
    }

    /// Spin until a consistent copy is available. Never call on the audio
    /// thread; use [`try_load`](Self::try_load) there.
    pub fn load(&self) -> ProcessingGraphConfig {
        loop {
            if let Some((_, config)) = self.try_load() {
                return config;
            }
            std::hint::spin_loop();
        }
    }
}

fn to_fields(c: &ProcessingGraphConfig) -> [f64; CONFIG_FIELDS] {
    [
        c.filter_frequency,
        c.filter_q,
        c.drive,
        c.compressor_threshold,
        c.compressor_ratio,
        c.compressor_attack,
        c.compressor_release,
        c.makeup_gain,
    ]
}

fn from_fields(v: [f64; CONFIG_FIELDS]) -> ProcessingGraphConfig {
    ProcessingGraphConfig {
        filter_frequency: v[0],
        filter_q: v[1],
        drive: v[2],
        compressor_threshold: v[3],
        compressor_ratio: v[4],
        compressor_attack: v[5],
        compressor_release: v[6],
        makeup_gain: v[7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{map, ParameterSet};
    use std::f64::consts::PI;
    use std::sync::Arc;

    fn kick_like(frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| {
                let t = i as f64 / 44100.0;
                ((2.0 * PI * 60.0 * t).sin() * (1.0 - t * 4.0).max(0.0) * 0.8) as f32
            })
            .collect()
    }

    #[test]
    fn rejects_unsupported_channel_counts() {
        let config = map(&ParameterSet::default());
        assert!(ProcessingGraph::new(&config, 44100.0, 0).is_err());
        assert!(ProcessingGraph::new(&config, 44100.0, 3).is_err());
        assert!(ProcessingGraph::new(&config, 44100.0, 2).is_ok());
    }

    #[test]
    fn silence_stays_silent() {
        let config = map(&ParameterSet {
            punch: 100,
            ..ParameterSet::default()
        });
        let mut graph = ProcessingGraph::new(&config, 44100.0, 1).unwrap();
        let mut data = vec![0.0f32; 512];
        graph.process_interleaved(&mut data);
        assert!(data.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn processing_changes_energy() {
        let input = kick_like(11025);
        let in_rms = crate::dsp::buffer::rms(&input);
        for punch in [0u8, 50, 100] {
            let config = map(&ParameterSet {
                punch,
                brightness: 30,
                ..ParameterSet::default()
            });
            let mut graph = ProcessingGraph::new(&config, 44100.0, 1).unwrap();
            let mut out = input.clone();
            graph.process_interleaved(&mut out);
            let out_rms = crate::dsp::buffer::rms(&out);
            assert!(
                (out_rms - in_rms).abs() > 1e-3,
                "punch {punch}: in {in_rms} vs out {out_rms}"
            );
        }
    }

    #[test]
    fn apply_config_matches_fresh_graph() {
        let a = map(&ParameterSet::default());
        let b = map(&ParameterSet {
            brightness: 90,
            warmth: 10,
            punch: 40,
            attack: 5,
            decay: 90,
            sustain: 0,
            release: 95,
        });
        let input = kick_like(4096);

        let mut mutated = ProcessingGraph::new(&a, 44100.0, 1).unwrap();
        mutated.apply_config(&b);
        let mut fresh = ProcessingGraph::new(&b, 44100.0, 1).unwrap();

        let mut x = input.clone();
        let mut y = input;
        mutated.process_interleaved(&mut x);
        fresh.process_interleaved(&mut y);
        assert_eq!(x, y);
        assert_eq!(mutated.config(), &b);
    }

    #[test]
    fn stereo_channels_are_processed_independently_but_linked() {
        let config = map(&ParameterSet::default());
        let mut graph = ProcessingGraph::new(&config, 44100.0, 2).unwrap();
        let mono = kick_like(2048);
        let mut stereo: Vec<f32> = mono.iter().flat_map(|&s| [s, s]).collect();
        graph.process_interleaved(&mut stereo);
        for frame in stereo.chunks_exact(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn live_config_round_trips_a_store() {
        let live = LiveConfig::new(&map(&ParameterSet::default()));
        let v0 = live.version();
        let next = map(&ParameterSet {
            brightness: 100,
            ..ParameterSet::default()
        });
        live.store(&next);
        let (v1, loaded) = live.try_load().unwrap();
        assert_ne!(v0, v1);
        assert_eq!(loaded, next);
        assert_eq!(live.load(), next);
    }

    #[test]
    fn live_config_never_tears_across_threads() {
        let a = map(&ParameterSet {
            brightness: 0,
            warmth: 0,
            punch: 0,
            attack: 0,
            decay: 60,
            sustain: 0,
            release: 0,
        });
        let b = map(&ParameterSet {
            brightness: 100,
            warmth: 100,
            punch: 100,
            attack: 100,
            decay: 100,
            sustain: 100,
            release: 100,
        });
        let live = Arc::new(LiveConfig::new(&a));
        let writer = {
            let live = Arc::clone(&live);
            std::thread::spawn(move || {
                for i in 0..20_000 {
                    live.store(if i % 2 == 0 { &b } else { &a });
                }
            })
        };
        for _ in 0..20_000 {
            if let Some((_, c)) = live.try_load() {
                assert!(c == a || c == b, "torn read: {c:?}");
            }
        }
        writer.join().unwrap();
    }
}
