//! Perceptual parameters and their mapping onto processing coefficients.
//!
//! `map` is the single place where a knob position becomes a concrete DSP
//! value. It is pure and total: out-of-range inputs are clamped, never
//! rejected.

use serde::{Deserialize, Serialize};

// ── Coefficient ranges ──────────────────────────────────────

pub const CUTOFF_MIN_HZ: f64 = 200.0;
pub const CUTOFF_MAX_HZ: f64 = 20_000.0;
pub const Q_MIN: f64 = 0.5;
pub const Q_MAX: f64 = 10.0;
pub const DRIVE_MAX: f64 = 0.2;
pub const ATTACK_MIN_S: f64 = 0.001;
pub const ATTACK_MAX_S: f64 = 0.050;
pub const RELEASE_MIN_S: f64 = 0.010;
pub const RELEASE_MAX_S: f64 = 0.500;

pub const COMPRESSOR_THRESHOLD_DB: f64 = -30.0;
pub const COMPRESSOR_RATIO: f64 = 4.0;
pub const MAKEUP_GAIN: f64 = 2.0;

/// Lowest decay the producer is allowed to hand us.
pub const DECAY_FLOOR: u8 = 60;

/// Seven normalized perceptual controls, each 0–100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterSet {
    pub brightness: u8,
    pub warmth: u8,
    pub punch: u8,
    pub attack: u8,
    pub decay: u8,
    pub sustain: u8,
    pub release: u8,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            brightness: 50,
            warmth: 50,
            punch: 0,
            attack: 50,
            decay: 60,
            sustain: 50,
            release: 50,
        }
    }
}

/// Decay and sustain, normalized to 0–1.
///
/// Nothing in the processing graph consumes these yet. They are carried so
/// a future envelope-aware stage can pick them up without a format change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvelopeHints {
    pub decay: f64,
    pub sustain: f64,
}

impl ParameterSet {
    /// Every field clamped to 0–100, decay additionally to 60–100.
    pub fn clamped(&self) -> Self {
        Self {
            brightness: self.brightness.min(100),
            warmth: self.warmth.min(100),
            punch: self.punch.min(100),
            attack: self.attack.min(100),
            decay: self.decay.clamp(DECAY_FLOOR, 100),
            sustain: self.sustain.min(100),
            release: self.release.min(100),
        }
    }

    pub fn envelope_hints(&self) -> EnvelopeHints {
        let p = self.clamped();
        EnvelopeHints {
            decay: unit(p.decay),
            sustain: unit(p.sustain),
        }
    }
}

/// Concrete coefficients for every stage of the processing graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingGraphConfig {
    /// Lowpass cutoff in Hz.
    pub filter_frequency: f64,
    /// Lowpass resonance.
    pub filter_q: f64,
    /// Distortion drive, 0–0.2. Zero means the stage is bypassed.
    pub drive: f64,
    /// Compressor threshold in dB.
    pub compressor_threshold: f64,
    /// Compressor ratio (x:1).
    pub compressor_ratio: f64,
    /// Compressor attack in seconds.
    pub compressor_attack: f64,
    /// Compressor release in seconds.
    pub compressor_release: f64,
    /// Linear output gain after compression.
    pub makeup_gain: f64,
}

impl Default for ProcessingGraphConfig {
    fn default() -> Self {
        map(&ParameterSet::default())
    }
}

impl ProcessingGraphConfig {
    /// True when no stage would alter the signal.
    ///
    /// With the fixed makeup gain this never holds for mapped configs; it
    /// exists so hand-built configs can be checked the same way.
    pub fn is_identity(&self) -> bool {
        self.drive == 0.0
            && self.filter_frequency >= CUTOFF_MAX_HZ
            && self.compressor_ratio <= 1.0
            && self.makeup_gain == 1.0
    }
}

#[inline]
fn unit(value: u8) -> f64 {
    f64::from(value.min(100)) / 100.0
}

/// Map perceptual parameters to processing coefficients.
pub fn map(params: &ParameterSet) -> ProcessingGraphConfig {
    let p = params.clamped();

    // Equal knob steps should sound like equal brightness steps, so the
    // cutoff moves on a log scale.
    let filter_frequency = CUTOFF_MIN_HZ * (CUTOFF_MAX_HZ / CUTOFF_MIN_HZ).powf(unit(p.brightness));
    let filter_q = Q_MIN + unit(p.warmth) * (Q_MAX - Q_MIN);
    let drive = unit(p.punch) * DRIVE_MAX;
    let compressor_attack = ATTACK_MIN_S + unit(p.attack) * (ATTACK_MAX_S - ATTACK_MIN_S);
    let compressor_release = RELEASE_MIN_S + unit(p.release) * (RELEASE_MAX_S - RELEASE_MIN_S);

    ProcessingGraphConfig {
        filter_frequency,
        filter_q,
        drive,
        compressor_threshold: COMPRESSOR_THRESHOLD_DB,
        compressor_ratio: COMPRESSOR_RATIO,
        compressor_attack,
        compressor_release,
        makeup_gain: MAKEUP_GAIN,
    }
}
