//! Procedural kick synthesis.
//!
//! Used when a requested sample has no recording behind it. Output is a
//! pure function of `(preset, sample_rate)`, so it can be pinned by
//! regression tests.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::dsp::SampleBuffer;
use crate::wav::encode_wav;

/// Weight of the partial at twice the instantaneous pitch.
const SECOND_PARTIAL: f64 = 0.3;
/// Weight of the partial at three times the instantaneous pitch.
const THIRD_PARTIAL: f64 = 0.15;
/// Output headroom applied after the amplitude envelope.
const OUTPUT_SCALE: f64 = 0.9;

/// Constants describing one synthetic kick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KickPreset {
    /// Starting pitch in Hz.
    pub pitch: f64,
    /// Total length in seconds.
    pub decay: f64,
    /// Amplitude envelope steepness (0–1).
    pub punch: f64,
    /// Harmonic content (0–1).
    pub tone: f64,
    /// Saturation amount (0–1).
    pub distortion: f64,
}

impl KickPreset {
    /// Number of samples this preset produces at `sample_rate`.
    pub fn length(&self, sample_rate: u32) -> usize {
        (f64::from(sample_rate) * self.decay.max(0.0)).round() as usize
    }
}

/// Render a preset to mono 16-bit PCM.
pub fn synthesize(preset: &KickPreset, sample_rate: u32) -> Vec<i16> {
    let length = preset.length(sample_rate);
    let decay = preset.decay;
    let sr = f64::from(sample_rate);
    let amp_exponent = 1.5 + preset.punch * 2.0;
    let drive = 1.0 + preset.distortion * 3.0;
    let drive_norm = drive.tanh();

    let mut pcm = Vec::with_capacity(length);
    for i in 0..length {
        let t = i as f64 / sr;

        // Fast exponential pitch drop: the "thump" sweep.
        let pitch = preset.pitch * 0.05_f64.powf(3.0 * t / decay);
        let amp = (1.0 - t / decay).max(0.0).powf(amp_exponent);

        let phase = 2.0 * PI * pitch * t;
        let mut s = phase.sin();
        if preset.tone > 0.0 {
            s += (2.0 * phase).sin() * preset.tone * SECOND_PARTIAL;
            s += (3.0 * phase).sin() * preset.tone * THIRD_PARTIAL;
        }
        if preset.distortion > 0.0 {
            s = (s * drive).tanh() / drive_norm;
        }

        let sample = (s * amp * OUTPUT_SCALE).clamp(-1.0, 1.0);
        pcm.push((sample * 32767.0) as i16);
    }
    pcm
}

/// Render a preset to a mono float buffer (the PCM, rescaled).
pub fn synthesize_buffer(preset: &KickPreset, sample_rate: u32) -> SampleBuffer {
    SampleBuffer::from_i16(&synthesize(preset, sample_rate), 1, sample_rate)
}

/// Render a preset straight to a mono WAV file image.
pub fn synthesize_wav(preset: &KickPreset, sample_rate: u32) -> Vec<u8> {
    encode_wav(&synthesize(preset, sample_rate), sample_rate, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ICE_CRYSTAL: KickPreset = KickPreset {
        pitch: 150.0,
        decay: 0.25,
        punch: 0.85,
        tone: 0.1,
        distortion: 0.2,
    };

    #[test]
    fn length_is_rounded_duration() {
        let pcm = synthesize(&ICE_CRYSTAL, 44100);
        assert_eq!(pcm.len(), 11025);
        assert_eq!(ICE_CRYSTAL.length(44100), (44100.0_f64 * 0.25).round() as usize);
    }

    #[test]
    fn samples_stay_in_range_and_decay() {
        let buf = synthesize_buffer(&ICE_CRYSTAL, 44100);
        assert!(buf.data.iter().all(|s| (-1.0..=1.0).contains(s)));

        let n = buf.data.len();
        let head = crate::dsp::buffer::rms(&buf.data[..n / 10]);
        let tail = crate::dsp::buffer::rms(&buf.data[n * 9 / 10..]);
        assert!(head > 0.1, "kick should start loud, rms {head}");
        assert!(tail < head * 0.05, "kick should die away: head {head}, tail {tail}");
        let last = buf.data[n - 1].abs();
        assert!(last < 1e-3, "last sample should be near zero, got {last}");
    }

    #[test]
    fn synthesis_is_deterministic() {
        assert_eq!(synthesize(&ICE_CRYSTAL, 44100), synthesize(&ICE_CRYSTAL, 44100));
        assert_eq!(synthesize_wav(&ICE_CRYSTAL, 22050), synthesize_wav(&ICE_CRYSTAL, 22050));
    }

    #[test]
    fn first_samples_follow_the_model() {
        let pcm = synthesize(&ICE_CRYSTAL, 44100);
        // t = 0: sin(0) = 0 for every partial
        assert_eq!(pcm[0], 0);

        let t = 1.0 / 44100.0;
        let pitch = 150.0 * 0.05_f64.powf(3.0 * t / 0.25);
        let phase = 2.0 * PI * pitch * t;
        let mut s = phase.sin() + (2.0 * phase).sin() * 0.1 * 0.3 + (3.0 * phase).sin() * 0.1 * 0.15;
        let drive = 1.0 + 0.2 * 3.0;
        s = (s * drive).tanh() / f64::tanh(drive);
        let amp = (1.0 - t / 0.25).powf(1.5 + 0.85 * 2.0);
        let expected = ((s * amp * 0.9).clamp(-1.0, 1.0) * 32767.0) as i16;
        assert_eq!(pcm[1], expected);
    }

    #[test]
    fn clean_preset_skips_partials_and_saturation() {
        let clean = KickPreset {
            tone: 0.0,
            distortion: 0.0,
            ..ICE_CRYSTAL
        };
        let pcm = synthesize(&clean, 44100);
        let t = 10.0 / 44100.0;
        let pitch = 150.0 * 0.05_f64.powf(3.0 * t / 0.25);
        let amp = (1.0 - t / 0.25).powf(1.5 + 0.85 * 2.0);
        let expected = ((2.0 * PI * pitch * t).sin() * amp * 0.9 * 32767.0) as i16;
        assert_eq!(pcm[10], expected);
    }

    #[test]
    fn wav_is_mono_at_requested_rate() {
        let wav = synthesize_wav(&ICE_CRYSTAL, 44100);
        assert_eq!(u16::from_le_bytes([wav[22], wav[23]]), 1);
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), 44100);
        assert_eq!(wav.len(), 44 + 11025 * 2);
    }
}
