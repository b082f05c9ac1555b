//! Compressor — dynamics processing for the kick chain.
//!
//! Feed-forward design with the parameter set of the WebAudio
//! DynamicsCompressorNode: threshold, ratio, knee, attack and release.
//! Channels are linked; one detector follows the peak across a frame and
//! the same gain is applied to every channel.

/// WebAudio's default knee width.
pub const DEFAULT_KNEE_DB: f64 = 30.0;
/// Level reported for digital silence.
const SILENCE_DB: f64 = -120.0;

#[inline]
fn to_db(level: f64) -> f64 {
    if level > 0.0 { 20.0 * level.log10() } else { SILENCE_DB }
}

#[inline]
fn from_db(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// One-pole smoothing coefficient for a time constant in seconds.
fn smoothing(seconds: f64, sample_rate: f64) -> f64 {
    (-1.0 / (seconds * sample_rate)).exp()
}

#[derive(Debug, Clone)]
pub struct Compressor {
    sample_rate: f64,
    /// dB, -100–0.
    threshold: f64,
    /// x:1, 1–20.
    ratio: f64,
    /// dB, 0–40. Zero is a hard knee.
    knee: f64,
    /// Seconds.
    attack: f64,
    /// Seconds.
    release: f64,
    attack_coef: f64,
    release_coef: f64,
    /// Smoothed linear peak level.
    detector: f64,
}

impl Compressor {
    pub fn new(sample_rate: f64, threshold: f64, ratio: f64, attack: f64, release: f64) -> Self {
        let mut comp = Compressor {
            sample_rate,
            threshold: 0.0,
            ratio: 1.0,
            knee: DEFAULT_KNEE_DB,
            attack: 0.0,
            release: 0.0,
            attack_coef: 0.0,
            release_coef: 0.0,
            detector: 0.0,
        };
        comp.set_threshold(threshold);
        comp.set_ratio(ratio);
        comp.set_attack(attack);
        comp.set_release(release);
        comp
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold.clamp(-100.0, 0.0);
    }

    pub fn set_ratio(&mut self, ratio: f64) {
        self.ratio = ratio.clamp(1.0, 20.0);
    }

    pub fn set_knee(&mut self, knee: f64) {
        self.knee = knee.clamp(0.0, 40.0);
    }

    /// The smoothing coefficient is only recomputed when the time changes.
    pub fn set_attack(&mut self, attack: f64) {
        let attack = attack.clamp(0.0001, 1.0);
        if attack != self.attack {
            self.attack = attack;
            self.attack_coef = smoothing(attack, self.sample_rate);
        }
    }

    pub fn set_release(&mut self, release: f64) {
        let release = release.clamp(0.001, 5.0);
        if release != self.release {
            self.release = release;
            self.release_coef = smoothing(release, self.sample_rate);
        }
    }

    pub fn attack(&self) -> f64 {
        self.attack
    }

    pub fn release(&self) -> f64 {
        self.release
    }

    /// Static curve: gain change in dB (never positive) at a detector level.
    ///
    /// Inside the knee the reduction grows quadratically from zero, so the
    /// curve and its slope are continuous at both knee edges.
    #[inline]
    fn gain_db(&self, level_db: f64) -> f64 {
        let slope = 1.0 - 1.0 / self.ratio;
        let over = level_db - self.threshold;
        let half = self.knee * 0.5;

        if over <= -half {
            0.0
        } else if over >= half {
            -over * slope
        } else {
            let x = over + half;
            -slope * x * x / (2.0 * self.knee)
        }
    }

    /// Process one frame (all channels) in place.
    #[inline]
    pub fn process_frame(&mut self, frame: &mut [f64]) {
        let peak = frame.iter().fold(0.0_f64, |m, s| m.max(s.abs()));
        let coef = if peak > self.detector {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.detector = coef * self.detector + (1.0 - coef) * peak;

        let change = self.gain_db(to_db(self.detector));
        if change == 0.0 {
            return;
        }
        let gain = from_db(change);
        frame.iter_mut().for_each(|s| *s *= gain);
    }

    pub fn reset(&mut self) {
        self.detector = 0.0;
    }

    /// Current gain reduction in dB, for metering.
    pub fn gain_reduction(&self) -> f64 {
        -self.gain_db(to_db(self.detector))
    }
}
