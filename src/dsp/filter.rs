//! Lowpass biquad — matches WebAudio BiquadFilterNode coefficients.

use std::f64::consts::PI;

/// Normalized biquad coefficients (`a0` divided out).
#[derive(Debug, Clone, Copy, PartialEq)]
struct Coefficients {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Coefficients {
    /// Audio EQ Cookbook lowpass (Robert Bristow-Johnson).
    fn lowpass(frequency: f64, q: f64, sample_rate: f64) -> Self {
        // Cutoffs at or above Nyquist would fold the response.
        let frequency = frequency.clamp(10.0, sample_rate * 0.49);
        let w0 = 2.0 * PI * frequency / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q.max(1e-4));
        let a0 = 1.0 + alpha;

        let b1 = (1.0 - cos_w0) / a0;
        Coefficients {
            b0: b1 * 0.5,
            b1,
            b2: b1 * 0.5,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// A 2nd-order lowpass IIR filter, Direct Form II Transposed.
///
/// Frequency and Q are changed in place and picked up on the next processed
/// sample; the delay line is kept across changes.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    sample_rate: f64,
    frequency: f64,
    q: f64,
    coefs: Coefficients,
    stale: bool,
    z: [f64; 2],
}

impl BiquadFilter {
    pub fn new(frequency: f64, q: f64, sample_rate: f64) -> Self {
        BiquadFilter {
            sample_rate,
            frequency,
            q,
            coefs: Coefficients::lowpass(frequency, q, sample_rate),
            stale: false,
            z: [0.0; 2],
        }
    }

    pub fn update_coefficients(&mut self) {
        self.coefs = Coefficients::lowpass(self.frequency, self.q, self.sample_rate);
        self.stale = false;
    }

    #[inline]
    pub fn process(&mut self, input: f64) -> f64 {
        if self.stale {
            self.update_coefficients();
        }
        let c = &self.coefs;
        let [z1, z2] = self.z;
        let y = c.b0 * input + z1;
        self.z = [c.b1 * input - c.a1 * y + z2, c.b2 * input - c.a2 * y];
        y
    }

    pub fn reset(&mut self) {
        self.z = [0.0; 2];
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn q(&self) -> f64 {
        self.q
    }

    pub fn set_frequency(&mut self, frequency: f64) {
        if frequency != self.frequency {
            self.frequency = frequency;
            self.stale = true;
        }
    }

    pub fn set_q(&mut self, q: f64) {
        if q != self.q {
            self.q = q;
            self.stale = true;
        }
    }
}
