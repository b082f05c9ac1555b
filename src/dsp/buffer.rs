//! Decoded audio held in memory.

/// Interleaved f32 PCM with its channel count and sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Interleaved samples, `frames() * channels` long.
    pub data: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(data: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        SampleBuffer {
            data,
            channels: channels.max(1),
            sample_rate,
        }
    }

    /// Silence of the given length.
    pub fn silent(frames: usize, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        SampleBuffer {
            data: vec![0.0; frames * channels as usize],
            channels,
            sample_rate,
        }
    }

    /// Create from interleaved 16-bit signed PCM.
    pub fn from_i16(pcm: &[i16], channels: u16, sample_rate: u32) -> Self {
        let data = pcm.iter().map(|&s| f32::from(s) / 32768.0).collect();
        SampleBuffer::new(data, channels, sample_rate)
    }

    pub fn frames(&self) -> usize {
        self.data.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// One interleaved frame.
    pub fn frame(&self, index: usize) -> &[f32] {
        let ch = self.channels as usize;
        &self.data[index * ch..(index + 1) * ch]
    }

    /// Root-mean-square level across all channels.
    pub fn rms(&self) -> f64 {
        rms(&self.data)
    }

    /// Keep at most two channels; anything beyond the first pair is dropped.
    pub fn clamp_channels(self) -> SampleBuffer {
        if self.channels <= 2 {
            return self;
        }
        let src_ch = self.channels as usize;
        let mut data = Vec::with_capacity(self.frames() * 2);
        for frame in self.data.chunks_exact(src_ch) {
            data.push(frame[0]);
            data.push(frame[1]);
        }
        SampleBuffer::new(data, 2, self.sample_rate)
    }

    /// Convert to another sample rate with linear interpolation.
    pub fn resample(&self, target_rate: u32) -> SampleBuffer {
        if self.sample_rate == target_rate || self.is_empty() || self.sample_rate == 0 {
            return SampleBuffer::new(self.data.clone(), self.channels, target_rate);
        }

        let ch = self.channels as usize;
        let src_frames = self.frames();
        let ratio = f64::from(target_rate) / f64::from(self.sample_rate);
        let out_frames = (src_frames as f64 * ratio).round() as usize;
        let mut out = Vec::with_capacity(out_frames * ch);

        for i in 0..out_frames {
            let src_pos = i as f64 / ratio;
            let idx = src_pos.floor() as usize;
            let frac = (src_pos - idx as f64) as f32;
            let a = idx.min(src_frames - 1);
            let b = (idx + 1).min(src_frames - 1);
            for c in 0..ch {
                let s0 = self.data[a * ch + c];
                let s1 = self.data[b * ch + c];
                out.push(s0 * (1.0 - frac) + s1 * frac);
            }
        }

        SampleBuffer::new(out, self.channels, target_rate)
    }
}

/// Root-mean-square of a sample slice; 0 for an empty slice.
pub fn rms(samples: &[f32]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    (sum / samples.len() as f64).sqrt()
}
