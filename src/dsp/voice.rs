//! Voice — one playable instance of the loaded source.

use std::sync::Arc;

use super::buffer::SampleBuffer;

/// Plays a shared source buffer from the top at a fixed gain.
///
/// There is only ever one voice per loaded sample: triggering while it is
/// still sounding cuts it off and restarts from frame 0.
#[derive(Debug, Clone, Default)]
pub struct Voice {
    source: Option<Arc<SampleBuffer>>,
    position: usize,
    gain: f32,
    active: bool,
}

impl Voice {
    pub fn new(source: Arc<SampleBuffer>) -> Self {
        Voice {
            source: Some(source),
            position: 0,
            gain: 0.0,
            active: false,
        }
    }

    /// Swap in a new source; any sounding playback stops.
    pub fn set_source(&mut self, source: Arc<SampleBuffer>) -> Option<Arc<SampleBuffer>> {
        self.active = false;
        self.position = 0;
        self.source.replace(source)
    }

    pub fn source(&self) -> Option<&Arc<SampleBuffer>> {
        self.source.as_ref()
    }

    pub fn channels(&self) -> usize {
        self.source.as_ref().map_or(1, |s| s.channels as usize)
    }

    /// Hard-stop and restart at `velocity` (clamped 0–1).
    pub fn trigger(&mut self, velocity: f32) {
        if self.source.is_none() {
            return;
        }
        self.position = 0;
        self.gain = velocity.clamp(0.0, 1.0);
        self.active = true;
    }

    pub fn stop(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Write up to `out.len() / channels` frames into `out`, overwriting it.
    /// Frames past the end of the source are zeroed.
    pub fn render_into(&mut self, out: &mut [f32]) {
        let Some(source) = self.source.as_ref().filter(|_| self.active) else {
            out.fill(0.0);
            return;
        };

        let ch = source.channels as usize;
        let total = source.frames();
        for frame in out.chunks_exact_mut(ch) {
            if self.position >= total {
                self.active = false;
                frame.fill(0.0);
                continue;
            }
            let src = source.frame(self.position);
            for (o, &s) in frame.iter_mut().zip(src) {
                *o = s * self.gain;
            }
            self.position += 1;
        }
    }
}
