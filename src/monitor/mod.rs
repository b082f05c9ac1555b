//! Live monitoring — the audio-thread half of a session.
//!
//! [`MonitorEngine`] owns everything the audio callback touches: the voice,
//! the processing graph, and the sequencer. The control path talks to it
//! only through a bounded command queue, the [`LiveConfig`] seqlock and a
//! few atomics, so [`MonitorEngine::render_block`] never locks, never
//! allocates and never waits.

#[cfg(feature = "monitor")]
pub mod output;

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::{Receiver, Sender};

use crate::dsp::graph::MAX_CHANNELS;
use crate::dsp::{LiveConfig, ProcessingGraph, SampleBuffer, Voice};
use crate::sequencer::{Pattern, Sequencer, StepEvent, Tick, TransportStatus, TEMPO_MAX};

/// Messages from the control path to the audio thread.
#[derive(Debug)]
pub enum AudioCommand {
    /// Replace the playing source. The graph was built for it off the audio
    /// thread.
    LoadSource {
        source: Arc<SampleBuffer>,
        graph: ProcessingGraph,
    },
    Trigger { velocity: f32 },
    StartSequencer,
    StopSequencer,
    SetTempo(f64),
    SetSwing(u8),
}

/// Channel ends the engine needs from its session.
pub(crate) struct EngineLinks {
    pub commands: Receiver<AudioCommand>,
    pub step_events: Sender<StepEvent>,
    /// Sources replaced on the audio thread are handed back here so their
    /// memory is freed on the control path.
    pub retired: Sender<Arc<SampleBuffer>>,
    pub live: Arc<LiveConfig>,
    pub volume: Arc<AtomicU8>,
}

pub struct MonitorEngine {
    sample_rate: u32,
    max_block_frames: usize,
    links: EngineLinks,
    config_version: u64,
    graph: Option<ProcessingGraph>,
    voice: Voice,
    sequencer: Sequencer,
    scratch: Vec<f32>,
    ticks: Vec<Tick>,
}

impl MonitorEngine {
    pub(crate) fn new(
        sample_rate: u32,
        max_block_frames: usize,
        tempo: f64,
        pattern: Arc<Pattern>,
        links: EngineLinks,
    ) -> Self {
        let max_block_frames = max_block_frames.max(1);
        MonitorEngine {
            sample_rate,
            max_block_frames,
            // Forces the first block to pull the published config.
            config_version: u64::MAX,
            links,
            graph: None,
            voice: Voice::default(),
            sequencer: Sequencer::new(pattern, f64::from(sample_rate), tempo),
            scratch: vec![0.0; max_block_frames * MAX_CHANNELS],
            ticks: Vec::with_capacity(max_ticks_per_chunk(sample_rate, max_block_frames)),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn transport(&self) -> Arc<TransportStatus> {
        self.sequencer.status()
    }

    /// Fill an interleaved device buffer with `out_channels` channels.
    ///
    /// Mono sources are copied to every output channel; a stereo source
    /// feeds a mono device with the average of both channels.
    pub fn render_block(&mut self, out: &mut [f32], out_channels: usize) {
        if out_channels == 0 {
            return;
        }
        self.drain_commands();
        self.refresh_config();

        let volume = f32::from(self.links.volume.load(Ordering::Relaxed).min(100)) / 100.0;
        let chunk_len = self.max_block_frames * out_channels;
        for chunk in out.chunks_mut(chunk_len) {
            let frames = chunk.len() / out_channels;
            self.render_chunk(chunk, frames, out_channels, volume);
            chunk[frames * out_channels..].fill(0.0);
        }
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.links.commands.try_recv() {
            match cmd {
                AudioCommand::LoadSource { source, mut graph } => {
                    if let Some((_, config)) = self.links.live.try_load() {
                        graph.apply_config(&config);
                    }
                    self.graph = Some(graph);
                    if let Some(old) = self.voice.set_source(source) {
                        let _ = self.links.retired.try_send(old);
                    }
                }
                AudioCommand::Trigger { velocity } => self.voice.trigger(velocity),
                AudioCommand::StartSequencer => self.sequencer.start(),
                AudioCommand::StopSequencer => self.sequencer.stop(),
                AudioCommand::SetTempo(bpm) => self.sequencer.set_tempo(bpm),
                AudioCommand::SetSwing(swing) => self.sequencer.set_swing(swing),
            }
        }
    }

    /// Pick up a newly published parameter set. A write caught in flight is
    /// retried on the next block.
    fn refresh_config(&mut self) {
        if self.links.live.version() == self.config_version {
            return;
        }
        if let Some((version, config)) = self.links.live.try_load() {
            if let Some(graph) = self.graph.as_mut() {
                graph.apply_config(&config);
            }
            self.config_version = version;
        }
    }

    fn render_chunk(&mut self, out: &mut [f32], frames: usize, out_channels: usize, volume: f32) {
        let mut ticks = std::mem::take(&mut self.ticks);
        ticks.clear();
        self.sequencer.advance(frames, |tick| ticks.push(tick));

        let mut pos = 0;
        for tick in &ticks {
            self.render_segment(out, pos, tick.offset, out_channels, volume);
            pos = tick.offset;
            let _ = self.links.step_events.try_send(StepEvent::from(*tick));
            if tick.active {
                self.voice.trigger(tick.velocity);
            }
        }
        self.render_segment(out, pos, frames, out_channels, volume);
        self.ticks = ticks;
    }

    fn render_segment(
        &mut self,
        out: &mut [f32],
        start: usize,
        end: usize,
        out_channels: usize,
        volume: f32,
    ) {
        if end <= start {
            return;
        }
        let src_channels = self.voice.channels().min(MAX_CHANNELS);
        let scratch = &mut self.scratch[..(end - start) * src_channels];
        self.voice.render_into(scratch);
        if let Some(graph) = self.graph.as_mut() {
            graph.process_interleaved(scratch);
        }

        let dest = &mut out[start * out_channels..end * out_channels];
        for (o, s) in dest
            .chunks_exact_mut(out_channels)
            .zip(scratch.chunks_exact(src_channels))
        {
            if src_channels == 2 && out_channels == 1 {
                o[0] = (s[0] + s[1]) * 0.5 * volume;
                continue;
            }
            for (c, sample) in o.iter_mut().enumerate() {
                *sample = s[c.min(src_channels - 1)] * volume;
            }
        }
    }
}

/// Most ticks one chunk can hold: a chunk spans `max_block_frames` samples
/// and ticks are never closer than one step at [`TEMPO_MAX`].
fn max_ticks_per_chunk(sample_rate: u32, max_block_frames: usize) -> usize {
    let min_interval = f64::from(sample_rate.max(1)) * 60.0 / TEMPO_MAX / 4.0;
    (max_block_frames as f64 / min_interval).ceil() as usize + 1
}
