//! Session — the control-path half of the engine.
//!
//! A [`Session`] owns the loaded source, the current parameters and the
//! sending ends of every queue into the audio thread. Creating one also
//! creates its [`MonitorEngine`], which the caller hands to whatever drives
//! audio (a device stream, a test loop, a worklet).

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::config::{EngineConfig, EXPORT_SAMPLE_RATE};
use crate::decode::decode;
use crate::dsp::{LiveConfig, ProcessingGraph, SampleBuffer};
use crate::error::KickError;
use crate::library;
use crate::monitor::{AudioCommand, EngineLinks, MonitorEngine};
use crate::params::{map, ParameterSet};
use crate::render::{export_dry, spawn_render, RenderJob, RenderRequest, SourceAudio};
use crate::sequencer::{Pattern, SequencerState, StepEvent, TransportStatus};
use crate::synth::synthesize_wav;

const RETIRED_CAPACITY: usize = 8;

struct LoadedSource {
    audio: SourceAudio,
    /// Preset synthesized if a processed export cannot use the graph.
    fallback: String,
}

pub struct Session {
    config: EngineConfig,
    monitor_rate: u32,
    params: ParameterSet,
    source: Option<LoadedSource>,
    commands: Sender<AudioCommand>,
    step_events: Receiver<StepEvent>,
    retired: Receiver<Arc<SampleBuffer>>,
    live: Arc<LiveConfig>,
    volume: Arc<AtomicU8>,
    pattern: Arc<Pattern>,
    transport: Arc<TransportStatus>,
}

impl Session {
    pub fn new(config: EngineConfig, monitor_sample_rate: u32) -> (Session, MonitorEngine) {
        let config = config.sanitized();
        let (commands, command_rx) = bounded(config.queue_capacity);
        let (event_tx, step_events) = bounded(config.queue_capacity);
        let (retired_tx, retired) = bounded(RETIRED_CAPACITY);

        let params = ParameterSet::default();
        let live = Arc::new(LiveConfig::new(&map(&params)));
        let volume = Arc::new(AtomicU8::new(config.default_monitor_volume.min(100)));
        let pattern = Arc::new(Pattern::default());

        let engine = MonitorEngine::new(
            monitor_sample_rate,
            config.max_block_frames,
            config.default_tempo,
            Arc::clone(&pattern),
            EngineLinks {
                commands: command_rx,
                step_events: event_tx,
                retired: retired_tx,
                live: Arc::clone(&live),
                volume: Arc::clone(&volume),
            },
        );
        let transport = engine.transport();

        let session = Session {
            config,
            monitor_rate: monitor_sample_rate,
            params,
            source: None,
            commands,
            step_events,
            retired,
            live,
            volume,
            pattern,
            transport,
        };
        (session, engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decode a source and make it the playing sample.
    ///
    /// Unlike exports, a live load reports decode failures: the previous
    /// source stays loaded.
    pub fn load_source(&mut self, bytes: impl Into<Arc<[u8]>>, mime: &str) -> Result<(), KickError> {
        let audio = SourceAudio::new(bytes, mime);
        let decoded = decode(&audio.bytes, mime)?;
        let monitored = decoded.clamp_channels().resample(self.monitor_rate);
        let graph = ProcessingGraph::new(
            &self.live.load(),
            f64::from(self.monitor_rate),
            monitored.channels as usize,
        )?;

        tracing::info!(
            "loaded {mime} source: {:.3} s, {} ch",
            monitored.duration_secs(),
            monitored.channels
        );
        self.send(AudioCommand::LoadSource {
            source: Arc::new(monitored),
            graph,
        });
        self.source = Some(LoadedSource {
            audio,
            fallback: self.config.fallback_preset.clone(),
        });
        self.collect_retired();
        Ok(())
    }

    /// Synthesize a library kick and load it as the source.
    pub fn load_preset(&mut self, id: &str) -> Result<(), KickError> {
        let preset = library::preset_for(id)?;
        self.load_source(synthesize_wav(&preset, EXPORT_SAMPLE_RATE), "audio/wav")?;
        if let Some(source) = self.source.as_mut() {
            source.fallback = id.to_string();
        }
        Ok(())
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn parameters(&self) -> ParameterSet {
        self.params
    }

    /// Map and publish new parameters; the audio thread picks them up on
    /// its next block.
    pub fn set_parameters(&mut self, params: ParameterSet) {
        self.params = params.clamped();
        self.live.store(&map(&self.params));
    }

    /// Monitor level (0–100). Never affects exports.
    pub fn set_monitor_volume(&self, volume: u8) {
        self.volume.store(volume.min(100), Ordering::Relaxed);
    }

    pub fn monitor_volume(&self) -> u8 {
        self.volume.load(Ordering::Relaxed)
    }

    /// Play the loaded source once at full velocity.
    pub fn trigger(&self) -> Result<(), KickError> {
        if self.source.is_none() {
            return Err(KickError::NoSource);
        }
        self.send(AudioCommand::Trigger { velocity: 1.0 });
        Ok(())
    }

    pub fn start_sequencer(&self) {
        self.send(AudioCommand::StartSequencer);
    }

    pub fn stop_sequencer(&self) {
        self.send(AudioCommand::StopSequencer);
    }

    pub fn set_tempo(&self, bpm: f64) {
        self.send(AudioCommand::SetTempo(bpm));
    }

    pub fn set_swing(&self, swing: u8) {
        self.send(AudioCommand::SetSwing(swing));
    }

    /// The live pattern; edits apply from the next tick.
    pub fn pattern(&self) -> &Arc<Pattern> {
        &self.pattern
    }

    /// Step reports emitted since the last call.
    pub fn drain_step_events(&self) -> Vec<StepEvent> {
        self.step_events.try_iter().collect()
    }

    pub fn sequencer_state(&self) -> SequencerState {
        self.transport.snapshot()
    }

    /// The loaded source's bytes, exactly as given.
    pub fn export_dry(&self) -> Result<Vec<u8>, KickError> {
        let source = self.source.as_ref().ok_or(KickError::NoSource)?;
        Ok(export_dry(&source.audio))
    }

    /// Start a processed export using the parameters in effect right now.
    pub fn export_processed(&self) -> Result<RenderJob, KickError> {
        let source = self.source.as_ref().ok_or(KickError::NoSource)?;
        let request = RenderRequest {
            source: source.audio.clone(),
            config: self.live.load(),
            fallback: source.fallback.clone(),
        };
        tracing::debug!("export requested with {:?}", request.config);
        spawn_render(request, self.config.clone())
    }

    fn send(&self, cmd: AudioCommand) {
        match self.commands.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(cmd)) => {
                tracing::warn!("monitor command queue full, dropping {cmd:?}");
            }
            Err(TrySendError::Disconnected(_)) => {
                tracing::debug!("monitor engine is gone; command ignored");
            }
        }
    }

    /// Free sources the audio thread has let go of.
    fn collect_retired(&self) {
        self.retired.try_iter().for_each(drop);
    }
}
