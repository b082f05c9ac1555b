//! Offline render engine.
//!
//! Produces the processed export: the loaded source run through a fresh
//! [`ProcessingGraph`] built from a config snapshot, padded with a tail,
//! quantized and wrapped as a 16-bit WAV at [`EXPORT_SAMPLE_RATE`]. The graph
//! code is the same the monitor runs, so an export matches what was heard
//! minus the monitor volume.
//!
//! Every failure is recovered here. A render always yields a WAV:
//!
//! ```text
//! Decoding ─┬─▶ Decoded ──(graph ok)──────────────▶ Rendered (processed)
//!           │      └─(graph failed/bypassed)─▶ FallbackSynthesis ─▶ Rendered (synthesized)
//!           └─▶ DecodeFailed ─────────────────────────────────────▶ Rendered (silent)
//! ```

use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::Receiver;

use crate::config::{EngineConfig, EXPORT_SAMPLE_RATE, MAX_RENDER_SECS};
use crate::decode::decode;
use crate::dsp::{ProcessingGraph, SampleBuffer};
use crate::error::{DecodeError, KickError};
use crate::library;
use crate::params::ProcessingGraphConfig;
use crate::synth::synthesize_wav;
use crate::wav::{encode_wav, quantize_all};

/// Sources quieter than this are not sanity-checked: there is no energy to
/// compare.
const SANITY_RMS_FLOOR: f64 = 1e-4;
/// Relative RMS change below which the graph is assumed to have been
/// bypassed.
const SANITY_RMS_EPSILON: f64 = 1e-4;

/// Original source bytes with their declared MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceAudio {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

impl SourceAudio {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: impl Into<String>) -> Self {
        SourceAudio {
            bytes: bytes.into(),
            mime: mime.into(),
        }
    }
}

/// Everything one render needs, captured at request time.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub source: SourceAudio,
    pub config: ProcessingGraphConfig,
    /// Library preset synthesized if the graph cannot be used.
    pub fallback: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    /// The source went through the processing graph.
    Processed,
    /// No decoder accepted the source; the file is near-silent.
    Silent,
    /// The graph was unusable; the file is the fallback preset.
    Synthesized,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderResult {
    pub wav: Vec<u8>,
    pub outcome: RenderOutcome,
}

enum Stage {
    Decoding,
    Decoded(SampleBuffer),
    DecodeFailed(DecodeError),
    FallbackSynthesis(KickError),
    Rendered(RenderResult),
}

/// Run a render to completion on the calling thread.
pub fn render(request: &RenderRequest, engine: &EngineConfig) -> RenderResult {
    let engine = &engine.clone().sanitized();
    let mut stage = Stage::Decoding;
    loop {
        stage = match stage {
            Stage::Decoding => match decode(&request.source.bytes, &request.source.mime) {
                Ok(buf) => Stage::Decoded(buf),
                Err(e) => Stage::DecodeFailed(e),
            },
            Stage::Decoded(buf) => {
                tracing::debug!(
                    "decoded {} frames, {} ch @ {} Hz",
                    buf.frames(),
                    buf.channels,
                    buf.sample_rate
                );
                match process(buf, &request.config, engine.tail_pad_secs) {
                    Ok(wav) => Stage::Rendered(RenderResult {
                        wav,
                        outcome: RenderOutcome::Processed,
                    }),
                    Err(e) => Stage::FallbackSynthesis(e),
                }
            }
            Stage::DecodeFailed(e) => {
                tracing::warn!("source could not be decoded ({e}); exporting silence");
                Stage::Rendered(silent_render(engine.silent_render_secs))
            }
            Stage::FallbackSynthesis(cause) => {
                tracing::warn!(
                    "processing graph unusable ({cause}); synthesizing '{}'",
                    request.fallback
                );
                Stage::Rendered(synthesize_fallback(&request.fallback, engine))
            }
            Stage::Rendered(result) => {
                tracing::info!(
                    "render finished: {:?}, {} bytes",
                    result.outcome,
                    result.wav.len()
                );
                return result;
            }
        };
    }
}

fn process(
    decoded: SampleBuffer,
    config: &ProcessingGraphConfig,
    tail_pad_secs: f64,
) -> Result<Vec<u8>, KickError> {
    let source = decoded.clamp_channels().resample(EXPORT_SAMPLE_RATE);
    let rendered = render_buffer(&source, config, tail_pad_secs)?;
    check_effect(&source, &rendered, config)?;
    Ok(encode_wav(
        &quantize_all(&rendered.data),
        rendered.sample_rate,
        rendered.channels,
    ))
}

/// Run `source` through a fresh graph, followed by `tail_pad_secs` of
/// silence (at most [`MAX_RENDER_SECS`]) so filter and compressor tails are
/// kept.
pub fn render_buffer(
    source: &SampleBuffer,
    config: &ProcessingGraphConfig,
    tail_pad_secs: f64,
) -> Result<SampleBuffer, KickError> {
    let channels = source.channels as usize;
    let mut graph = ProcessingGraph::new(config, f64::from(source.sample_rate), channels)?;

    // NaN saturates to zero frames.
    let tail_secs = tail_pad_secs.clamp(0.0, MAX_RENDER_SECS);
    let tail_frames = (tail_secs * f64::from(source.sample_rate)).round() as usize;
    let total = (source.frames() + tail_frames) * channels;
    let mut data = Vec::with_capacity(total);
    data.extend_from_slice(&source.data);
    data.resize(total, 0.0);

    graph.process_interleaved(&mut data);
    Ok(SampleBuffer::new(data, source.channels, source.sample_rate))
}

/// Reject a render whose energy matches its input while the config says
/// the graph should have changed it.
fn check_effect(
    source: &SampleBuffer,
    rendered: &SampleBuffer,
    config: &ProcessingGraphConfig,
) -> Result<(), KickError> {
    if config.is_identity() {
        return Ok(());
    }
    let in_rms = source.rms();
    if in_rms < SANITY_RMS_FLOOR {
        return Ok(());
    }
    let out_rms = crate::dsp::buffer::rms(&rendered.data[..source.data.len()]);
    if ((out_rms - in_rms) / in_rms).abs() < SANITY_RMS_EPSILON {
        return Err(KickError::GraphConstruction(format!(
            "output energy {out_rms:.6} matches input {in_rms:.6}; graph was bypassed"
        )));
    }
    Ok(())
}

fn silent_render(secs: f64) -> RenderResult {
    let frames = (secs * f64::from(EXPORT_SAMPLE_RATE)).round() as usize;
    RenderResult {
        wav: encode_wav(&vec![0; frames], EXPORT_SAMPLE_RATE, 1),
        outcome: RenderOutcome::Silent,
    }
}

fn synthesize_fallback(preset_id: &str, engine: &EngineConfig) -> RenderResult {
    let preset = library::preset_for(preset_id).or_else(|e| {
        tracing::warn!("{e}; using '{}'", engine.fallback_preset);
        library::preset_for(&engine.fallback_preset)
    });
    match preset {
        Ok(preset) => RenderResult {
            wav: synthesize_wav(&preset, EXPORT_SAMPLE_RATE),
            outcome: RenderOutcome::Synthesized,
        },
        Err(e) => {
            tracing::warn!("{e}; exporting silence");
            silent_render(engine.silent_render_secs)
        }
    }
}

/// Dry export: the source bytes, untouched.
pub fn export_dry(source: &SourceAudio) -> Vec<u8> {
    source.bytes.to_vec()
}

// ── Background rendering ────────────────────────────────────

/// Handle to a render running on its own thread.
pub struct RenderJob {
    result: Receiver<RenderResult>,
    worker: Option<JoinHandle<()>>,
}

impl RenderJob {
    /// Block until the render finishes.
    pub fn wait(mut self) -> Result<RenderResult, KickError> {
        let result = self.result.recv().map_err(|_| KickError::RenderAborted);
        if let Some(worker) = self.worker.take() {
            if let Err(panic) = worker.join() {
                tracing::warn!("render worker panicked: {}", panic_message(panic.as_ref()));
            }
        }
        result
    }

    /// The result, if the render has finished.
    pub fn try_result(&self) -> Option<RenderResult> {
        self.result.try_recv().ok()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// Start a render on a worker thread. The request is owned by the worker;
/// nothing is shared with the live graph.
pub fn spawn_render(request: RenderRequest, engine: EngineConfig) -> Result<RenderJob, KickError> {
    let (tx, rx) = crossbeam_channel::bounded(1);
    let worker = std::thread::Builder::new()
        .name("kick-render".to_string())
        .spawn(move || {
            if tx.send(render(&request, &engine)).is_err() {
                tracing::debug!("render job dropped before its result was read");
            }
        })?;
    Ok(RenderJob {
        result: rx,
        worker: Some(worker),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{map, ParameterSet};
    use std::f64::consts::PI;

    fn kick_wav(sample_rate: u32, channels: u16, secs: f64) -> Vec<u8> {
        let frames = (f64::from(sample_rate) * secs) as usize;
        let mut pcm = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let t = i as f64 / f64::from(sample_rate);
            let s = (2.0 * PI * 55.0 * t).sin() * (1.0 - t / secs).powi(2) * 0.8;
            for _ in 0..channels {
                pcm.push((s * 32767.0) as i16);
            }
        }
        encode_wav(&pcm, sample_rate, channels)
    }

    fn request(bytes: Vec<u8>, mime: &str, params: &ParameterSet) -> RenderRequest {
        RenderRequest {
            source: SourceAudio::new(bytes, mime),
            config: map(params),
            fallback: "ice-crystal".to_string(),
        }
    }

    fn wav_info(wav: &[u8]) -> (u16, u32, usize) {
        let reader = hound::WavReader::new(std::io::Cursor::new(wav)).unwrap();
        let spec = reader.spec();
        (spec.channels, spec.sample_rate, reader.duration() as usize)
    }

    #[test]
    fn processed_export_is_source_plus_tail_at_44k() {
        let req = request(kick_wav(44100, 1, 0.25), "audio/wav", &ParameterSet::default());
        let result = render(&req, &EngineConfig::default());
        assert_eq!(result.outcome, RenderOutcome::Processed);
        let (channels, rate, frames) = wav_info(&result.wav);
        assert_eq!(channels, 1);
        assert_eq!(rate, 44100);
        assert_eq!(frames, 11025 + 22050);
    }

    #[test]
    fn unbounded_tail_is_capped() {
        let source = decode(&kick_wav(44100, 1, 0.1), "audio/wav").unwrap();
        let config = map(&ParameterSet::default());
        let rendered = render_buffer(&source, &config, f64::INFINITY).unwrap();
        assert_eq!(rendered.frames(), source.frames() + 441_000);
        let rendered = render_buffer(&source, &config, f64::NAN).unwrap();
        assert_eq!(rendered.frames(), source.frames());

        let engine = EngineConfig {
            tail_pad_secs: f64::INFINITY,
            ..EngineConfig::default()
        };
        let req = request(kick_wav(44100, 1, 0.25), "audio/wav", &ParameterSet::default());
        let (_, _, frames) = wav_info(&render(&req, &engine).wav);
        assert_eq!(frames, 11025 + 22050);
    }

    #[test]
    fn lower_rate_sources_are_resampled() {
        let req = request(kick_wav(22050, 2, 0.2), "audio/wav", &ParameterSet::default());
        let result = render(&req, &EngineConfig::default());
        let (channels, rate, frames) = wav_info(&result.wav);
        assert_eq!(channels, 2);
        assert_eq!(rate, 44100);
        assert_eq!(frames, 8820 + 22050);
    }

    #[test]
    fn extra_channels_are_dropped() {
        let quad: Vec<f32> = (0..4410)
            .flat_map(|i| {
                let s = ((i as f32) * 0.01).sin() * 0.5;
                [s, -s, 0.1, 0.2]
            })
            .collect();
        let source = SampleBuffer::new(quad, 4, 44100);
        let wav = process(source, &map(&ParameterSet::default()), 0.1).unwrap();
        let (channels, _, frames) = wav_info(&wav);
        assert_eq!(channels, 2);
        assert_eq!(frames, 4410 + 4410);
    }

    #[test]
    fn renders_are_byte_identical() {
        let params = ParameterSet {
            brightness: 70,
            warmth: 30,
            punch: 80,
            ..ParameterSet::default()
        };
        let req = request(kick_wav(44100, 1, 0.3), "audio/wav", &params);
        let a = render(&req, &EngineConfig::default());
        let b = render(&req, &EngineConfig::default());
        assert_eq!(a, b);
    }

    #[test]
    fn undecodable_source_exports_silence() {
        let req = request(vec![7u8; 128], "audio/wav", &ParameterSet::default());
        let engine = EngineConfig::default();
        let result = render(&req, &engine);
        assert_eq!(result.outcome, RenderOutcome::Silent);
        let (_, rate, frames) = wav_info(&result.wav);
        assert_eq!(rate, 44100);
        assert_eq!(frames, 22050);
        assert!(result.wav[44..].iter().all(|&b| b == 0));
    }

    #[test]
    fn bypassed_graph_falls_back_to_synthesis() {
        // Every stage near-transparent but the config is not the identity.
        let config = ProcessingGraphConfig {
            filter_frequency: 19_999.0,
            filter_q: 0.5,
            drive: 0.0,
            compressor_ratio: 1.0,
            makeup_gain: 1.0,
            ..map(&ParameterSet::default())
        };
        let req = RenderRequest {
            source: SourceAudio::new(kick_wav(44100, 1, 0.25), "audio/wav"),
            config,
            fallback: "deep-cave".to_string(),
        };
        let result = render(&req, &EngineConfig::default());
        assert_eq!(result.outcome, RenderOutcome::Synthesized);
        let expected = synthesize_wav(&library::preset_for("deep-cave").unwrap(), 44100);
        assert_eq!(result.wav, expected);
    }

    #[test]
    fn unknown_fallback_uses_engine_default() {
        let result = synthesize_fallback("no-such-kick", &EngineConfig::default());
        assert_eq!(result.outcome, RenderOutcome::Synthesized);
        let expected = synthesize_wav(&library::preset_for("ice-crystal").unwrap(), 44100);
        assert_eq!(result.wav, expected);
    }

    #[test]
    fn effect_changes_energy() {
        let source = crate::decode::decode(&kick_wav(44100, 1, 0.25), "audio/wav").unwrap();
        for params in [
            ParameterSet { punch: 100, ..ParameterSet::default() },
            ParameterSet { brightness: 0, ..ParameterSet::default() },
        ] {
            let config = map(&params);
            let out = render_buffer(&source, &config, 0.0).unwrap();
            assert_eq!(out.frames(), source.frames());
            assert!(check_effect(&source, &out, &config).is_ok());
            assert!((out.rms() - source.rms()).abs() > 1e-3);
        }
    }

    #[test]
    fn identical_energy_is_rejected() {
        let source = SampleBuffer::new(vec![0.5, -0.5, 0.25, -0.25], 1, 44100);
        let config = map(&ParameterSet::default());
        assert!(matches!(
            check_effect(&source, &source, &config),
            Err(KickError::GraphConstruction(_))
        ));
    }

    #[test]
    fn dry_export_returns_source_bytes() {
        for bytes in [vec![], vec![1u8, 2, 3], kick_wav(8000, 1, 0.01)] {
            let source = SourceAudio::new(bytes.clone(), "audio/wav");
            assert_eq!(export_dry(&source), bytes);
        }
    }

    #[test]
    fn panicking_worker_reports_aborted() {
        let (tx, rx) = crossbeam_channel::bounded::<RenderResult>(1);
        let worker = std::thread::spawn(move || {
            let _tx = tx;
            panic!("decoder blew up");
        });
        let job = RenderJob {
            result: rx,
            worker: Some(worker),
        };
        assert!(matches!(job.wait(), Err(KickError::RenderAborted)));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let text: Box<dyn std::any::Any + Send> = Box::new("static text");
        assert_eq!(panic_message(text.as_ref()), "static text");
        let owned: Box<dyn std::any::Any + Send> = Box::new(String::from("owned text"));
        assert_eq!(panic_message(owned.as_ref()), "owned text");
        let other: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
    }

    #[test]
    fn spawned_render_matches_inline_render() {
        let req = request(kick_wav(44100, 1, 0.2), "audio/wav", &ParameterSet::default());
        let inline = render(&req, &EngineConfig::default());
        let job = spawn_render(req, EngineConfig::default()).unwrap();
        assert_eq!(job.wait().unwrap(), inline);
    }
}
