//! Audio device output for the monitor engine.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::error::KickError;

use super::MonitorEngine;

/// The default output device and the stream format it will be driven with.
pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::StreamConfig,
}

impl OutputDevice {
    /// Open the host's default output device. Only f32 streams are supported.
    pub fn open_default() -> Result<Self, KickError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| KickError::Audio("no default output device".to_string()))?;
        let supported = device
            .default_output_config()
            .map_err(|e| KickError::Audio(e.to_string()))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(KickError::Audio(format!(
                "unsupported sample format {:?} (only f32 supported)",
                supported.sample_format()
            )));
        }
        Ok(OutputDevice {
            device,
            config: supported.into(),
        })
    }

    /// Rate the engine must be created with.
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }
}

/// Start playing `engine` on `output`. Audio runs until the returned stream
/// is dropped.
pub fn start_output(output: OutputDevice, mut engine: MonitorEngine) -> Result<cpal::Stream, KickError> {
    if engine.sample_rate() != output.sample_rate() {
        return Err(KickError::Audio(format!(
            "engine runs at {} Hz but the device wants {} Hz",
            engine.sample_rate(),
            output.sample_rate()
        )));
    }
    let channels = output.channels();
    let err_fn = |err| tracing::warn!("audio output stream error: {err}");

    let stream = output
        .device
        .build_output_stream(
            &output.config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                engine.render_block(data, channels);
            },
            err_fn,
            None,
        )
        .map_err(|e| KickError::Audio(e.to_string()))?;
    stream.play().map_err(|e| KickError::Audio(e.to_string()))?;

    tracing::info!("monitor output started: {} Hz, {channels} channels", output.sample_rate());
    Ok(stream)
}
