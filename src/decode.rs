//! Source decoding.
//!
//! The primary decoder is picked from the declared MIME type (`hound` for
//! WAV, `minimp3` for MP3). The secondary path ignores the declaration and
//! lets `symphonia` sniff the container. A stream that decodes to zero
//! channels or zero frames counts as a failure on either path.

use std::io::Cursor;

use symphonia::core::audio::SampleBuffer as PacketBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

use crate::dsp::SampleBuffer;
use crate::error::DecodeError;

/// Container families with a dedicated primary decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Container {
    Wav,
    Mp3,
    Other(String),
}

impl Container {
    pub fn from_mime(mime: &str) -> Container {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "audio/wav" | "audio/wave" | "audio/x-wav" | "audio/vnd.wave" => Container::Wav,
            "audio/mpeg" | "audio/mp3" | "audio/mpeg3" | "audio/x-mp3" => Container::Mp3,
            _ => Container::Other(essence),
        }
    }
}

/// Decode with the primary decoder, then the secondary one.
pub fn decode(bytes: &[u8], mime: &str) -> Result<SampleBuffer, DecodeError> {
    match decode_primary(bytes, mime) {
        Ok(buf) => Ok(buf),
        Err(primary) => {
            tracing::debug!("primary decode of {mime} failed ({primary}), probing container");
            decode_secondary(bytes)
        }
    }
}

pub fn decode_primary(bytes: &[u8], mime: &str) -> Result<SampleBuffer, DecodeError> {
    let buf = match Container::from_mime(mime) {
        Container::Wav => decode_wav(bytes)?,
        Container::Mp3 => decode_mp3(bytes)?,
        Container::Other(name) => return Err(DecodeError::UnsupportedContainer(name)),
    };
    validated(buf)
}

pub fn decode_secondary(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    validated(decode_probed(bytes)?)
}

fn validated(buf: SampleBuffer) -> Result<SampleBuffer, DecodeError> {
    if buf.channels == 0 || buf.is_empty() || buf.sample_rate == 0 {
        return Err(DecodeError::Empty);
    }
    Ok(buf)
}

fn decode_wav(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))?;
    let spec = reader.spec();

    let data: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|x| x as f32 / max))
                .collect::<Result<Vec<_>, _>>()?
        }
    };

    Ok(SampleBuffer::new(data, spec.channels, spec.sample_rate))
}

fn decode_mp3(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(bytes));
    let mut pcm: Vec<i16> = Vec::new();
    let mut layout: Option<(usize, i32)> = None;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                let (channels, rate) = *layout.get_or_insert((frame.channels, frame.sample_rate));
                if frame.channels != channels || frame.sample_rate != rate {
                    // Mid-stream format switches are rare; keep the first layout.
                    continue;
                }
                pcm.extend_from_slice(&frame.data);
            }
            Err(minimp3::Error::Eof) => break,
            Err(minimp3::Error::SkippedData) => continue,
            Err(e) => return Err(e.into()),
        }
    }

    let (channels, rate) = layout.ok_or(DecodeError::Empty)?;
    Ok(SampleBuffer::from_i16(&pcm, channels as u16, rate.max(0) as u32))
}

fn decode_probed(bytes: &[u8]) -> Result<SampleBuffer, DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let probed = get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| DecodeError::Probe("no default track".to_string()))?;
    let track_id = track.id;
    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track.codec_params.channels.map_or(0, |c| c.count());

    let mut packet_buf: Option<PacketBuffer<f32>> = None;
    let mut data = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };
        let spec = *decoded.spec();
        if channels == 0 {
            channels = spec.channels.count();
        }
        if sample_rate == 0 {
            sample_rate = spec.rate;
        }
        let buf = packet_buf.get_or_insert_with(|| PacketBuffer::<f32>::new(decoded.capacity() as u64, spec));
        buf.copy_interleaved_ref(decoded);
        data.extend_from_slice(buf.samples());
    }

    if channels == 0 {
        return Err(DecodeError::Empty);
    }
    Ok(SampleBuffer::new(data, channels as u16, sample_rate))
}
