//! 16-bit PCM WAV encoding.

/// Convert a float sample to 16-bit PCM: clamp to [-1, 1], scale, round.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    (f64::from(sample).clamp(-1.0, 1.0) * 32767.0).round() as i16
}

pub fn quantize_all(samples: &[f32]) -> Vec<i16> {
    samples.iter().map(|&s| quantize(s)).collect()
}

const HEADER_LEN: u32 = 44;
const BYTES_PER_SAMPLE: u16 = 2;
const FORMAT_PCM: u16 = 1;

fn chunk_header(out: &mut Vec<u8>, id: &[u8; 4], len: u32) {
    out.extend_from_slice(id);
    out.extend_from_slice(&len.to_le_bytes());
}

/// Serialize interleaved 16-bit PCM as a WAV file image.
///
/// The layout is the canonical 44-byte header: a `RIFF`/`WAVE` preamble, a
/// 16-byte PCM `fmt ` chunk, then one `data` chunk of little-endian samples.
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Vec<u8> {
    let block_align = channels * BYTES_PER_SAMPLE;
    let data_len = (samples.len() * usize::from(BYTES_PER_SAMPLE)) as u32;

    let mut out = Vec::with_capacity((HEADER_LEN + data_len) as usize);
    chunk_header(&mut out, b"RIFF", HEADER_LEN - 8 + data_len);
    out.extend_from_slice(b"WAVE");

    chunk_header(&mut out, b"fmt ", 16);
    out.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&(BYTES_PER_SAMPLE * 8).to_le_bytes());

    chunk_header(&mut out, b"data", data_len);
    out.extend(samples.iter().flat_map(|s| s.to_le_bytes()));
    out
}
