use thiserror::Error;

/// Top-level error for every fallible KickGen operation.
#[derive(Debug, Error)]
pub enum KickError {
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
    #[error("processing graph could not be built: {0}")]
    GraphConstruction(String),
    #[error("no source sample loaded")]
    NoSource,
    #[error("render worker disconnected before producing a result")]
    RenderAborted,
    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("audio device error: {0}")]
    Audio(String),
}

/// Why a source byte stream could not be turned into PCM.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("WAV decode failed: {0}")]
    Wav(#[from] hound::Error),
    #[error("MP3 decode failed: {0}")]
    Mp3(String),
    #[error("container probe failed: {0}")]
    Probe(String),
    #[error("unsupported container '{0}'")]
    UnsupportedContainer(String),
    #[error("decoded stream has no channels or no frames")]
    Empty,
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        DecodeError::Probe(e.to_string())
    }
}

impl From<minimp3::Error> for DecodeError {
    fn from(e: minimp3::Error) -> Self {
        DecodeError::Mp3(format!("{e:?}"))
    }
}
