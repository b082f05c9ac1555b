pub mod config;
pub mod decode;
pub mod dsp;
pub mod error;
pub mod library;
pub mod monitor;
pub mod params;
pub mod render;
pub mod sequencer;
pub mod session;
pub mod synth;
pub mod wav;

pub use crate::config::EngineConfig;
pub use crate::error::{DecodeError, KickError};
pub use crate::params::{map, ParameterSet, ProcessingGraphConfig};
pub use crate::session::Session;

use wasm_bindgen::prelude::*;

use crate::config::EXPORT_SAMPLE_RATE;
use crate::render::{RenderRequest, SourceAudio};

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// WASM-exposed: return the kickgen-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

/// WASM-exposed: map a `{brightness, warmth, ...}` object to graph
/// coefficients.
#[wasm_bindgen]
pub fn map_parameters(params: JsValue) -> Result<JsValue, JsValue> {
    let params: ParameterSet = serde_wasm_bindgen::from_value(params).map_err(js_error)?;
    serde_wasm_bindgen::to_value(&map(&params)).map_err(js_error)
}

/// WASM-exposed: render source bytes through the processing graph to a
/// 44.1 kHz WAV. Never fails on bad audio; see [`render::RenderOutcome`].
#[wasm_bindgen]
pub fn render_processed_wav(source: &[u8], mime: &str, params: JsValue) -> Result<Vec<u8>, JsValue> {
    let params: ParameterSet = serde_wasm_bindgen::from_value(params).map_err(js_error)?;
    let engine = EngineConfig::default();
    let request = RenderRequest {
        source: SourceAudio::new(source, mime),
        config: map(&params),
        fallback: engine.fallback_preset.clone(),
    };
    Ok(render::render(&request, &engine).wav)
}

/// WASM-exposed: synthesize a library preset to a mono WAV.
#[wasm_bindgen]
pub fn synthesize_preset_wav(id: &str) -> Result<Vec<u8>, JsValue> {
    let preset = library::preset_for(id).map_err(js_error)?;
    Ok(synth::synthesize_wav(&preset, EXPORT_SAMPLE_RATE))
}

/// WASM-exposed: the built-in kick library as a JSON array.
#[wasm_bindgen]
pub fn library_json() -> Result<String, JsValue> {
    serde_json::to_string(&library::LIBRARY[..]).map_err(js_error)
}
