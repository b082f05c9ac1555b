//! DSP — the kick processing chain and its building blocks.
//!
//! The same graph code runs in the live monitor callback and in the offline
//! renderer, which is what lets an export match what was heard.

pub mod buffer;
pub mod compressor;
pub mod distortion;
pub mod filter;
pub mod graph;
pub mod voice;

pub use buffer::SampleBuffer;
pub use graph::{LiveConfig, ProcessingGraph};
pub use voice::Voice;
