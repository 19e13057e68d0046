//! Media Adapter - 音频输出实现

mod simulated_sink;

pub use simulated_sink::{SimulatedMediaSink, DEFAULT_BYTES_PER_SECOND};
