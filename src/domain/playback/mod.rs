//! Playback Context - 流式分片播放
//!
//! 职责:
//! - 将异步到达的音频片段拼接为连续、可暂停、可跳转的时间线
//! - 片段播放失败时跳过，保证队列持续前进

mod chunk;
mod engine;
mod sink;

pub use chunk::{AudioChunk, ChunkSource};
pub use engine::{PlaybackEngine, PlaybackState, Progress, Refill};
pub use sink::{MediaError, MediaEvent, MediaSink};
