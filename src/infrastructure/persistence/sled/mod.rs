//! Sled Persistence - TTS 音频缓存

mod tts_cache;

pub use tts_cache::{SledCacheConfig, SledTtsCache};
