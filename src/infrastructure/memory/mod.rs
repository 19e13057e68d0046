//! In-Memory Adapters - 内存实现

mod tts_cache;

pub use tts_cache::InMemoryTtsCache;
