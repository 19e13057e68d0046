//! Application Services - 跨端口编排

mod reader_service;
mod tts_cache;

pub use reader_service::{PageContent, PrefetchOutcome, ReaderService, ReaderSettings};
pub use tts_cache::TtsCache;
