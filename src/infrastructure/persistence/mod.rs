//! Persistence Layer - 数据持久化
//!
//! SQLite（文档库）和 Sled（TTS 音频缓存）存储实现

pub mod sled;
pub mod sqlite;

pub use self::sled::{SledCacheConfig, SledTtsCache};
pub use self::sqlite::SqliteDocumentLibrary;
