//! TTS Cache Port - 合成音频缓存
//!
//! 定义 TTS 音频缓存的抽象接口，具体实现使用 Sled
//!
//! 缓存条目以 (文档指纹, 页码, 音色) 为键，写入时记录时间戳，
//! 超过 TTL 的条目视为不存在并在读取时惰性删除

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::document::{DocumentFingerprint, PageNumber};

/// TTS Cache 错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// 缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: DocumentFingerprint,
    pub page: PageNumber,
    pub voice_id: String,
}

impl CacheKey {
    pub fn new(fingerprint: DocumentFingerprint, page: PageNumber, voice_id: impl Into<String>) -> Self {
        Self {
            fingerprint,
            page,
            voice_id: voice_id.into(),
        }
    }

    /// 主存储键: `{fingerprint}_{page}_{voice}`
    pub fn storage_key(&self) -> String {
        format!("{}_{}_{}", self.fingerprint, self.page, self.voice_id)
    }

    /// 文档索引键: `{fingerprint}\0{page:010}\0{voice}`
    ///
    /// 以指纹开头，按文档前缀扫描即可定位该文档的所有条目
    pub fn index_key(&self) -> String {
        format!("{}\0{:010}\0{}", self.fingerprint, self.page.value(), self.voice_id)
    }

    /// 某文档所有索引键的公共前缀
    pub fn document_prefix(fingerprint: &DocumentFingerprint) -> String {
        format!("{}\0", fingerprint)
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// 缓存统计信息（仅统计未过期条目）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// TTS Cache Port
///
/// 同一个键的并发写入以最后一次为准
#[async_trait]
pub trait TtsCachePort: Send + Sync {
    /// 获取音频；过期条目被删除并返回 None
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError>;

    /// 写入音频，覆盖旧条目并重置时间戳
    async fn put(&self, key: &CacheKey, audio_data: Vec<u8>) -> Result<(), CacheError>;

    /// 是否存在未过期条目
    async fn has(&self, key: &CacheKey) -> Result<bool, CacheError>;

    /// 删除单个条目
    async fn evict(&self, key: &CacheKey) -> Result<(), CacheError>;

    /// 删除某文档的所有条目，返回删除数量
    async fn evict_document(&self, fingerprint: &DocumentFingerprint) -> Result<usize, CacheError>;

    /// 清空缓存
    async fn clear(&self) -> Result<(), CacheError>;

    /// 获取缓存统计信息
    async fn stats(&self) -> Result<CacheStats, CacheError>;

    /// 删除所有过期条目，返回删除数量
    async fn sweep_expired(&self) -> Result<usize, CacheError>;

    /// 持久化到磁盘
    async fn flush(&self) -> Result<(), CacheError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(page: u32, voice: &str) -> CacheKey {
        CacheKey::new(
            DocumentFingerprint::from_string("book.pdf_10_0123456789abcdef"),
            PageNumber::new(page).unwrap(),
            voice,
        )
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(key(3, "rachel").storage_key(), "book.pdf_10_0123456789abcdef_3_rachel");
    }

    #[test]
    fn test_index_key_sorted_by_page_under_document_prefix() {
        let prefix = CacheKey::document_prefix(&key(1, "v").fingerprint);
        let k2 = key(2, "v").index_key();
        let k10 = key(10, "v").index_key();
        assert!(k2.starts_with(&prefix));
        assert!(k10.starts_with(&prefix));
        assert!(k2 < k10);
    }
}
