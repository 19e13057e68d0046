//! TTS Cache Service - 容错缓存门面
//!
//! 在 `TtsCachePort` 之上提供不会失败的缓存操作：
//! 存储错误记录为 warn 日志，读取降级为未命中，写入降级为丢弃

use std::sync::Arc;

use crate::application::ports::{CacheKey, CacheStats, TtsCachePort};
use crate::domain::document::{Document, DocumentFingerprint};

/// 容错 TTS 缓存
#[derive(Clone)]
pub struct TtsCache {
    port: Arc<dyn TtsCachePort>,
}

impl TtsCache {
    pub fn new(port: Arc<dyn TtsCachePort>) -> Self {
        Self { port }
    }

    /// 计算文档指纹（缓存分区键）
    pub fn fingerprint(&self, document: &Document) -> DocumentFingerprint {
        document.fingerprint().clone()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        match self.port.get(key).await {
            Ok(Some(audio)) => {
                tracing::debug!(key = %key, size_bytes = audio.len(), "TTS cache hit");
                Some(audio)
            }
            Ok(None) => {
                tracing::debug!(key = %key, "TTS cache miss");
                None
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "TTS cache read failed, treating as miss");
                None
            }
        }
    }

    pub async fn put(&self, key: &CacheKey, audio_data: Vec<u8>) {
        let size = audio_data.len();
        match self.port.put(key, audio_data).await {
            Ok(()) => tracing::debug!(key = %key, size_bytes = size, "Audio cached"),
            Err(e) => tracing::warn!(key = %key, error = %e, "TTS cache write dropped"),
        }
    }

    pub async fn has(&self, key: &CacheKey) -> bool {
        self.port.has(key).await.unwrap_or_else(|e| {
            tracing::warn!(key = %key, error = %e, "TTS cache lookup failed");
            false
        })
    }

    pub async fn evict(&self, key: &CacheKey) {
        if let Err(e) = self.port.evict(key).await {
            tracing::warn!(key = %key, error = %e, "TTS cache eviction failed");
        }
    }

    pub async fn evict_document(&self, fingerprint: &DocumentFingerprint) -> usize {
        match self.port.evict_document(fingerprint).await {
            Ok(removed) => {
                tracing::info!(fingerprint = %fingerprint, removed, "Document cache evicted");
                removed
            }
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint, error = %e, "Document cache eviction failed");
                0
            }
        }
    }

    pub async fn clear(&self) {
        match self.port.clear().await {
            Ok(()) => tracing::info!("TTS cache cleared"),
            Err(e) => tracing::warn!(error = %e, "TTS cache clear failed"),
        }
    }

    pub async fn stats(&self) -> CacheStats {
        self.port.stats().await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "TTS cache stats unavailable");
            CacheStats::default()
        })
    }

    /// 清理过期条目，返回删除数量
    pub async fn sweep_expired(&self) -> usize {
        match self.port.sweep_expired().await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(error = %e, "TTS cache sweep failed");
                0
            }
        }
    }

    pub async fn flush(&self) {
        if let Err(e) = self.port.flush().await {
            tracing::warn!(error = %e, "TTS cache flush failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::CacheError;
    use crate::domain::document::PageNumber;
    use async_trait::async_trait;

    /// 所有操作都失败的存储
    struct BrokenStore;

    #[async_trait]
    impl TtsCachePort for BrokenStore {
        async fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn put(&self, _key: &CacheKey, _audio_data: Vec<u8>) -> Result<(), CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn has(&self, _key: &CacheKey) -> Result<bool, CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn evict(&self, _key: &CacheKey) -> Result<(), CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn evict_document(&self, _fp: &DocumentFingerprint) -> Result<usize, CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn clear(&self) -> Result<(), CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn stats(&self) -> Result<CacheStats, CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
        async fn sweep_expired(&self) -> Result<usize, CacheError> {
            Err(CacheError::DatabaseError("disk gone".into()))
        }
    }

    #[tokio::test]
    async fn test_storage_failures_degrade_to_miss() {
        let cache = TtsCache::new(Arc::new(BrokenStore));
        let fp = DocumentFingerprint::from_string("doc_1_0000000000000000");
        let key = CacheKey::new(fp.clone(), PageNumber::first(), "voice");

        assert!(cache.get(&key).await.is_none());
        assert!(!cache.has(&key).await);
        cache.put(&key, vec![1, 2, 3]).await;
        cache.evict(&key).await;
        cache.clear().await;
        assert_eq!(cache.evict_document(&fp).await, 0);
        assert_eq!(cache.sweep_expired().await, 0);
        assert_eq!(cache.stats().await, CacheStats::default());
    }

    #[test]
    fn test_fingerprint_matches_document() {
        let cache = TtsCache::new(Arc::new(BrokenStore));
        let doc = Document::new("a.txt", b"hello".to_vec());
        assert_eq!(cache.fingerprint(&doc).as_str(), "a.txt_5_2cf24dba5fb0a30e");
    }
}
