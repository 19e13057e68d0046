//! Cache Command Handlers
//!
//! 缓存命令不会失败：存储错误已在 `TtsCache` 中降级并记录

use crate::application::commands::{ClearCache, EvictDocumentCache, EvictPageCache, SweepExpiredCache};
use crate::application::ports::CacheKey;
use crate::application::services::TtsCache;

/// 缓存命令处理器
pub struct CacheCommandHandler {
    cache: TtsCache,
}

impl CacheCommandHandler {
    pub fn new(cache: TtsCache) -> Self {
        Self { cache }
    }

    pub async fn evict_page(&self, command: EvictPageCache) {
        let key = CacheKey::new(command.fingerprint, command.page, command.voice_id);
        self.cache.evict(&key).await;
    }

    /// 返回删除的条目数
    pub async fn evict_document(&self, command: EvictDocumentCache) -> usize {
        self.cache.evict_document(&command.fingerprint).await
    }

    pub async fn clear(&self, _command: ClearCache) {
        self.cache.clear().await;
    }

    /// 返回删除的过期条目数
    pub async fn sweep(&self, _command: SweepExpiredCache) -> usize {
        let removed = self.cache.sweep_expired().await;
        if removed > 0 {
            tracing::info!(removed, "Expired cache entries swept");
        }
        removed
    }
}
