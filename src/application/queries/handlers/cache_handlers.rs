//! Cache Query Handlers

use crate::application::ports::{CacheKey, CacheStats};
use crate::application::queries::{GetCacheStats, IsPageCached};
use crate::application::services::TtsCache;

/// 缓存统计响应
#[derive(Debug, Clone)]
pub struct CacheStatsResponse {
    pub total_entries: usize,
    pub total_size_bytes: u64,
    pub hit_count: u64,
    pub miss_count: u64,
    /// 命中率（无访问时为 0）
    pub hit_rate: f64,
}

impl From<CacheStats> for CacheStatsResponse {
    fn from(stats: CacheStats) -> Self {
        let lookups = stats.hit_count + stats.miss_count;
        let hit_rate = if lookups > 0 {
            stats.hit_count as f64 / lookups as f64
        } else {
            0.0
        };
        Self {
            total_entries: stats.total_entries,
            total_size_bytes: stats.total_size_bytes,
            hit_count: stats.hit_count,
            miss_count: stats.miss_count,
            hit_rate,
        }
    }
}

/// 缓存查询处理器
pub struct CacheQueryHandler {
    cache: TtsCache,
}

impl CacheQueryHandler {
    pub fn new(cache: TtsCache) -> Self {
        Self { cache }
    }

    pub async fn stats(&self, _query: GetCacheStats) -> CacheStatsResponse {
        CacheStatsResponse::from(self.cache.stats().await)
    }

    pub async fn is_page_cached(&self, query: IsPageCached) -> bool {
        let key = CacheKey::new(query.fingerprint, query.page, query.voice_id);
        self.cache.has(&key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_rate() {
        let stats = CacheStats {
            total_entries: 2,
            total_size_bytes: 10,
            hit_count: 3,
            miss_count: 1,
        };
        let response = CacheStatsResponse::from(stats);
        assert!((response.hit_rate - 0.75).abs() < f64::EPSILON);

        let empty = CacheStatsResponse::from(CacheStats::default());
        assert_eq!(empty.hit_rate, 0.0);
    }
}
