//! In-Memory TTS Cache Implementation
//!
//! 不落盘的缓存，语义与 Sled 实现一致（TTL、惰性过期、按文档清理）

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{CacheError, CacheKey, CacheStats, Clock, TtsCachePort};
use crate::domain::document::DocumentFingerprint;

struct MemoryEntry {
    audio_data: Vec<u8>,
    created_at: i64,
}

/// 内存 TTS 缓存
pub struct InMemoryTtsCache {
    entries: DashMap<CacheKey, MemoryEntry>,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl InMemoryTtsCache {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl_millis: (ttl_secs as i64).saturating_mul(1000),
            clock,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn is_expired(&self, entry: &MemoryEntry, now: i64) -> bool {
        now - entry.created_at > self.ttl_millis
    }
}

#[async_trait]
impl TtsCachePort for InMemoryTtsCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now_millis();
        let removed = self
            .entries
            .remove_if(key, |_, entry| self.is_expired(entry, now))
            .is_some();

        let audio = if removed {
            None
        } else {
            self.entries.get(key).map(|entry| entry.audio_data.clone())
        };

        match audio {
            Some(audio) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Ok(Some(audio))
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    async fn put(&self, key: &CacheKey, audio_data: Vec<u8>) -> Result<(), CacheError> {
        let entry = MemoryEntry {
            audio_data,
            created_at: self.clock.now_millis(),
        };
        self.entries.insert(key.clone(), entry);
        Ok(())
    }

    async fn has(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let now = self.clock.now_millis();
        self.entries.remove_if(key, |_, entry| self.is_expired(entry, now));
        Ok(self.entries.contains_key(key))
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn evict_document(&self, fingerprint: &DocumentFingerprint) -> Result<usize, CacheError> {
        let before = self.entries.len();
        self.entries.retain(|key, _| &key.fingerprint != fingerprint);
        Ok(before - self.entries.len())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        self.entries.clear();
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = self.clock.now_millis();
        let (count, size) = self
            .entries
            .iter()
            .filter(|entry| !self.is_expired(entry.value(), now))
            .fold((0usize, 0u64), |(count, size), entry| {
                (count + 1, size + entry.audio_data.len() as u64)
            });

        Ok(CacheStats {
            total_entries: count,
            total_size_bytes: size,
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        })
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !self.is_expired(entry, now));
        Ok(before - self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::PageNumber;
    use crate::infrastructure::clock::ManualClock;
    use std::time::Duration;

    fn key(fp: &str, page: u32) -> CacheKey {
        CacheKey::new(DocumentFingerprint::from_string(fp), PageNumber::new(page).unwrap(), "v")
    }

    #[tokio::test]
    async fn test_expiry_and_document_eviction() {
        let clock = Arc::new(ManualClock::new(0));
        let cache = InMemoryTtsCache::new(10, clock.clone());

        cache.put(&key("a", 1), vec![1, 2]).await.unwrap();
        cache.put(&key("a", 2), vec![3]).await.unwrap();
        cache.put(&key("b", 1), vec![4]).await.unwrap();

        assert_eq!(cache.evict_document(&DocumentFingerprint::from_string("a")).await.unwrap(), 2);
        assert!(cache.has(&key("b", 1)).await.unwrap());

        clock.advance(Duration::from_secs(11));
        assert_eq!(cache.get(&key("b", 1)).await.unwrap(), None);
        assert_eq!(cache.stats().await.unwrap().total_entries, 0);
        assert_eq!(cache.stats().await.unwrap().miss_count, 1);
    }
}
