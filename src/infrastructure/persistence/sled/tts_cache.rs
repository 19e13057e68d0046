//! Sled-based TTS Audio Cache Implementation
//!
//! 两棵树：
//! - `tts_audio`: `{fingerprint}_{page}_{voice}` → 音频条目
//! - `tts_index`: `{fingerprint}\0{page:010}\0{voice}` → 条目摘要（按文档前缀扫描、统计与清理）
//!
//! 两棵树的写入与删除都在同一个 sled 事务中完成，过期清理在事务内重新判断

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::application::ports::{CacheError, CacheKey, CacheStats, Clock, TtsCachePort};
use crate::domain::document::DocumentFingerprint;

const AUDIO_TREE: &str = "tts_audio";
const INDEX_TREE: &str = "tts_index";

/// 默认 TTL：7 天
pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Sled 缓存配置
#[derive(Debug, Clone)]
pub struct SledCacheConfig {
    /// 数据库路径
    pub db_path: String,
    /// 条目存活时间（秒），从写入时开始计算
    pub ttl_secs: u64,
}

impl Default for SledCacheConfig {
    fn default() -> Self {
        Self {
            db_path: "data/tts_cache.sled".to_string(),
            ttl_secs: DEFAULT_TTL_SECS,
        }
    }
}

/// 内部缓存条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct InternalCacheEntry {
    audio_data: Vec<u8>,
    size_bytes: u64,
    fingerprint: String,
    page: u32,
    voice_id: String,
    created_at: i64,
}

/// 索引条目
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    storage_key: String,
    size_bytes: u64,
    created_at: i64,
}

fn db_err(e: sled::Error) -> CacheError {
    CacheError::DatabaseError(e.to_string())
}

fn ser_err(e: bincode::Error) -> CacheError {
    CacheError::SerializationError(e.to_string())
}

type TxResult<T> = Result<T, ConflictableTransactionError<CacheError>>;

fn tx_err(e: TransactionError<CacheError>) -> CacheError {
    match e {
        TransactionError::Abort(e) => e,
        TransactionError::Storage(e) => db_err(e),
    }
}

/// Sled TTS 音频缓存
pub struct SledTtsCache {
    db: Db,
    audio: Tree,
    index: Tree,
    ttl_millis: i64,
    clock: Arc<dyn Clock>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl SledTtsCache {
    /// 创建新的缓存实例
    pub fn new(config: &SledCacheConfig, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let db = sled::open(&config.db_path).map_err(db_err)?;
        let audio = db.open_tree(AUDIO_TREE).map_err(db_err)?;
        let index = db.open_tree(INDEX_TREE).map_err(db_err)?;

        tracing::info!(
            db_path = %config.db_path,
            ttl_secs = config.ttl_secs,
            entries = index.len(),
            "SledTtsCache initialized"
        );

        Ok(Self {
            db,
            audio,
            index,
            ttl_millis: (config.ttl_secs as i64).saturating_mul(1000),
            clock,
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        })
    }

    /// 打开现有缓存
    pub fn open<P: AsRef<Path>>(path: P, ttl_secs: u64, clock: Arc<dyn Clock>) -> Result<Self, CacheError> {
        let config = SledCacheConfig {
            db_path: path.as_ref().to_string_lossy().to_string(),
            ttl_secs,
        };
        Self::new(&config, clock)
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn is_expired(&self, created_at: i64, now: i64) -> bool {
        now - created_at > self.ttl_millis
    }

    fn remove_pair(&self, storage_key: &[u8], index_key: &[u8]) -> Result<(), CacheError> {
        (&self.audio, &self.index)
            .transaction(|(audio, index)| -> TxResult<()> {
                audio.remove(storage_key)?;
                index.remove(index_key)?;
                Ok(())
            })
            .map_err(tx_err)
    }

    /// 若索引条目在事务内仍然过期则删除整对条目；并发写入的新条目保留
    fn purge_if_expired(&self, index_key: &[u8], now: i64) -> Result<bool, CacheError> {
        (&self.audio, &self.index)
            .transaction(|(audio, index)| -> TxResult<bool> {
                let Some(data) = index.get(index_key)? else {
                    return Ok(false);
                };
                let entry: IndexEntry = bincode::deserialize(&data)
                    .map_err(|e| ConflictableTransactionError::Abort(ser_err(e)))?;
                if !self.is_expired(entry.created_at, now) {
                    return Ok(false);
                }
                audio.remove(entry.storage_key.as_bytes())?;
                index.remove(index_key)?;
                Ok(true)
            })
            .map_err(tx_err)
    }

    /// 扫描索引，返回 (索引键, 条目)；无法解析的索引条目被跳过
    fn scan_index(&self, prefix: &[u8]) -> Result<Vec<(sled::IVec, IndexEntry)>, CacheError> {
        let mut entries = Vec::new();
        for item in self.index.scan_prefix(prefix) {
            let (key, value) = item.map_err(db_err)?;
            match bincode::deserialize::<IndexEntry>(&value) {
                Ok(entry) => entries.push((key, entry)),
                Err(e) => tracing::warn!(error = %e, "Skipping corrupt cache index entry"),
            }
        }
        Ok(entries)
    }
}

#[async_trait]
impl TtsCachePort for SledTtsCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<Vec<u8>>, CacheError> {
        let storage_key = key.storage_key();

        let Some(data) = self.audio.get(&storage_key).map_err(db_err)? else {
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        };

        let entry: InternalCacheEntry = bincode::deserialize(&data).map_err(ser_err)?;
        let now = self.clock.now_millis();
        if self.is_expired(entry.created_at, now) {
            if self.purge_if_expired(key.index_key().as_bytes(), now)? {
                tracing::debug!(key = %key, "Expired cache entry purged");
            }
            self.miss_count.fetch_add(1, Ordering::Relaxed);
            return Ok(None);
        }

        self.hit_count.fetch_add(1, Ordering::Relaxed);
        Ok(Some(entry.audio_data))
    }

    async fn put(&self, key: &CacheKey, audio_data: Vec<u8>) -> Result<(), CacheError> {
        let size = audio_data.len() as u64;
        let now = self.clock.now_millis();
        let storage_key = key.storage_key();

        let entry = InternalCacheEntry {
            audio_data,
            size_bytes: size,
            fingerprint: key.fingerprint.to_string(),
            page: key.page.value(),
            voice_id: key.voice_id.clone(),
            created_at: now,
        };
        let index_entry = IndexEntry {
            storage_key: storage_key.clone(),
            size_bytes: size,
            created_at: now,
        };

        let entry_bytes = bincode::serialize(&entry).map_err(ser_err)?;
        let index_bytes = bincode::serialize(&index_entry).map_err(ser_err)?;

        let index_key = key.index_key();

        (&self.audio, &self.index)
            .transaction(|(audio, index)| -> TxResult<()> {
                audio.insert(storage_key.as_bytes(), entry_bytes.as_slice())?;
                index.insert(index_key.as_bytes(), index_bytes.as_slice())?;
                Ok(())
            })
            .map_err(tx_err)?;

        tracing::debug!(key = %key, size_bytes = size, "Audio cached");
        Ok(())
    }

    async fn has(&self, key: &CacheKey) -> Result<bool, CacheError> {
        let index_key = key.index_key();
        let Some(data) = self.index.get(&index_key).map_err(db_err)? else {
            return Ok(false);
        };

        let entry: IndexEntry = bincode::deserialize(&data).map_err(ser_err)?;
        let now = self.clock.now_millis();
        if self.is_expired(entry.created_at, now) {
            self.purge_if_expired(index_key.as_bytes(), now)?;
            return Ok(false);
        }
        Ok(true)
    }

    async fn evict(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.remove_pair(key.storage_key().as_bytes(), key.index_key().as_bytes())
    }

    async fn evict_document(&self, fingerprint: &DocumentFingerprint) -> Result<usize, CacheError> {
        let prefix = CacheKey::document_prefix(fingerprint);
        let entries = self.scan_index(prefix.as_bytes())?;

        for (index_key, entry) in &entries {
            self.remove_pair(entry.storage_key.as_bytes(), index_key)?;
        }

        tracing::debug!(fingerprint = %fingerprint, removed = entries.len(), "Document cache evicted");
        Ok(entries.len())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        // 索引不得指向缺失的音频，故先清索引
        self.index.clear().map_err(db_err)?;
        self.audio.clear().map_err(db_err)?;
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let now = self.clock.now_millis();
        let live: Vec<IndexEntry> = self
            .scan_index(&[])?
            .into_iter()
            .map(|(_, entry)| entry)
            .filter(|entry| !self.is_expired(entry.created_at, now))
            .collect();

        Ok(CacheStats {
            total_entries: live.len(),
            total_size_bytes: live.iter().map(|e| e.size_bytes).sum(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        })
    }

    async fn sweep_expired(&self) -> Result<usize, CacheError> {
        let now = self.clock.now_millis();
        let mut removed = 0;
        for (index_key, entry) in self.scan_index(&[])? {
            if self.is_expired(entry.created_at, now) && self.purge_if_expired(&index_key, now)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "Expired cache entries swept");
        }
        Ok(removed)
    }

    async fn flush(&self) -> Result<(), CacheError> {
        self.db.flush_async().await.map_err(db_err)?;
        Ok(())
    }
}
