//! Cache Commands - 音频缓存写操作

use crate::domain::document::{DocumentFingerprint, PageNumber};

/// 删除单页缓存
#[derive(Debug, Clone)]
pub struct EvictPageCache {
    pub fingerprint: DocumentFingerprint,
    pub page: PageNumber,
    pub voice_id: String,
}

/// 删除文档的所有缓存
#[derive(Debug, Clone)]
pub struct EvictDocumentCache {
    pub fingerprint: DocumentFingerprint,
}

/// 清空缓存
#[derive(Debug, Clone)]
pub struct ClearCache;

/// 清理过期条目
#[derive(Debug, Clone)]
pub struct SweepExpiredCache;
