//! Cache Queries - 音频缓存读操作

use crate::domain::document::{DocumentFingerprint, PageNumber};

/// 缓存统计
#[derive(Debug, Clone)]
pub struct GetCacheStats;

/// 检查单页是否已缓存
#[derive(Debug, Clone)]
pub struct IsPageCached {
    pub fingerprint: DocumentFingerprint,
    pub page: PageNumber,
    pub voice_id: String,
}
