//! Event Publisher Implementation
//!
//! 基于 tokio broadcast 的朗读事件推送：
//! - 全局通道: 所有事件
//! - 文档通道: 仅该文档的事件

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::application::ports::CacheKey;

const CHANNEL_CAPACITY: usize = 100;

/// 朗读事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ReaderEvent {
    /// 页面音频已合成并写入缓存
    PageCached {
        fingerprint: String,
        page: u32,
        voice_id: String,
        size_bytes: usize,
    },
    /// 页面音频命中缓存
    CacheHit {
        fingerprint: String,
        page: u32,
        voice_id: String,
    },
    /// 合成失败（页面或文本片段）
    SynthesisFailed {
        #[serde(skip_serializing_if = "Option::is_none")]
        fingerprint: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        page: Option<u32>,
        #[serde(skip_serializing_if = "Option::is_none")]
        chunk_index: Option<usize>,
        voice_id: String,
        error: String,
    },
}

impl ReaderEvent {
    fn fingerprint(&self) -> Option<&str> {
        match self {
            ReaderEvent::PageCached { fingerprint, .. } | ReaderEvent::CacheHit { fingerprint, .. } => {
                Some(fingerprint)
            }
            ReaderEvent::SynthesisFailed { fingerprint, .. } => fingerprint.as_deref(),
        }
    }
}

/// 事件发布器
pub struct EventPublisher {
    /// fingerprint -> broadcast sender
    document_channels: DashMap<String, broadcast::Sender<ReaderEvent>>,
    global_channel: broadcast::Sender<ReaderEvent>,
}

impl EventPublisher {
    pub fn new() -> Self {
        let (global_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            document_channels: DashMap::new(),
            global_channel: global_tx,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 订阅全局事件
    pub fn subscribe_global(&self) -> broadcast::Receiver<ReaderEvent> {
        self.global_channel.subscribe()
    }

    /// 订阅某文档的事件
    pub fn subscribe_document(&self, fingerprint: &str) -> broadcast::Receiver<ReaderEvent> {
        self.document_channels
            .entry(fingerprint.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// 取消文档通道
    pub fn unregister_document(&self, fingerprint: &str) {
        self.document_channels.remove(fingerprint);
    }

    pub fn publish_page_cached(&self, key: &CacheKey, size_bytes: usize) {
        self.publish(ReaderEvent::PageCached {
            fingerprint: key.fingerprint.to_string(),
            page: key.page.value(),
            voice_id: key.voice_id.clone(),
            size_bytes,
        });
    }

    pub fn publish_cache_hit(&self, key: &CacheKey) {
        self.publish(ReaderEvent::CacheHit {
            fingerprint: key.fingerprint.to_string(),
            page: key.page.value(),
            voice_id: key.voice_id.clone(),
        });
    }

    pub fn publish_page_failed(&self, key: &CacheKey, error: &str) {
        self.publish(ReaderEvent::SynthesisFailed {
            fingerprint: Some(key.fingerprint.to_string()),
            page: Some(key.page.value()),
            chunk_index: None,
            voice_id: key.voice_id.clone(),
            error: error.to_string(),
        });
    }

    pub fn publish_chunk_failed(&self, chunk_index: usize, voice_id: &str, error: &str) {
        self.publish(ReaderEvent::SynthesisFailed {
            fingerprint: None,
            page: None,
            chunk_index: Some(chunk_index),
            voice_id: voice_id.to_string(),
            error: error.to_string(),
        });
    }

    fn publish(&self, event: ReaderEvent) {
        if let Some(fingerprint) = event.fingerprint() {
            if let Some(sender) = self.document_channels.get(fingerprint) {
                if let Err(e) = sender.send(event.clone()) {
                    tracing::debug!(
                        fingerprint = %fingerprint,
                        error = %e,
                        "Failed to publish document event (no receivers)"
                    );
                }
            }
        }
        if let Err(e) = self.global_channel.send(event) {
            tracing::debug!(error = %e, "Failed to publish event (no receivers)");
        }
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::document::{DocumentFingerprint, PageNumber};

    fn key(fp: &str) -> CacheKey {
        CacheKey::new(DocumentFingerprint::from_string(fp), PageNumber::first(), "v1")
    }

    #[tokio::test]
    async fn test_document_channel_receives_only_its_events() {
        let publisher = EventPublisher::new();
        let mut global = publisher.subscribe_global();
        let mut doc_a = publisher.subscribe_document("a");

        publisher.publish_cache_hit(&key("b"));
        publisher.publish_page_cached(&key("a"), 42);

        let first = global.recv().await.unwrap();
        assert!(matches!(first, ReaderEvent::CacheHit { .. }));
        let second = global.recv().await.unwrap();
        assert!(matches!(second, ReaderEvent::PageCached { size_bytes: 42, .. }));

        let only = doc_a.recv().await.unwrap();
        assert_eq!(only, second);
        assert!(doc_a.try_recv().is_err());
    }

    #[test]
    fn test_publish_without_receivers_is_silent() {
        let publisher = EventPublisher::new();
        publisher.publish_chunk_failed(3, "v1", "timeout");
    }

    #[test]
    fn test_event_serialization() {
        let event = ReaderEvent::CacheHit {
            fingerprint: "doc".into(),
            page: 2,
            voice_id: "v1".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "CacheHit");
        assert_eq!(json["data"]["page"], 2);
    }
}
