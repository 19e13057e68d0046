//! Reader Service - 朗读编排
//!
//! 决定读哪一页/哪段文本，先查缓存再调用远程合成，结果写回缓存：
//!
//! ```text
//! 页面 → 文本（直接/版面提取/OCR） → 缓存查找 → 未命中则合成 → 写入缓存 → 音频
//! 文本 → 分段 → 从偏移继续 → 逐段合成
//! ```
//!
//! 所有失败都降级为“该页/该段无音频”，由调用方跳过。
//! 同一 CacheKey 的合成在服务内串行化，前台读取与后台预读不会重复调用远程合成。

use dashmap::DashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::application::ports::{
    CacheKey, OcrEnginePort, OcrRequest, SynthesisRequest, TtsEnginePort, TtsError,
    DEFAULT_MODEL_ID, DEFAULT_OUTPUT_FORMAT,
};
use crate::application::services::TtsCache;
use crate::domain::document::PageNumber;
use crate::domain::{extract_readable_text, resume_from, segment_text, LayoutConfig, SegmentConfig, TextChunk, TextItem};
use crate::infrastructure::events::EventPublisher;

/// 朗读参数
#[derive(Debug, Clone)]
pub struct ReaderSettings {
    pub model_id: String,
    pub output_format: String,
    pub segment: SegmentConfig,
    pub layout: LayoutConfig,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            model_id: DEFAULT_MODEL_ID.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            segment: SegmentConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

/// 页面内容来源
#[derive(Debug, Clone)]
pub enum PageContent {
    /// 已提取的纯文本
    Text(String),
    /// 带坐标的文本片段
    Positioned { items: Vec<TextItem>, page_height: f64 },
    /// 无文本层的页面图像，需要 OCR
    Image { data: Vec<u8>, file_name: String },
}

/// 预取结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefetchOutcome {
    /// 缓存中已有
    AlreadyCached,
    /// 已合成并写入缓存
    Cached,
    /// 页面没有可朗读文本
    NoText,
    /// 合成失败
    Failed,
}

/// 朗读服务
pub struct ReaderService {
    cache: TtsCache,
    tts_engine: Arc<dyn TtsEnginePort>,
    ocr_engine: Arc<dyn OcrEnginePort>,
    event_publisher: Arc<EventPublisher>,
    settings: ReaderSettings,
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl ReaderService {
    pub fn new(
        cache: TtsCache,
        tts_engine: Arc<dyn TtsEnginePort>,
        ocr_engine: Arc<dyn OcrEnginePort>,
        event_publisher: Arc<EventPublisher>,
        settings: ReaderSettings,
    ) -> Self {
        Self {
            cache,
            tts_engine,
            ocr_engine,
            event_publisher,
            settings,
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &TtsCache {
        &self.cache
    }

    pub fn settings(&self) -> &ReaderSettings {
        &self.settings
    }

    /// 获取页面音频：缓存优先，未命中时提取文本、合成并写入缓存
    ///
    /// 同一页正在合成时等待其完成，再从缓存读取
    pub async fn page_audio(&self, key: &CacheKey, content: PageContent) -> Option<Vec<u8>> {
        if let Some(audio) = self.cached_audio(key).await {
            return Some(audio);
        }

        self.exclusive(key, move || async move {
            if self.cache.has(key).await {
                if let Some(audio) = self.cached_audio(key).await {
                    return Some(audio);
                }
            }
            let text = self.page_text(key.page, content).await;
            self.synthesize_page(key, &text).await
        })
        .await
    }

    /// 预取页面音频到缓存（不返回音频）
    pub async fn prefetch_page(&self, key: &CacheKey, content: PageContent) -> PrefetchOutcome {
        if self.cache.has(key).await {
            tracing::debug!(key = %key, "Page already cached, prefetch skipped");
            return PrefetchOutcome::AlreadyCached;
        }

        self.exclusive(key, move || async move {
            if self.cache.has(key).await {
                return PrefetchOutcome::AlreadyCached;
            }
            let text = self.page_text(key.page, content).await;
            if text.is_empty() {
                return PrefetchOutcome::NoText;
            }
            match self.synthesize_page(key, &text).await {
                Some(_) => PrefetchOutcome::Cached,
                None => PrefetchOutcome::Failed,
            }
        })
        .await
    }

    /// 获取页面可朗读文本
    ///
    /// OCR 失败时返回空字符串
    pub async fn page_text(&self, page: PageNumber, content: PageContent) -> String {
        match content {
            PageContent::Text(text) => text.trim().to_string(),
            PageContent::Positioned { items, page_height } => {
                extract_readable_text(&items, page_height, &self.settings.layout)
            }
            PageContent::Image { data, file_name } => {
                let request = OcrRequest {
                    image: data,
                    file_name,
                    page_number: page.value(),
                };
                match self.ocr_engine.recognize(request).await {
                    Ok(text) => {
                        tracing::debug!(page = %page, chars = text.chars().count(), "Page text recognized");
                        text.trim().to_string()
                    }
                    Err(e) => {
                        tracing::warn!(page = %page, error = %e, "OCR failed, page has no text");
                        String::new()
                    }
                }
            }
        }
    }

    /// 分段并从指定字符偏移继续
    pub fn plan_text(&self, text: &str, from_offset: usize) -> Vec<TextChunk> {
        let chunks = segment_text(text, &self.settings.segment);
        resume_from(&chunks, from_offset).to_vec()
    }

    /// 合成单个文本片段；失败返回 None
    pub async fn synthesize_chunk(&self, chunk: &TextChunk, voice_id: &str) -> Option<Vec<u8>> {
        match self.synthesize(&chunk.text, voice_id).await {
            Ok(audio) => {
                tracing::debug!(
                    chunk_index = chunk.index,
                    chars = chunk.char_count(),
                    size_bytes = audio.len(),
                    "Chunk synthesized"
                );
                Some(audio)
            }
            Err(e) => {
                tracing::warn!(chunk_index = chunk.index, error = %e, "Chunk synthesis failed, skipping");
                self.event_publisher
                    .publish_chunk_failed(chunk.index, voice_id, &e.to_string());
                None
            }
        }
    }

    /// 朗读任意文本：分段、从偏移继续、按顺序逐段合成
    ///
    /// 失败的片段音频为 None，调用方只需入队成功的片段
    pub async fn synthesize_text(
        &self,
        text: &str,
        voice_id: &str,
        from_offset: usize,
    ) -> Vec<(TextChunk, Option<Vec<u8>>)> {
        let chunks = self.plan_text(text, from_offset);
        tracing::info!(chunks = chunks.len(), from_offset, voice_id = %voice_id, "Synthesizing text");

        let mut results = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let audio = self.synthesize_chunk(&chunk, voice_id).await;
            results.push((chunk, audio));
        }
        results
    }

    async fn cached_audio(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let audio = self.cache.get(key).await?;
        self.event_publisher.publish_cache_hit(key);
        Some(audio)
    }

    /// 持有该 key 的锁执行 `f`；最后一个持有者移除锁
    async fn exclusive<T, F, Fut>(&self, key: &CacheKey, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let lock = self.in_flight.entry(key.clone()).or_default().clone();
        let output = {
            let _guard = lock.lock().await;
            f().await
        };
        drop(lock);
        self.in_flight.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        output
    }

    async fn synthesize_page(&self, key: &CacheKey, text: &str) -> Option<Vec<u8>> {
        if text.trim().is_empty() {
            tracing::debug!(key = %key, "No text for page, nothing to synthesize");
            return None;
        }

        match self.synthesize(text, &key.voice_id).await {
            Ok(audio) => {
                self.cache.put(key, audio.clone()).await;
                self.event_publisher.publish_page_cached(key, audio.len());
                tracing::info!(
                    fingerprint = %key.fingerprint,
                    page = %key.page,
                    voice_id = %key.voice_id,
                    size_bytes = audio.len(),
                    "Page synthesized"
                );
                Some(audio)
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Page synthesis failed");
                self.event_publisher.publish_page_failed(key, &e.to_string());
                None
            }
        }
    }

    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, TtsError> {
        let request = SynthesisRequest::new(text, voice_id)
            .with_model(self.settings.model_id.clone())
            .with_output_format(self.settings.output_format.clone());
        let response = self.tts_engine.synthesize(request).await?;
        if response.audio_data.is_empty() {
            return Err(TtsError::InvalidResponse("empty audio".to_string()));
        }
        Ok(response.audio_data)
    }
}
