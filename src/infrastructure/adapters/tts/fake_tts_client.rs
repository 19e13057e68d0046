//! Fake TTS Client - 离线 TTS 客户端
//!
//! 不调用远程服务，返回由文本确定的伪音频，用于测试与离线演示

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, SynthesisResponse, TtsEnginePort, TtsError};

/// Fake TTS Client 配置
#[derive(Debug, Clone, Default)]
pub struct FakeTtsClientConfig {
    /// 模拟合成延迟
    pub latency: Duration,
    /// 文本包含任一子串时返回错误
    pub fail_on: Vec<String>,
}

/// Fake TTS Client
///
/// 音频内容为 `"{voice_id}:{text}"` 的字节，同一输入总是得到相同输出
pub struct FakeTtsClient {
    config: FakeTtsClientConfig,
    calls: AtomicUsize,
}

impl FakeTtsClient {
    pub fn new(config: FakeTtsClientConfig) -> Self {
        tracing::info!(latency_ms = config.latency.as_millis() as u64, "FakeTtsClient initialized");
        Self {
            config,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(FakeTtsClientConfig::default())
    }

    /// 让包含指定子串的文本合成失败
    pub fn failing_on(mut self, needle: impl Into<String>) -> Self {
        self.config.fail_on.push(needle.into());
        self
    }

    /// 已收到的合成请求数
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 给定输入对应的伪音频
    pub fn audio_for(voice_id: &str, text: &str) -> Vec<u8> {
        format!("{}:{}", voice_id, text).into_bytes()
    }
}

#[async_trait]
impl TtsEnginePort for FakeTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        tracing::debug!(
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            "FakeTtsClient: returning synthetic audio"
        );

        if !self.config.latency.is_zero() {
            tokio::time::sleep(self.config.latency).await;
        }

        if let Some(needle) = self.config.fail_on.iter().find(|n| request.text.contains(n.as_str())) {
            return Err(TtsError::ServiceError(format!("synthetic failure on '{}'", needle)));
        }

        Ok(SynthesisResponse {
            audio_data: Self::audio_for(&request.voice_id, &request.text),
            content_type: Some("audio/mpeg".to_string()),
        })
    }
}
