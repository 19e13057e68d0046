//! TTS Engine Port - 远程语音合成抽象
//!
//! 定义语音合成的抽象接口，具体实现在 infrastructure/adapters 层

use async_trait::async_trait;
use thiserror::Error;

/// 默认合成模型
pub const DEFAULT_MODEL_ID: &str = "eleven_multilingual_v2";

/// 默认输出格式
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";

/// TTS 错误
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// 语音合成请求
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    /// 要合成的文本
    pub text: String,
    /// 音色 ID
    pub voice_id: String,
    /// 合成模型
    pub model_id: String,
    /// 输出编码格式
    pub output_format: String,
}

impl SynthesisRequest {
    /// 使用默认模型与格式
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            voice_id: voice_id.into(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }
}

/// 语音合成响应
#[derive(Debug, Clone)]
pub struct SynthesisResponse {
    /// 编码后的音频数据
    pub audio_data: Vec<u8>,
    /// 响应的内容类型（如 audio/mpeg）
    pub content_type: Option<String>,
}

/// TTS Engine Port
#[async_trait]
pub trait TtsEnginePort: Send + Sync {
    /// 合成一段文本
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse, TtsError>;

    /// 检查 TTS 服务是否可用
    async fn health_check(&self) -> bool {
        true
    }
}
