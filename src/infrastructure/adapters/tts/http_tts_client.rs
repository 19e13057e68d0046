//! HTTP TTS Client - 调用语音合成 HTTP 服务
//!
//! 实现 TtsEnginePort trait
//!
//! 外部 TTS API:
//! POST {base_url}/api/tts
//! Request: {"text": "...", "voiceId": "...", "modelId": "...", "outputFormat": "..."}  (JSON)
//! Response: audio/mpeg binary

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use crate::application::ports::{SynthesisRequest, SynthesisResponse, TtsEnginePort, TtsError};

/// TTS 请求体 (JSON)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TtsHttpRequest<'a> {
    text: &'a str,
    voice_id: &'a str,
    model_id: &'a str,
    output_format: &'a str,
}

/// 单次请求失败：错误与 HTTP 状态（若已收到响应）
#[derive(Debug)]
struct SendFailure {
    error: TtsError,
    status: Option<StatusCode>,
}

impl SendFailure {
    fn transport(error: TtsError) -> Self {
        Self { error, status: None }
    }

    fn http(status: StatusCode, body: &str) -> Self {
        let message = format!("HTTP {}: {}", status, body);
        let error = match status {
            StatusCode::BAD_REQUEST => TtsError::InvalidRequest(message),
            _ => TtsError::ServiceError(message),
        };
        Self {
            error,
            status: Some(status),
        }
    }

    /// 网络错误、超时与 5xx 可重试
    fn is_retryable(&self) -> bool {
        matches!(self.error, TtsError::NetworkError(_) | TtsError::Timeout)
            || self.status.is_some_and(|s| s.is_server_error())
    }
}

/// HTTP TTS 客户端配置
#[derive(Debug, Clone)]
pub struct HttpTtsClientConfig {
    /// TTS 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
    /// 重试次数（仅网络错误、超时与 5xx）
    pub max_retries: u32,
}

impl Default for HttpTtsClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 120,
            max_retries: 0,
        }
    }
}

impl HttpTtsClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// HTTP TTS 客户端
pub struct HttpTtsClient {
    client: Client,
    config: HttpTtsClientConfig,
}

impl HttpTtsClient {
    /// 创建新的 HTTP TTS 客户端
    pub fn new(config: HttpTtsClientConfig) -> Result<Self, TtsError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TtsError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    /// 使用默认配置创建客户端
    pub fn with_default_config() -> Result<Self, TtsError> {
        Self::new(HttpTtsClientConfig::default())
    }

    fn synthesize_url(&self) -> String {
        format!("{}/api/tts", self.config.base_url.trim_end_matches('/'))
    }

    fn health_url(&self) -> String {
        format!("{}/api/voices", self.config.base_url.trim_end_matches('/'))
    }

    async fn send_once(&self, body: &TtsHttpRequest<'_>) -> Result<SynthesisResponse, SendFailure> {
        let response = self
            .client
            .post(self.synthesize_url())
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TtsError::Timeout
                } else if e.is_connect() {
                    TtsError::NetworkError(format!("Cannot connect to TTS service: {}", e))
                } else {
                    TtsError::NetworkError(e.to_string())
                }
            })
            .map_err(SendFailure::transport)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(SendFailure::http(status, &error_text));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let audio_data = response
            .bytes()
            .await
            .map_err(|e| {
                SendFailure::transport(TtsError::InvalidResponse(format!("Failed to read audio: {}", e)))
            })?
            .to_vec();

        Ok(SynthesisResponse {
            audio_data,
            content_type,
        })
    }
}

#[async_trait]
impl TtsEnginePort for HttpTtsClient {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<SynthesisResponse, TtsError> {
        if request.text.trim().is_empty() {
            return Err(TtsError::InvalidRequest("Text cannot be empty".to_string()));
        }
        if request.voice_id.trim().is_empty() {
            return Err(TtsError::InvalidRequest("Voice ID is required".to_string()));
        }

        let body = TtsHttpRequest {
            text: &request.text,
            voice_id: &request.voice_id,
            model_id: &request.model_id,
            output_format: &request.output_format,
        };

        tracing::debug!(
            url = %self.synthesize_url(),
            text_len = request.text.len(),
            voice_id = %request.voice_id,
            model_id = %request.model_id,
            "Sending TTS request"
        );

        let mut attempt = 0;
        loop {
            match self.send_once(&body).await {
                Ok(response) => {
                    tracing::info!(
                        voice_id = %request.voice_id,
                        audio_size = response.audio_data.len(),
                        content_type = ?response.content_type,
                        attempts = attempt + 1,
                        "TTS synthesis completed"
                    );
                    return Ok(response);
                }
                Err(failure) if attempt < self.config.max_retries && failure.is_retryable() => {
                    attempt += 1;
                    tracing::warn!(attempt, error = %failure.error, "TTS request failed, retrying");
                }
                Err(failure) => return Err(failure.error),
            }
        }
    }

    async fn health_check(&self) -> bool {
        match self
            .client
            .get(self.health_url())
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}
