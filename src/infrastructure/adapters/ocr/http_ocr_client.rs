//! HTTP OCR Client - 调用页面识别 HTTP 服务
//!
//! 外部 OCR API:
//! POST {base_url}/api/pdf/ocr
//! Request: multipart/form-data, `file` (PNG) + `pageNumber`
//! Response: {"text": "..."}

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::application::ports::{OcrEnginePort, OcrError, OcrRequest};

#[derive(Debug, Deserialize)]
struct OcrHttpResponse {
    #[serde(default)]
    text: Option<String>,
}

/// HTTP OCR 客户端配置
#[derive(Debug, Clone)]
pub struct HttpOcrClientConfig {
    /// OCR 服务基础 URL
    pub base_url: String,
    /// 请求超时时间（秒）
    pub timeout_secs: u64,
}

impl Default for HttpOcrClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            timeout_secs: 120,
        }
    }
}

impl HttpOcrClientConfig {
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
}

/// HTTP OCR 客户端
pub struct HttpOcrClient {
    client: Client,
    config: HttpOcrClientConfig,
}

impl HttpOcrClient {
    pub fn new(config: HttpOcrClientConfig) -> Result<Self, OcrError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| OcrError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn ocr_url(&self) -> String {
        format!("{}/api/pdf/ocr", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl OcrEnginePort for HttpOcrClient {
    async fn recognize(&self, request: OcrRequest) -> Result<String, OcrError> {
        let image_size = request.image.len();
        let part = Part::bytes(request.image)
            .file_name(request.file_name)
            .mime_str("image/png")
            .map_err(|e| OcrError::NetworkError(e.to_string()))?;
        let form = Form::new()
            .part("file", part)
            .text("pageNumber", request.page_number.to_string());

        tracing::debug!(
            url = %self.ocr_url(),
            page = request.page_number,
            image_size,
            "Sending OCR request"
        );

        let response = self
            .client
            .post(self.ocr_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OcrError::Timeout
                } else {
                    OcrError::NetworkError(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(OcrError::ServiceError(format!("HTTP {}: {}", status, error_text)));
        }

        let body: OcrHttpResponse = response
            .json()
            .await
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

        let text = body.text.unwrap_or_default();
        tracing::info!(page = request.page_number, chars = text.chars().count(), "OCR completed");
        Ok(text)
    }
}
