//! OCR Engine Port - 页面图像识别
//!
//! 无文本层的页面（扫描件）交给远程 OCR 服务识别

use async_trait::async_trait;
use thiserror::Error;

/// OCR 错误
#[derive(Debug, Error)]
pub enum OcrError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// OCR 请求
#[derive(Debug, Clone)]
pub struct OcrRequest {
    /// 页面图像（PNG/JPEG）
    pub image: Vec<u8>,
    /// 上传文件名
    pub file_name: String,
    /// 页码（从 1 开始）
    pub page_number: u32,
}

/// OCR Engine Port
#[async_trait]
pub trait OcrEnginePort: Send + Sync {
    /// 识别页面图像中的文本
    async fn recognize(&self, request: OcrRequest) -> Result<String, OcrError>;
}
