//! 应用层错误定义
//!
//! 统一的命令/查询错误类型

use thiserror::Error;

use crate::application::ports::{CacheError, OcrError, RepositoryError, TtsError};

/// 应用层错误
#[derive(Debug, Error)]
pub enum ApplicationError {
    /// 资源未找到
    #[error("{resource_type} not found: {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// 验证错误
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// 仓储错误
    #[error("Repository error: {0}")]
    RepositoryError(String),

    /// 缓存错误
    #[error("Cache error: {0}")]
    CacheError(String),

    /// 外部服务错误
    #[error("External service error: {0}")]
    ExternalServiceError(String),
}

impl ApplicationError {
    /// 创建 NotFound 错误
    pub fn not_found(resource_type: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type,
            id: id.into(),
        }
    }

    /// 创建验证错误
    pub fn validation(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

impl From<RepositoryError> for ApplicationError {
    fn from(err: RepositoryError) -> Self {
        Self::RepositoryError(err.to_string())
    }
}

impl From<CacheError> for ApplicationError {
    fn from(err: CacheError) -> Self {
        Self::CacheError(err.to_string())
    }
}

impl From<TtsError> for ApplicationError {
    fn from(err: TtsError) -> Self {
        Self::ExternalServiceError(format!("tts: {}", err))
    }
}

impl From<OcrError> for ApplicationError {
    fn from(err: OcrError) -> Self {
        Self::ExternalServiceError(format!("ocr: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = ApplicationError::not_found("Document", "book.txt_5_abc");
        assert_eq!(err.to_string(), "Document not found: book.txt_5_abc");

        let err = ApplicationError::from(TtsError::Timeout);
        assert!(matches!(err, ApplicationError::ExternalServiceError(ref m) if m.starts_with("tts:")));

        let err = ApplicationError::from(RepositoryError::NotFound("x".to_string()));
        assert!(matches!(err, ApplicationError::RepositoryError(_)));
    }
}
