//! Document Library Port - 本地文档库
//!
//! 保存用户打开过的文档，按最近使用排序

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::document::{Document, DocumentFingerprint};

/// Repository 错误
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

/// 文档记录（含文件内容）
#[derive(Debug, Clone)]
pub struct DocumentRecord {
    pub id: DocumentFingerprint,
    pub name: String,
    pub size: u64,
    pub content: Vec<u8>,
    pub added_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl DocumentRecord {
    /// 重建文档聚合
    pub fn into_document(self) -> Document {
        Document::new(self.name, self.content)
    }
}

/// 文档摘要（列表展示，不含文件内容）
#[derive(Debug, Clone)]
pub struct DocumentSummary {
    pub id: DocumentFingerprint,
    pub name: String,
    pub size: u64,
    pub added_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

/// 文档库统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LibraryStats {
    pub count: u64,
    pub total_size: u64,
}

/// Document Library Port
#[async_trait]
pub trait DocumentLibraryPort: Send + Sync {
    /// 添加文档；已存在时仅更新最近使用时间
    async fn add(&self, document: &Document) -> Result<DocumentFingerprint, RepositoryError>;

    /// 根据 ID 查找文档
    async fn get(&self, id: &DocumentFingerprint) -> Result<Option<DocumentRecord>, RepositoryError>;

    /// 按最近使用倒序列出
    async fn list(&self) -> Result<Vec<DocumentSummary>, RepositoryError>;

    /// 更新最近使用时间，返回是否存在
    async fn touch(&self, id: &DocumentFingerprint) -> Result<bool, RepositoryError>;

    /// 删除文档，返回是否存在
    async fn delete(&self, id: &DocumentFingerprint) -> Result<bool, RepositoryError>;

    /// 清空文档库，返回删除数量
    async fn clear(&self) -> Result<u64, RepositoryError>;

    /// 文档数量与总大小
    async fn stats(&self) -> Result<LibraryStats, RepositoryError>;
}
