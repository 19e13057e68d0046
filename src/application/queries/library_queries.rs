//! Library Queries - 文档库读操作

use crate::domain::document::DocumentFingerprint;

/// 获取文档（含内容）
#[derive(Debug, Clone)]
pub struct GetDocument {
    pub id: DocumentFingerprint,
}

/// 按最近使用列出文档
#[derive(Debug, Clone)]
pub struct ListDocuments;

/// 文档库统计
#[derive(Debug, Clone)]
pub struct GetLibraryStats;
