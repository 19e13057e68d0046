//! Library Commands - 文档库写操作

use crate::domain::document::DocumentFingerprint;

/// 添加文档命令（已存在时仅更新最近使用时间）
#[derive(Debug, Clone)]
pub struct AddDocument {
    pub name: String,
    pub content: Vec<u8>,
}

/// 标记文档为最近使用
#[derive(Debug, Clone)]
pub struct TouchDocument {
    pub id: DocumentFingerprint,
}

/// 删除文档命令（同时清理其音频缓存）
#[derive(Debug, Clone)]
pub struct RemoveDocument {
    pub id: DocumentFingerprint,
}

/// 清空文档库
#[derive(Debug, Clone)]
pub struct ClearLibrary;
