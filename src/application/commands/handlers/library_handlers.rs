//! Library Command Handlers

use std::sync::Arc;

use crate::application::commands::{AddDocument, ClearLibrary, RemoveDocument, TouchDocument};
use crate::application::error::ApplicationError;
use crate::application::ports::DocumentLibraryPort;
use crate::application::services::TtsCache;
use crate::domain::document::{Document, DocumentFingerprint};

/// 添加文档响应
#[derive(Debug, Clone)]
pub struct AddDocumentResponse {
    pub id: DocumentFingerprint,
    pub name: String,
    pub page_count: usize,
}

/// AddDocument Handler
pub struct AddDocumentHandler {
    library: Arc<dyn DocumentLibraryPort>,
}

impl AddDocumentHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>) -> Self {
        Self { library }
    }

    pub async fn handle(&self, command: AddDocument) -> Result<AddDocumentResponse, ApplicationError> {
        if command.name.trim().is_empty() {
            return Err(ApplicationError::validation("Document name cannot be empty"));
        }

        let document = Document::new(command.name, command.content);
        let id = self.library.add(&document).await?;

        tracing::info!(
            id = %id,
            name = %document.name(),
            size = document.size(),
            "Document added to library"
        );

        Ok(AddDocumentResponse {
            id,
            name: document.name().to_string(),
            page_count: document.page_count(),
        })
    }
}

/// TouchDocument Handler
pub struct TouchDocumentHandler {
    library: Arc<dyn DocumentLibraryPort>,
}

impl TouchDocumentHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>) -> Self {
        Self { library }
    }

    pub async fn handle(&self, command: TouchDocument) -> Result<(), ApplicationError> {
        if !self.library.touch(&command.id).await? {
            return Err(ApplicationError::not_found("Document", command.id.as_str()));
        }
        Ok(())
    }
}

/// RemoveDocument Handler - 删除文档及其音频缓存
pub struct RemoveDocumentHandler {
    library: Arc<dyn DocumentLibraryPort>,
    cache: TtsCache,
}

impl RemoveDocumentHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>, cache: TtsCache) -> Self {
        Self { library, cache }
    }

    /// 返回被删除的缓存条目数
    pub async fn handle(&self, command: RemoveDocument) -> Result<usize, ApplicationError> {
        if !self.library.delete(&command.id).await? {
            return Err(ApplicationError::not_found("Document", command.id.as_str()));
        }
        let evicted = self.cache.evict_document(&command.id).await;

        tracing::info!(id = %command.id, evicted, "Document removed from library");
        Ok(evicted)
    }
}

/// ClearLibrary Handler
pub struct ClearLibraryHandler {
    library: Arc<dyn DocumentLibraryPort>,
}

impl ClearLibraryHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>) -> Self {
        Self { library }
    }

    /// 返回删除的文档数
    pub async fn handle(&self, _command: ClearLibrary) -> Result<u64, ApplicationError> {
        let removed = self.library.clear().await?;
        tracing::info!(removed, "Library cleared");
        Ok(removed)
    }
}
