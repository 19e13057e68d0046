//! Library Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{DocumentLibraryPort, DocumentRecord, DocumentSummary, LibraryStats};
use crate::application::queries::{GetDocument, GetLibraryStats, ListDocuments};

// ============================================================================
// Response DTOs
// ============================================================================

/// 文档列表项
#[derive(Debug, Clone)]
pub struct DocumentResponse {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub added_at: String,
    pub last_used: String,
}

impl From<DocumentSummary> for DocumentResponse {
    fn from(summary: DocumentSummary) -> Self {
        Self {
            id: summary.id.to_string(),
            name: summary.name,
            size: summary.size,
            added_at: summary.added_at.to_rfc3339(),
            last_used: summary.last_used.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GetDocument Handler
pub struct GetDocumentHandler {
    library: Arc<dyn DocumentLibraryPort>,
}

impl GetDocumentHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>) -> Self {
        Self { library }
    }

    pub async fn handle(&self, query: GetDocument) -> Result<DocumentRecord, ApplicationError> {
        self.library
            .get(&query.id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Document", query.id.as_str()))
    }
}

/// ListDocuments Handler
pub struct ListDocumentsHandler {
    library: Arc<dyn DocumentLibraryPort>,
}

impl ListDocumentsHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>) -> Self {
        Self { library }
    }

    pub async fn handle(&self, _query: ListDocuments) -> Result<Vec<DocumentResponse>, ApplicationError> {
        let documents = self.library.list().await?;
        Ok(documents.into_iter().map(DocumentResponse::from).collect())
    }
}

/// GetLibraryStats Handler
pub struct GetLibraryStatsHandler {
    library: Arc<dyn DocumentLibraryPort>,
}

impl GetLibraryStatsHandler {
    pub fn new(library: Arc<dyn DocumentLibraryPort>) -> Self {
        Self { library }
    }

    pub async fn handle(&self, _query: GetLibraryStats) -> Result<LibraryStats, ApplicationError> {
        Ok(self.library.stats().await?)
    }
}
