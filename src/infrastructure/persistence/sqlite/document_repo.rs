//! SQLite Document Library
//!
//! 时间以 Unix 毫秒整数存储，保证按最近使用排序稳定

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use std::sync::Arc;

use super::DbPool;
use crate::application::ports::{
    Clock, DocumentLibraryPort, DocumentRecord, DocumentSummary, LibraryStats, RepositoryError,
};
use crate::domain::document::{Document, DocumentFingerprint};

/// SQLite Document Library
pub struct SqliteDocumentLibrary {
    pool: DbPool,
    clock: Arc<dyn Clock>,
}

impl SqliteDocumentLibrary {
    pub fn new(pool: DbPool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }
}

fn db_err(e: sqlx::Error) -> RepositoryError {
    RepositoryError::DatabaseError(e.to_string())
}

fn from_millis(millis: i64) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| RepositoryError::SerializationError(format!("invalid timestamp: {}", millis)))
}

#[derive(FromRow)]
struct DocumentRow {
    id: String,
    name: String,
    size: i64,
    content: Vec<u8>,
    added_at: i64,
    last_used: i64,
}

impl TryFrom<DocumentRow> for DocumentRecord {
    type Error = RepositoryError;

    fn try_from(row: DocumentRow) -> Result<Self, Self::Error> {
        Ok(DocumentRecord {
            id: DocumentFingerprint::from_string(row.id),
            name: row.name,
            size: row.size as u64,
            content: row.content,
            added_at: from_millis(row.added_at)?,
            last_used: from_millis(row.last_used)?,
        })
    }
}

#[derive(FromRow)]
struct SummaryRow {
    id: String,
    name: String,
    size: i64,
    added_at: i64,
    last_used: i64,
}

impl TryFrom<SummaryRow> for DocumentSummary {
    type Error = RepositoryError;

    fn try_from(row: SummaryRow) -> Result<Self, Self::Error> {
        Ok(DocumentSummary {
            id: DocumentFingerprint::from_string(row.id),
            name: row.name,
            size: row.size as u64,
            added_at: from_millis(row.added_at)?,
            last_used: from_millis(row.last_used)?,
        })
    }
}

#[async_trait]
impl DocumentLibraryPort for SqliteDocumentLibrary {
    async fn add(&self, document: &Document) -> Result<DocumentFingerprint, RepositoryError> {
        let now = self.clock.now_millis();
        let id = document.fingerprint().clone();

        // 已存在时只更新 last_used
        sqlx::query(
            r#"
            INSERT INTO documents (id, name, size, content, added_at, last_used)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                last_used = excluded.last_used
            "#,
        )
        .bind(id.as_str())
        .bind(document.name())
        .bind(document.size() as i64)
        .bind(document.content())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        tracing::debug!(id = %id, "Document stored");
        Ok(id)
    }

    async fn get(&self, id: &DocumentFingerprint) -> Result<Option<DocumentRecord>, RepositoryError> {
        let row: Option<DocumentRow> = sqlx::query_as(
            "SELECT id, name, size, content, added_at, last_used FROM documents WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(DocumentRecord::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<DocumentSummary>, RepositoryError> {
        let rows: Vec<SummaryRow> = sqlx::query_as(
            "SELECT id, name, size, added_at, last_used FROM documents ORDER BY last_used DESC, added_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(DocumentSummary::try_from).collect()
    }

    async fn touch(&self, id: &DocumentFingerprint) -> Result<bool, RepositoryError> {
        let result = sqlx::query("UPDATE documents SET last_used = ? WHERE id = ?")
            .bind(self.clock.now_millis())
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete(&self, id: &DocumentFingerprint) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> Result<u64, RepositoryError> {
        let result = sqlx::query("DELETE FROM documents")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected())
    }

    async fn stats(&self) -> Result<LibraryStats, RepositoryError> {
        let (count, total_size): (i64, i64) =
            sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(size), 0) FROM documents")
                .fetch_one(&self.pool)
                .await
                .map_err(db_err)?;

        Ok(LibraryStats {
            count: count as u64,
            total_size: total_size as u64,
        })
    }
}
