use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{Document, DocumentListQuery};
use crate::error::{AppError, Result};

const DEFAULT_LIMIT: u64 = 50;

/// Persistence for document records. The bytes themselves live on disk and
/// are handled by [`super::DocumentStore`].
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn create(&self, document: &Document) -> Result<Document>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>>;
    /// Newest first.
    async fn list(&self, query: &DocumentListQuery) -> Result<Vec<Document>>;
    async fn count(&self) -> Result<u64>;
    /// Returns `false` when no record had that id.
    async fn delete(&self, id: Uuid) -> Result<bool>;
    async fn health_check(&self) -> Result<()>;
    fn backend(&self) -> &'static str;
}

#[derive(Clone)]
pub struct SqliteDocumentRepository {
    pool: SqlitePool,
}

impl SqliteDocumentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn from_row(row: &SqliteRow) -> Result<Document> {
        Ok(Document {
            id: Uuid::parse_str(&row.get::<String, _>("id"))
                .map_err(|e| AppError::Database(format!("Invalid UUID: {}", e)))?,
            file: row.get("file"),
            original_name: row.get("original_name"),
            content_type: row.get("content_type"),
            size: row.get::<i64, _>("size") as u64,
            uploaded_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("uploaded_at"))
                .map_err(|e| AppError::Database(format!("Invalid datetime: {}", e)))?
                .with_timezone(&Utc),
        })
    }
}

fn encode_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[async_trait]
impl DocumentRepository for SqliteDocumentRepository {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                file TEXT NOT NULL,
                original_name TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                uploaded_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_uploaded_at ON documents (uploaded_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn create(&self, document: &Document) -> Result<Document> {
        sqlx::query(
            r#"
            INSERT INTO documents (id, file, original_name, content_type, size, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(document.id.to_string())
        .bind(&document.file)
        .bind(&document.original_name)
        .bind(&document.content_type)
        .bind(document.size as i64)
        .bind(encode_timestamp(&document.uploaded_at))
        .execute(&self.pool)
        .await?;

        Ok(document.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        let row = sqlx::query(
            "SELECT id, file, original_name, content_type, size, uploaded_at FROM documents WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::from_row).transpose()
    }

    async fn list(&self, query: &DocumentListQuery) -> Result<Vec<Document>> {
        let rows = sqlx::query(
            r#"
            SELECT id, file, original_name, content_type, size, uploaded_at
            FROM documents
            ORDER BY uploaded_at DESC, rowid DESC
            LIMIT ?1 OFFSET ?2
            "#,
        )
        .bind(query.limit.unwrap_or(DEFAULT_LIMIT) as i64)
        .bind(query.offset.unwrap_or(0) as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::from_row).collect()
    }

    async fn count(&self) -> Result<u64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get::<i64, _>("count") as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let rows_affected = sqlx::query("DELETE FROM documents WHERE id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(rows_affected > 0)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "sqlite"
    }
}

/// Fallback used when no database is reachable. Records are lost on restart.
#[derive(Clone, Default)]
pub struct InMemoryDocumentRepository {
    documents: Arc<RwLock<Vec<Document>>>,
}

impl InMemoryDocumentRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentRepository for InMemoryDocumentRepository {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn create(&self, document: &Document) -> Result<Document> {
        let mut documents = self.documents.write();
        if documents.iter().any(|d| d.id == document.id) {
            return Err(AppError::BadRequest("Document already exists".to_string()));
        }
        documents.push(document.clone());
        Ok(document.clone())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        Ok(self.documents.read().iter().find(|d| d.id == id).cloned())
    }

    async fn list(&self, query: &DocumentListQuery) -> Result<Vec<Document>> {
        let documents = self.documents.read();
        let mut newest_first: Vec<Document> = documents.iter().rev().cloned().collect();
        newest_first.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));

        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.unwrap_or(DEFAULT_LIMIT) as usize;
        Ok(newest_first.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.documents.read().len() as u64)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut documents = self.documents.write();
        let before = documents.len();
        documents.retain(|d| d.id != id);
        Ok(documents.len() < before)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

/// In-memory repository whose operations can be made to fail.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct FaultyRepository {
    pub inner: InMemoryDocumentRepository,
    pub fail_create: bool,
    pub fail_delete: bool,
    pub fail_count: bool,
}

#[cfg(test)]
#[async_trait]
impl DocumentRepository for FaultyRepository {
    async fn initialize(&self) -> Result<()> {
        self.inner.initialize().await
    }

    async fn create(&self, document: &Document) -> Result<Document> {
        if self.fail_create {
            return Err(AppError::Database("insert failed".to_string()));
        }
        self.inner.create(document).await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Document>> {
        self.inner.get_by_id(id).await
    }

    async fn list(&self, query: &DocumentListQuery) -> Result<Vec<Document>> {
        self.inner.list(query).await
    }

    async fn count(&self) -> Result<u64> {
        if self.fail_count {
            return Err(AppError::Database("count failed".to_string()));
        }
        self.inner.count().await
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        if self.fail_delete {
            return Err(AppError::Database("delete failed".to_string()));
        }
        self.inner.delete(id).await
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "faulty"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn document(name: &str, uploaded_at: DateTime<Utc>) -> Document {
        let id = Uuid::new_v4();
        Document {
            id,
            file: format!("documents/{}.pdf", id),
            original_name: name.to_string(),
            content_type: "application/pdf".to_string(),
            size: 42,
            uploaded_at,
        }
    }

    async fn exercise_repository(repo: &dyn DocumentRepository) {
        repo.initialize().await.unwrap();

        let now = Utc::now();
        let older = document("older.pdf", now - Duration::seconds(10));
        let newer = document("newer.pdf", now);

        repo.create(&older).await.unwrap();
        repo.create(&newer).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);

        let fetched = repo.get_by_id(older.id).await.unwrap().unwrap();
        assert_eq!(fetched.original_name, "older.pdf");
        assert_eq!(fetched.size, 42);

        let listed = repo.list(&DocumentListQuery::default()).await.unwrap();
        let names: Vec<&str> = listed.iter().map(|d| d.original_name.as_str()).collect();
        assert_eq!(names, ["newer.pdf", "older.pdf"]);

        let page = repo
            .list(&DocumentListQuery {
                limit: Some(1),
                offset: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].id, older.id);

        assert!(repo.delete(older.id).await.unwrap());
        assert!(!repo.delete(older.id).await.unwrap());
        assert!(repo.get_by_id(older.id).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 1);

        repo.health_check().await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_repository() {
        let repo = InMemoryDocumentRepository::new();
        exercise_repository(&repo).await;
        assert_eq!(repo.backend(), "memory");
    }

    #[tokio::test]
    async fn test_sqlite_repository() {
        let temp_file = NamedTempFile::new().unwrap();
        let database_url = format!("sqlite:{}", temp_file.path().display());
        let pool = SqlitePool::connect(&database_url).await.unwrap();
        let repo = SqliteDocumentRepository::new(pool);
        exercise_repository(&repo).await;
        assert_eq!(repo.backend(), "sqlite");
    }
}
