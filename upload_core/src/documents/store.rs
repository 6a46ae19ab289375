use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::models::{Document, DocumentListQuery};
use super::repository::DocumentRepository;
use super::validation::AcceptedFile;
use crate::error::{AppError, Result};

const DOCUMENTS_DIR: &str = "documents";

/// Persists accepted uploads: bytes to disk, metadata to the repository.
#[derive(Clone)]
pub struct DocumentStore {
    root: PathBuf,
    repository: Arc<dyn DocumentRepository>,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>, repository: Arc<dyn DocumentRepository>) -> Self {
        Self {
            root: root.into(),
            repository,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn backend(&self) -> &'static str {
        self.repository.backend()
    }

    pub async fn initialize(&self) -> Result<()> {
        async_fs::create_dir_all(self.root.join(DOCUMENTS_DIR)).await?;
        self.repository.initialize().await?;
        Ok(())
    }

    pub async fn store(&self, accepted: AcceptedFile) -> Result<Document> {
        let id = Uuid::new_v4();
        let relative = format!("{}/{}.{}", DOCUMENTS_DIR, id, accepted.extension());
        let path = self.root.join(&relative);

        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        if let Err(e) = write_file(&path, accepted.content()).await {
            remove_stale(&path).await;
            return Err(e.into());
        }

        let document = Document {
            id,
            file: relative,
            original_name: accepted.name().to_string(),
            content_type: mime_guess::from_ext(accepted.extension())
                .first_or_octet_stream()
                .to_string(),
            size: accepted.size(),
            uploaded_at: Utc::now(),
        };

        match self.repository.create(&document).await {
            Ok(stored) => {
                info!(id = %stored.id, name = %stored.original_name, size = stored.size, "document stored");
                Ok(stored)
            }
            Err(e) => {
                remove_stale(&path).await;
                Err(e)
            }
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Document>> {
        self.repository.get_by_id(id).await
    }

    pub async fn list(&self, query: &DocumentListQuery) -> Result<Vec<Document>> {
        self.repository.list(query).await
    }

    pub async fn count(&self) -> Result<u64> {
        self.repository.count().await
    }

    pub async fn read(&self, id: Uuid) -> Result<Option<(Document, Vec<u8>)>> {
        let Some(document) = self.repository.get_by_id(id).await? else {
            return Ok(None);
        };

        let path = self.root.join(&document.file);
        let data = async_fs::read(&path).await.map_err(|e| {
            error!("Failed to read document {}: {}", path.display(), e);
            AppError::InternalServerError
        })?;

        Ok(Some((document, data)))
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let document = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

        if !self.repository.delete(id).await? {
            return Err(AppError::NotFound("Document not found".to_string()));
        }

        let path = self.root.join(&document.file);
        match async_fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!(id = %id, "stored file was already gone: {}", path.display());
            }
            Err(e) => error!(id = %id, "Failed to remove {}: {}", path.display(), e),
        }
        info!(id = %id, "document deleted");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<()> {
        self.repository.health_check().await
    }
}

async fn write_file(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = async_fs::File::create(path).await?;
    file.write_all(content).await?;
    file.sync_all().await
}

/// Removes a file written for an upload that did not complete.
async fn remove_stale(path: &Path) {
    match async_fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::repository::{FaultyRepository, InMemoryDocumentRepository};
    use crate::documents::validation::{UploadValidator, UploadedFile};
    use axum::body::Bytes;
    use tempfile::TempDir;

    async fn create_test_store() -> (DocumentStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = DocumentStore::new(
            temp_dir.path(),
            Arc::new(InMemoryDocumentRepository::new()),
        );
        store.initialize().await.unwrap();
        (store, temp_dir)
    }

    fn accept(name: &str, data: &'static [u8]) -> AcceptedFile {
        UploadValidator::default()
            .validate(UploadedFile::new(name, Bytes::from_static(data)))
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_and_read_back() {
        let (store, temp_dir) = create_test_store().await;

        let document = store.store(accept("Contract.DOCX", b"PK\x03\x04 docx body")).await.unwrap();
        assert_eq!(document.original_name, "Contract.DOCX");
        assert_eq!(document.size, 14);
        assert_eq!(document.file, format!("documents/{}.docx", document.id));
        assert_eq!(
            document.content_type,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        );
        assert!(temp_dir.path().join(&document.file).exists());

        let (metadata, data) = store.read(document.id).await.unwrap().unwrap();
        assert_eq!(metadata, document);
        assert_eq!(data, b"PK\x03\x04 docx body");
    }

    #[tokio::test]
    async fn test_delete_removes_file_and_record() {
        let (store, temp_dir) = create_test_store().await;

        let document = store.store(accept("report.pdf", b"%PDF-1.7")).await.unwrap();
        let path = temp_dir.path().join(&document.file);
        assert!(path.exists());

        store.delete(document.id).await.unwrap();
        assert!(!path.exists());
        assert!(store.get(document.id).await.unwrap().is_none());

        let err = store.delete(document.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_read_missing_document() {
        let (store, _temp_dir) = create_test_store().await;
        assert!(store.read(Uuid::new_v4()).await.unwrap().is_none());
    }

    fn stored_files(temp_dir: &TempDir) -> usize {
        std::fs::read_dir(temp_dir.path().join(DOCUMENTS_DIR))
            .unwrap()
            .count()
    }

    #[tokio::test]
    async fn test_failed_insert_leaves_no_file() {
        let temp_dir = TempDir::new().unwrap();
        let repository = FaultyRepository {
            fail_create: true,
            ..Default::default()
        };
        let store = DocumentStore::new(temp_dir.path(), Arc::new(repository));
        store.initialize().await.unwrap();

        let err = store.store(accept("report.pdf", b"%PDF-1.7")).await.unwrap_err();
        assert!(matches!(err, AppError::Database(_)));
        assert_eq!(stored_files(&temp_dir), 0);
    }

    #[tokio::test]
    async fn test_failed_record_delete_keeps_file() {
        let temp_dir = TempDir::new().unwrap();
        let inner = InMemoryDocumentRepository::new();
        let healthy = DocumentStore::new(temp_dir.path(), Arc::new(inner.clone()));
        healthy.initialize().await.unwrap();
        let document = healthy.store(accept("report.pdf", b"%PDF-1.7")).await.unwrap();

        let repository = FaultyRepository {
            inner,
            fail_delete: true,
            ..Default::default()
        };
        let store = DocumentStore::new(temp_dir.path(), Arc::new(repository));

        assert!(store.delete(document.id).await.is_err());
        let (_, data) = store.read(document.id).await.unwrap().unwrap();
        assert_eq!(data, b"%PDF-1.7");
    }

    #[tokio::test]
    async fn test_delete_with_missing_file_removes_record() {
        let (store, temp_dir) = create_test_store().await;

        let document = store.store(accept("report.pdf", b"%PDF-1.7")).await.unwrap();
        std::fs::remove_file(temp_dir.path().join(&document.file)).unwrap();

        store.delete(document.id).await.unwrap();
        assert!(store.get(document.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_stale_ignores_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("partial.pdf");
        std::fs::write(&path, b"%PDF").unwrap();

        remove_stale(&path).await;
        assert!(!path.exists());
        remove_stale(&path).await;
    }
}
