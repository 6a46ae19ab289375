pub mod models;
pub mod repository;
pub mod store;
pub mod validation;

pub use models::{Document, DocumentListQuery};
pub use repository::{DocumentRepository, InMemoryDocumentRepository, SqliteDocumentRepository};
pub use store::DocumentStore;
pub use validation::{AcceptedFile, UploadPolicy, UploadValidator, UploadedFile, ValidationError};
