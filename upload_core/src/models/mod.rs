pub mod request;

pub use request::{DocumentListResponse, UploadResponse};
