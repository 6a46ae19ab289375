//! Request and response models

use serde::{Deserialize, Serialize};

use crate::documents::Document;

pub const UPLOAD_SUCCESS_MESSAGE: &str = "File uploaded successfully.";

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    pub message: String,
    pub document: Document,
}

impl UploadResponse {
    pub fn created(document: Document) -> Self {
        Self {
            success: true,
            message: UPLOAD_SUCCESS_MESSAGE.to_string(),
            document,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
    pub total: u64,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}
