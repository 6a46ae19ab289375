use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::{PathRejection, QueryRejection},
        Multipart, Path, Query, State,
    },
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    documents::{Document, DocumentListQuery, UploadedFile},
    error::{AppError, Result},
    models::{DocumentListResponse, UploadResponse},
    AppState,
};

pub const FILE_FIELD: &str = "file";

const NO_FILE_MESSAGE: &str = "No file was submitted.";
const NOT_A_FILE_MESSAGE: &str = "The submitted data was not a file. Check the encoding type on the form.";

fn document_id(path: std::result::Result<Path<Uuid>, PathRejection>) -> Result<Uuid> {
    path.map(|Path(id)| id)
        .map_err(|rejection| AppError::BadRequest(rejection.body_text()))
}

/// Reads the first `file` part of the form. Other parts are ignored.
async fn read_file_field(multipart: &mut Multipart) -> Result<UploadedFile> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::PayloadTooLarge(e.body_text())
        } else {
            AppError::field(FILE_FIELD, e.body_text())
        }
    })? {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let name = field
            .file_name()
            .ok_or_else(|| AppError::field(FILE_FIELD, NOT_A_FILE_MESSAGE))?
            .to_string();

        let content = field.bytes().await.map_err(|e| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                AppError::PayloadTooLarge(e.body_text())
            } else {
                AppError::field(FILE_FIELD, format!("Failed to read file data: {}", e.body_text()))
            }
        })?;

        return Ok(UploadedFile::new(name, content));
    }

    Err(AppError::field(FILE_FIELD, NO_FILE_MESSAGE))
}

pub async fn upload_document(
    State(state): State<AppState>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let mut multipart =
        multipart.map_err(|rejection| AppError::field(FILE_FIELD, rejection.body_text()))?;

    let upload = read_file_field(&mut multipart).await?;
    let (name, size) = (upload.name.clone(), upload.size);

    let accepted = state.validator.validate(upload).map_err(|e| {
        warn!(name = %name, size, reason = %e, "upload rejected");
        e
    })?;

    let document = state.documents.store(accepted).await?;
    info!(id = %document.id, name = %document.original_name, "upload accepted");

    Ok((StatusCode::CREATED, Json(UploadResponse::created(document))))
}

pub async fn list_documents(
    State(state): State<AppState>,
    query: std::result::Result<Query<DocumentListQuery>, QueryRejection>,
) -> Result<Json<DocumentListResponse>> {
    let Query(query) = query.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
    let documents = state.documents.list(&query).await?;
    let total = state.documents.count().await?;

    Ok(Json(DocumentListResponse {
        documents,
        total,
        limit: query.limit,
        offset: query.offset,
    }))
}

pub async fn get_document(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Document>> {
    let id = document_id(path)?;
    let document = state
        .documents
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

    Ok(Json(document))
}

/// Header-safe variant of a client supplied name: non-ASCII, control
/// characters and quotes become `_`.
fn attachment_name(original: &str) -> String {
    original
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect()
}

pub async fn download_document(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<Response> {
    let id = document_id(path)?;
    let (document, data) = state
        .documents
        .read(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Document not found".to_string()))?;

    let mut headers = HeaderMap::new();

    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&document.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(data.len()));

    let disposition = format!("attachment; filename=\"{}\"", attachment_name(&document.original_name));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition).unwrap_or_else(|_| HeaderValue::from_static("attachment")),
    );

    Ok((StatusCode::OK, headers, data).into_response())
}

pub async fn delete_document(
    State(state): State<AppState>,
    path: std::result::Result<Path<Uuid>, PathRejection>,
) -> Result<StatusCode> {
    let id = document_id(path)?;
    state.documents.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
