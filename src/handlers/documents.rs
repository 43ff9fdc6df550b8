//! Knowledge base handlers: upload, listing, search

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use super::state::AppState;
use crate::domain::models::Document;
use crate::domain::services::documents::{DocumentDetail, UploadMeta};
use crate::shared::errors::{AppError, Result};

const DEFAULT_SEARCH_LIMIT: usize = 5;
const MAX_SEARCH_LIMIT: usize = 50;

fn multipart_error(e: axum::extract::multipart::MultipartError) -> AppError {
    tracing::warn!("Failed to read multipart field: {}", e);
    AppError::Validation(format!("Invalid multipart request: {}", e))
}

/// POST /api/documents/upload
/// Store the file now, index it in a background task
pub async fn upload_document_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse> {
    let mut file: Option<(String, Option<String>, Vec<u8>)> = None;
    let mut meta = UploadMeta::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, content_type, bytes.to_vec()));
            }
            "category" | "title" | "description" | "uploaded_by" => {
                let value = Some(field.text().await.map_err(multipart_error)?);
                match name.as_str() {
                    "category" => meta.category = value,
                    "title" => meta.title = value,
                    "description" => meta.description = value,
                    _ => meta.uploaded_by = value,
                }
            }
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    let (filename, content_type, bytes) =
        file.ok_or_else(|| AppError::Validation("No file part".to_string()))?;
    meta.original_filename = filename;
    meta.mime_type = content_type;

    let outcome = state.documents.upload(&bytes, meta).await?;
    let document_id = outcome.document.id.clone();

    if outcome.duplicate {
        return Ok((
            StatusCode::OK,
            Json(json!({
                "message": "Document already uploaded",
                "document_id": document_id,
                "duplicate": true,
            })),
        ));
    }

    let documents = state.documents.clone();
    let id = document_id.clone();
    tokio::spawn(async move {
        if let Err(e) = documents.process(&id).await {
            tracing::error!(document_id = %id, error = %e, "Background document processing failed");
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "message": "Document uploaded and is being processed",
            "document_id": document_id,
        })),
    ))
}

/// GET /api/documents
pub async fn list_documents_handler(State(state): State<AppState>) -> Result<Json<Vec<Document>>> {
    Ok(Json(state.documents.list().await?))
}

/// GET /api/documents/{id}
pub async fn get_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DocumentDetail>> {
    Ok(Json(state.documents.detail(&id).await?))
}

/// DELETE /api/documents/{id}
pub async fn delete_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    state.documents.delete(&id).await?;
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}

/// POST /api/documents/{id}/reprocess
pub async fn reprocess_document_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let document = state.documents.process(&id).await?;
    Ok(Json(json!({ "success": true, "document": document })))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    pub category: Option<String>,
    pub limit: Option<usize>,
}

/// GET /api/documents/search
pub async fn search_documents_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(AppError::Validation("Query parameter 'q' is required".to_string()));
    }
    let category = params.category.as_deref().map(str::trim).filter(|c| !c.is_empty());
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT).clamp(1, MAX_SEARCH_LIMIT);

    let results = state.documents.search(query, category, limit).await?;
    Ok(Json(json!({
        "total": results.len(),
        "results": results,
        "query": query,
    })))
}
