//! Document and chunk repository for database operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{delete_where, select_where, QueryFilter};
use crate::domain::models::{Document, DocumentChunk, DocumentStatus};
use crate::infrastructure::database::Database;
use crate::shared::errors::{AppError, Result};

const TABLE: &str = "document";
const CHUNK_TABLE: &str = "document_chunk";

/// Document record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub uid: String,
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub checksum: String,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub uploaded_by: String,
    pub status: DocumentStatus,
    pub error: Option<String>,
    pub chunk_count: usize,
    pub is_active: bool,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_milliseconds_option")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl From<DocumentRecord> for Document {
    fn from(record: DocumentRecord) -> Self {
        Document {
            id: record.uid,
            filename: record.filename,
            original_filename: record.original_filename,
            file_path: record.file_path,
            file_size: record.file_size,
            mime_type: record.mime_type,
            checksum: record.checksum,
            category: record.category,
            title: record.title,
            description: record.description,
            uploaded_by: record.uploaded_by,
            status: record.status,
            error: record.error,
            chunk_count: record.chunk_count,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
            processed_at: record.processed_at,
        }
    }
}

/// Chunk record in database
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub uid: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub page_number: usize,
    pub start_char: usize,
    pub end_char: usize,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl ChunkRecord {
    pub fn to_chunk(&self) -> DocumentChunk {
        DocumentChunk {
            id: self.uid.clone(),
            document_id: self.document_id.clone(),
            chunk_index: self.chunk_index,
            content: self.content.clone(),
            page_number: self.page_number,
            start_char: self.start_char,
            end_char: self.end_char,
            has_embedding: !self.embedding.is_empty(),
            created_at: self.created_at,
        }
    }
}

/// Input for registering an uploaded document
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub filename: String,
    pub original_filename: String,
    pub file_path: String,
    pub file_size: u64,
    pub mime_type: Option<String>,
    pub checksum: String,
    pub category: String,
    pub title: String,
    pub description: Option<String>,
    pub uploaded_by: String,
}

/// Chunk text plus its position and embedding
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub content: String,
    pub page_number: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub embedding: Vec<f32>,
}

/// Document repository
pub struct DocumentRepository;

impl DocumentRepository {
    /// Register a document in `processing` state
    pub async fn create(db: &Database, document: NewDocument) -> Result<Document> {
        let now = Utc::now();
        let record = DocumentRecord {
            uid: uuid::Uuid::new_v4().to_string(),
            filename: document.filename,
            original_filename: document.original_filename,
            file_path: document.file_path,
            file_size: document.file_size,
            mime_type: document.mime_type,
            checksum: document.checksum,
            category: document.category,
            title: document.title,
            description: document.description,
            uploaded_by: document.uploaded_by,
            status: DocumentStatus::Processing,
            error: None,
            chunk_count: 0,
            is_active: true,
            created_at: now,
            updated_at: now,
            processed_at: None,
        };

        let created: Option<DocumentRecord> = db
            .create((TABLE, record.uid.clone()))
            .content(record)
            .await
            .map_err(|e| AppError::Database(format!("Failed to create document: {}", e)))?;

        created
            .map(Document::from)
            .ok_or_else(|| AppError::Database("Failed to create document".to_string()))
    }

    pub async fn find_by_id(db: &Database, id: &str) -> Result<Option<Document>> {
        let record: Option<DocumentRecord> = db
            .select((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to fetch document: {}", e)))?;
        Ok(record.map(Document::from))
    }

    /// Active, not failed document with the same content, if any
    pub async fn find_by_checksum(db: &Database, checksum: &str) -> Result<Option<Document>> {
        let usable = vec![
            DocumentStatus::Processing.as_str().to_string(),
            DocumentStatus::Processed.as_str().to_string(),
        ];
        let filter = QueryFilter::new()
            .eq("checksum", Some(checksum))
            .eq("is_active", Some(true))
            .one_of("status", usable);
        let records: Vec<DocumentRecord> = select_where(db, TABLE, &filter, " LIMIT 1").await?;
        Ok(records.into_iter().next().map(Document::from))
    }

    /// Active documents, newest first
    pub async fn list_active(db: &Database) -> Result<Vec<Document>> {
        let filter = QueryFilter::new().eq("is_active", Some(true));
        let records: Vec<DocumentRecord> =
            select_where(db, TABLE, &filter, " ORDER BY created_at DESC").await?;
        Ok(records.into_iter().map(Document::from).collect())
    }

    pub async fn mark_processing(db: &Database, id: &str) -> Result<Option<Document>> {
        Self::merge(db, id, json!({
            "status": DocumentStatus::Processing,
            "error": null,
            "updated_at": Utc::now().timestamp_millis(),
        }))
        .await
    }

    pub async fn mark_processed(db: &Database, id: &str, chunk_count: usize) -> Result<Option<Document>> {
        let now = Utc::now().timestamp_millis();
        Self::merge(db, id, json!({
            "status": DocumentStatus::Processed,
            "error": null,
            "chunk_count": chunk_count,
            "processed_at": now,
            "updated_at": now,
        }))
        .await
    }

    pub async fn mark_failed(db: &Database, id: &str, error: &str) -> Result<Option<Document>> {
        Self::merge(db, id, json!({
            "status": DocumentStatus::Failed,
            "error": error,
            "updated_at": Utc::now().timestamp_millis(),
        }))
        .await
    }

    async fn merge(db: &Database, id: &str, patch: serde_json::Value) -> Result<Option<Document>> {
        if Self::find_by_id(db, id).await?.is_none() {
            return Ok(None);
        }
        let updated: Option<DocumentRecord> = db
            .update((TABLE, id))
            .merge(patch)
            .await
            .map_err(|e| AppError::Database(format!("Failed to update document: {}", e)))?;
        Ok(updated.map(Document::from))
    }

    /// Delete a document record with its chunks; returns the removed document
    pub async fn delete(db: &Database, id: &str) -> Result<Option<Document>> {
        // record first, so a concurrent chunk replacement can no longer commit
        let deleted: Option<DocumentRecord> = db
            .delete((TABLE, id))
            .await
            .map_err(|e| AppError::Database(format!("Failed to delete document: {}", e)))?;
        Self::delete_chunks(db, id).await?;
        Ok(deleted.map(Document::from))
    }

    pub async fn delete_chunks(db: &Database, document_id: &str) -> Result<()> {
        let filter = QueryFilter::new().eq("document_id", Some(document_id));
        delete_where(db, CHUNK_TABLE, &filter).await
    }

    /// Replace every chunk of a document in one transaction
    ///
    /// Fails without writing when the document was deleted or deactivated
    /// in the meantime.
    pub async fn replace_chunks(db: &Database, document_id: &str, chunks: Vec<NewChunk>) -> Result<usize> {
        match Self::find_by_id(db, document_id).await? {
            Some(document) if document.is_active => {}
            _ => return Err(AppError::NotFound("Document")),
        }

        let count = chunks.len();
        let now = Utc::now();
        let mut sql = String::from(
            "BEGIN TRANSACTION;\n\
             LET $doc = type::thing($doc_table, $document_id);\n\
             IF $doc.is_active != true { THROW \"document is no longer active\" };\n\
             DELETE FROM document_chunk WHERE document_id = $document_id;\n",
        );
        for index in 0..count {
            sql.push_str(&format!(
                "CREATE type::thing($chunk_table, $uid{i}) CONTENT $chunk{i};\n",
                i = index
            ));
        }
        sql.push_str("COMMIT TRANSACTION;");

        let mut query = db
            .query(sql)
            .bind(("doc_table", TABLE))
            .bind(("chunk_table", CHUNK_TABLE))
            .bind(("document_id", document_id.to_string()));
        for (index, chunk) in chunks.into_iter().enumerate() {
            let record = ChunkRecord {
                uid: uuid::Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                chunk_index: index,
                content: chunk.content,
                page_number: chunk.page_number,
                start_char: chunk.start_char,
                end_char: chunk.end_char,
                embedding: chunk.embedding,
                created_at: now,
            };
            query = query
                .bind((format!("uid{}", index), record.uid.clone()))
                .bind((format!("chunk{}", index), record));
        }

        query
            .await
            .and_then(|response| response.check())
            .map_err(|e| AppError::Database(format!("Failed to store chunks: {}", e)))?;
        Ok(count)
    }

    /// Chunks of a document in order
    pub async fn chunks_for(db: &Database, document_id: &str) -> Result<Vec<ChunkRecord>> {
        let filter = QueryFilter::new().eq("document_id", Some(document_id));
        select_where(db, CHUNK_TABLE, &filter, " ORDER BY chunk_index ASC").await
    }

    /// Chunks of every active document, paired with their document
    pub async fn searchable_chunks(
        db: &Database,
        category: Option<&str>,
    ) -> Result<Vec<(Document, ChunkRecord)>> {
        let filter = QueryFilter::new()
            .eq("is_active", Some(true))
            .eq("category", category);
        let documents: Vec<DocumentRecord> = select_where(db, TABLE, &filter, "").await?;
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = documents.iter().map(|d| d.uid.clone()).collect();
        let chunk_filter = QueryFilter::new().one_of("document_id", ids);
        let chunks: Vec<ChunkRecord> =
            select_where(db, CHUNK_TABLE, &chunk_filter, " ORDER BY chunk_index ASC").await?;

        let by_id: std::collections::HashMap<String, Document> = documents
            .into_iter()
            .map(|d| (d.uid.clone(), Document::from(d)))
            .collect();

        Ok(chunks
            .into_iter()
            .filter_map(|chunk| by_id.get(&chunk.document_id).cloned().map(|doc| (doc, chunk)))
            .collect())
    }
}
