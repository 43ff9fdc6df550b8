use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// File extensions accepted for the knowledge base
pub const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "txt", "md", "doc", "docx"];

/// Maximum accepted upload size (20MB)
pub const MAX_DOCUMENT_SIZE: usize = 20 * 1024 * 1024;

str_enum! {
    /// Indexing state of an uploaded document
    DocumentStatus {
        Processing => "processing",
        Processed => "processed",
        Failed => "failed",
    }
}

/// Hotel document (policy, menu, brochure) used to ground answers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
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
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Indexed slice of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub document_id: String,
    pub chunk_index: usize,
    pub content: String,
    pub page_number: usize,
    pub start_char: usize,
    pub end_char: usize,
    pub has_embedding: bool,
    pub created_at: DateTime<Utc>,
}

/// Knowledge-base search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: String,
    pub document_title: String,
    pub category: String,
    pub chunk_index: usize,
    pub page_number: usize,
    pub content: String,
    pub similarity_score: f64,
}
