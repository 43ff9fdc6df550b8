//! Hotel knowledge base: document upload, indexing and search

use pulldown_cmark::{Event, Parser, TagEnd};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::domain::models::document::MAX_DOCUMENT_SIZE;
use crate::domain::models::{Document, DocumentChunk, EventType, SearchHit, ALLOWED_EXTENSIONS};
use crate::infrastructure::database::repositories::{ChunkRecord, NewChunk, NewDocument};
use crate::infrastructure::database::{AnalyticsRepository, Database, DocumentRepository};
use crate::shared::errors::{AppError, Result};
use crate::shared::logging;

/// Maximum characters per chunk
pub const CHUNK_SIZE: usize = 1000;
/// Words repeated at the start of the next chunk
pub const CHUNK_OVERLAP_WORDS: usize = 20;
/// Embedding vector length
pub const EMBEDDING_DIM: usize = 384;
/// Score given to substring matches when no chunk is similar
pub const TEXT_MATCH_SCORE: f64 = 0.5;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "at", "be", "by", "can", "do", "for", "from", "i", "in", "is", "it",
    "me", "my", "of", "on", "or", "the", "to", "we", "what", "when", "where", "with", "you",
    "your",
];

pub fn allowed_file(filename: &str) -> bool {
    extension(filename)
        .map(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension(filename: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if stem.is_empty() && ext.is_empty() {
        return None;
    }
    Some(ext.to_lowercase())
}

/// Keep only the final path component and safe characters
pub fn secure_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '_').to_string()
}

pub fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A slice of document text with its position
#[derive(Debug, Clone, PartialEq)]
pub struct TextChunk {
    pub content: String,
    pub page_number: usize,
    pub start_char: usize,
    pub end_char: usize,
}

struct Word {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    char_end: usize,
}

/// Split words out of `text` with byte and char offsets; words longer than
/// `CHUNK_SIZE` characters are cut into pieces
fn words(text: &str) -> Vec<Word> {
    let mut out = Vec::new();
    let mut current: Option<Word> = None;

    for (char_idx, (byte_idx, c)) in text.char_indices().enumerate() {
        if c.is_whitespace() {
            if let Some(word) = current.take() {
                out.push(word);
            }
            continue;
        }

        let end = byte_idx + c.len_utf8();
        match current.as_mut() {
            Some(word) if word.char_end - word.char_start < CHUNK_SIZE => {
                word.byte_end = end;
                word.char_end = char_idx + 1;
            }
            _ => {
                if let Some(word) = current.take() {
                    out.push(word);
                }
                current = Some(Word {
                    byte_start: byte_idx,
                    byte_end: end,
                    char_start: char_idx,
                    char_end: char_idx + 1,
                });
            }
        }
    }
    if let Some(word) = current {
        out.push(word);
    }
    out
}

/// Chunk pages of text
///
/// Pages are joined with a blank line; offsets are character positions in
/// that joined text and each chunk is attributed to the page it starts on.
pub fn chunk_pages(pages: &[String]) -> Vec<TextChunk> {
    let mut text = String::new();
    let mut page_starts = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push_str("\n\n");
        }
        page_starts.push(text.chars().count());
        text.push_str(page);
    }

    let words = words(&text);
    let mut chunks = Vec::new();
    let mut first = 0;

    while first < words.len() {
        let start = &words[first];
        let mut last = first;
        while last + 1 < words.len() && words[last + 1].char_end - start.char_start <= CHUNK_SIZE {
            last += 1;
        }
        let end = &words[last];

        let page_number = page_starts
            .iter()
            .rposition(|&page_start| page_start <= start.char_start)
            .map(|idx| idx + 1)
            .unwrap_or(1);

        chunks.push(TextChunk {
            content: text[start.byte_start..end.byte_end].to_string(),
            page_number,
            start_char: start.char_start,
            end_char: end.char_end,
        });

        if last + 1 >= words.len() {
            break;
        }
        first = (last + 1).saturating_sub(CHUNK_OVERLAP_WORDS).max(first + 1);
    }

    chunks
}

/// Single-page convenience wrapper
pub fn chunk_text(text: &str) -> Vec<TextChunk> {
    chunk_pages(&[text.to_string()])
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
        .filter(|t| !STOPWORDS.contains(&t.as_str()))
}

/// 64-bit FNV-1a; stable across builds so stored vectors stay comparable
fn fnv1a(token: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Hashed bag-of-words vector, L2-normalised; empty when the text has no terms
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0f32; EMBEDDING_DIM];
    let mut any = false;
    for token in tokens(text) {
        let hash = fnv1a(&token);
        let slot = (hash % EMBEDDING_DIM as u64) as usize;
        let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
        vector[slot] += sign;
        any = true;
    }
    if !any {
        return Vec::new();
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return Vec::new();
    }
    vector.iter_mut().for_each(|v| *v /= norm);
    vector
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    f64::from(dot / (norm_a * norm_b))
}

/// Plain text of a markdown document
pub fn markdown_to_text(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Text(text) | Event::Code(text) => out.push_str(&text),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::End(TagEnd::Paragraph | TagEnd::Heading(_) | TagEnd::Item | TagEnd::CodeBlock) => {
                out.push_str("\n\n")
            }
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Extract pages of text from a stored file
pub fn extract_pages(path: &Path, extension: &str) -> Result<Vec<String>> {
    match extension {
        "pdf" => Err(AppError::Validation(
            "PDF text extraction is not supported; upload a txt, md, doc or docx export".to_string(),
        )),
        "txt" | "md" | "doc" | "docx" => {
            let bytes = std::fs::read(path)?;
            let text = String::from_utf8(bytes).map_err(|_| {
                AppError::Validation(format!("{} file is not valid UTF-8 text", extension))
            })?;
            let text = if extension == "md" { markdown_to_text(&text) } else { text };
            // form feeds separate pages in plain-text exports
            Ok(text.split('\x0c').map(str::to_string).collect())
        }
        other => Err(AppError::Validation(format!("Unsupported file type: {}", other))),
    }
}

/// Caller-supplied details for an upload
#[derive(Debug, Clone, Default)]
pub struct UploadMeta {
    pub original_filename: String,
    pub mime_type: Option<String>,
    pub category: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub uploaded_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub document: Document,
    /// An active document with identical content already existed
    pub duplicate: bool,
}

/// Document with its chunks for the detail view
#[derive(Debug, Clone, serde::Serialize)]
pub struct DocumentDetail {
    #[serde(flatten)]
    pub document: Document,
    pub chunks: Vec<DocumentChunk>,
}

/// Knowledge base operations
#[derive(Clone)]
pub struct DocumentService {
    db: Database,
    upload_dir: PathBuf,
}

impl DocumentService {
    pub fn new(db: Database, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            db,
            upload_dir: upload_dir.into(),
        }
    }

    /// Store the file and register it in `processing` state
    pub async fn upload(&self, bytes: &[u8], meta: UploadMeta) -> Result<UploadOutcome> {
        let original = secure_filename(&meta.original_filename);
        if original.is_empty() {
            return Err(AppError::Validation("No file selected".to_string()));
        }
        if !allowed_file(&original) {
            return Err(AppError::Validation(format!(
                "Invalid file type. Allowed: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }
        if bytes.is_empty() {
            return Err(AppError::Validation("Uploaded file is empty".to_string()));
        }
        if bytes.len() > MAX_DOCUMENT_SIZE {
            return Err(AppError::Validation("File exceeds the 20MB limit".to_string()));
        }

        let checksum = checksum(bytes);
        if let Some(existing) = DocumentRepository::find_by_checksum(&self.db, &checksum).await? {
            tracing::info!(document_id = %existing.id, "Upload matches an existing document");
            return Ok(UploadOutcome {
                document: existing,
                duplicate: true,
            });
        }

        let ext = extension(&original).unwrap_or_default();
        let filename = format!("{}.{}", uuid::Uuid::new_v4(), ext);
        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(&filename);
        tokio::fs::write(&path, bytes).await?;

        let non_empty = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let document = DocumentRepository::create(
            &self.db,
            NewDocument {
                filename,
                original_filename: original.clone(),
                file_path: path.to_string_lossy().into_owned(),
                file_size: bytes.len() as u64,
                mime_type: meta.mime_type,
                checksum,
                category: non_empty(meta.category).unwrap_or_else(|| "policy".to_string()),
                title: non_empty(meta.title).unwrap_or(original),
                description: non_empty(meta.description),
                uploaded_by: non_empty(meta.uploaded_by).unwrap_or_else(|| "admin".to_string()),
            },
        )
        .await?;

        tracing::info!(document_id = %document.id, file = %document.filename, "Document uploaded");
        Ok(UploadOutcome {
            document,
            duplicate: false,
        })
    }

    /// Extract, chunk and embed a document, recording the outcome on it
    pub async fn process(&self, document_id: &str) -> Result<Document> {
        let document = DocumentRepository::find_by_id(&self.db, document_id)
            .await?
            .ok_or(AppError::NotFound("Document"))?;
        DocumentRepository::mark_processing(&self.db, document_id).await?;

        match self.index(&document).await {
            Ok(count) => {
                logging::log_document_processed(document_id, count);
                let processed = DocumentRepository::mark_processed(&self.db, document_id, count)
                    .await?
                    .ok_or(AppError::NotFound("Document"))?;
                AnalyticsRepository::record(
                    &self.db,
                    EventType::DocumentProcessed,
                    None,
                    count as f64,
                    json!({ "document_id": processed.id, "category": processed.category }),
                )
                .await?;
                Ok(processed)
            }
            Err(e) => {
                let message = e.to_string();
                logging::log_document_failed(document_id, &message);
                DocumentRepository::delete_chunks(&self.db, document_id).await?;
                DocumentRepository::mark_failed(&self.db, document_id, &message)
                    .await?
                    .ok_or(AppError::NotFound("Document"))
            }
        }
    }

    async fn index(&self, document: &Document) -> Result<usize> {
        let ext = extension(&document.original_filename).unwrap_or_default();
        let path = PathBuf::from(&document.file_path);
        let pages = tokio::task::spawn_blocking(move || extract_pages(&path, &ext))
            .await
            .map_err(|e| AppError::Storage(format!("Text extraction task failed: {}", e)))??;

        let chunks: Vec<NewChunk> = chunk_pages(&pages)
            .into_iter()
            .map(|chunk| NewChunk {
                embedding: embed(&chunk.content),
                content: chunk.content,
                page_number: chunk.page_number,
                start_char: chunk.start_char,
                end_char: chunk.end_char,
            })
            .collect();

        if chunks.is_empty() {
            return Err(AppError::Validation("Document contains no text".to_string()));
        }

        DocumentRepository::replace_chunks(&self.db, &document.id, chunks).await
    }

    /// Most relevant chunks of active documents
    pub async fn search(&self, query: &str, category: Option<&str>, limit: usize) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let candidates = DocumentRepository::searchable_chunks(&self.db, category).await?;
        let query_vector = embed(query);

        let mut scored: Vec<(f64, &Document, &ChunkRecord)> = candidates
            .iter()
            .map(|(doc, chunk)| (cosine_similarity(&query_vector, &chunk.embedding), doc, chunk))
            .filter(|(score, _, _)| *score > 0.0)
            .collect();

        if scored.is_empty() {
            let needle = query.to_lowercase();
            scored = candidates
                .iter()
                .filter(|(_, chunk)| chunk.content.to_lowercase().contains(&needle))
                .map(|(doc, chunk)| (TEXT_MATCH_SCORE, doc, chunk))
                .collect();
        }

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, doc, chunk)| SearchHit {
                document_id: doc.id.clone(),
                document_title: doc.title.clone(),
                category: doc.category.clone(),
                chunk_index: chunk.chunk_index,
                page_number: chunk.page_number,
                content: chunk.content.clone(),
                similarity_score: score,
            })
            .collect())
    }

    pub async fn list(&self) -> Result<Vec<Document>> {
        DocumentRepository::list_active(&self.db).await
    }

    pub async fn detail(&self, document_id: &str) -> Result<DocumentDetail> {
        let document = DocumentRepository::find_by_id(&self.db, document_id)
            .await?
            .ok_or(AppError::NotFound("Document"))?;
        let chunks = DocumentRepository::chunks_for(&self.db, document_id)
            .await?
            .iter()
            .map(|c| c.to_chunk())
            .collect();
        Ok(DocumentDetail { document, chunks })
    }

    /// Remove the stored file, chunks and record
    pub async fn delete(&self, document_id: &str) -> Result<()> {
        let document = DocumentRepository::delete(&self.db, document_id)
            .await?
            .ok_or(AppError::NotFound("Document"))?;

        match tokio::fs::remove_file(&document.file_path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(document_id = %document_id, error = %e, "Failed to remove document file");
            }
        }
        tracing::info!(document_id = %document_id, "Document deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::DocumentStatus;
    use crate::infrastructure::database::connection::test_database;
    use chrono::{Duration, Utc};

    fn meta(name: &str) -> UploadMeta {
        UploadMeta {
            original_filename: name.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_allowed_file() {
        assert!(allowed_file("policy.txt"));
        assert!(allowed_file("Menu.PDF"));
        assert!(allowed_file("notes.md"));
        assert!(!allowed_file("image.png"));
        assert!(!allowed_file("noextension"));
    }

    #[test]
    fn test_secure_filename() {
        assert_eq!(secure_filename("../../etc/passwd"), "passwd");
        assert_eq!(secure_filename("My Policy (v2).txt"), "My_Policy__v2_.txt");
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text: Vec<String> = (0..600).map(|i| format!("word{:03}", i)).collect();
        let text = text.join(" ");
        let chunks = chunk_text(&text);

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.content.chars().count() <= CHUNK_SIZE);
            assert_eq!(chunk.content, text[chunk.start_char..chunk.end_char]);
        }

        let first_words: Vec<&str> = chunks[0].content.split_whitespace().collect();
        let second_words: Vec<&str> = chunks[1].content.split_whitespace().collect();
        let tail = &first_words[first_words.len() - CHUNK_OVERLAP_WORDS..];
        assert_eq!(&second_words[..CHUNK_OVERLAP_WORDS], tail);
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_text("  Check-in is at 3 PM.  ");
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Check-in is at 3 PM.");
        assert_eq!(chunks[0].start_char, 2);
        assert!(chunk_text("   ").is_empty());
    }

    #[test]
    fn test_page_attribution() {
        let filler = vec!["x"; 600].join(" ");
        let pages = vec![filler.clone(), "Page two content".to_string()];
        let chunks = chunk_pages(&pages);
        let last = chunks.last().unwrap();
        assert!(last.content.ends_with("Page two content"));
        assert_eq!(chunks[0].page_number, 1);

        let pages = vec!["first".to_string(), "second".to_string()];
        let chunks = chunk_pages(&pages);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page_number, 1);
    }

    #[test]
    fn test_long_word_is_split() {
        let long = "a".repeat(2500);
        let chunks = chunk_text(&long);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.content.chars().count() <= CHUNK_SIZE));
    }

    #[test]
    fn test_embedding_is_normalised_and_comparable() {
        let a = embed("The swimming pool opens at 7 AM");
        assert_eq!(a.len(), EMBEDDING_DIM);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);

        let b = embed("pool hours");
        let c = embed("billing invoice");
        assert!(cosine_similarity(&a, &b) > cosine_similarity(&a, &c));
        assert!(embed("the and of").is_empty());
        assert_eq!(cosine_similarity(&[], &b), 0.0);
    }

    #[test]
    fn test_markdown_to_text() {
        let text = markdown_to_text("# Pool\n\nOpen **daily** from `7am`.\n\n- Towels provided");
        assert!(text.contains("Pool"));
        assert!(text.contains("Open daily from 7am."));
        assert!(text.contains("Towels provided"));
        assert!(!text.contains('#'));
        assert!(!text.contains("**"));
    }

    #[tokio::test]
    async fn test_upload_process_search_delete() {
        let db = test_database().await;
        let dir = tempfile::tempdir().unwrap();
        let service = DocumentService::new(db, dir.path());

        let body = b"The swimming pool is open daily from 7 AM to 10 PM.\nTowels are provided.";
        let outcome = service
            .upload(body, UploadMeta {
                category: Some("amenities".to_string()),
                ..meta("pool.txt")
            })
            .await
            .unwrap();
        assert!(!outcome.duplicate);
        assert_eq!(outcome.document.status, DocumentStatus::Processing);
        assert_eq!(outcome.document.title, "pool.txt");

        let processed = service.process(&outcome.document.id).await.unwrap();
        assert_eq!(processed.status, DocumentStatus::Processed);
        assert_eq!(processed.chunk_count, 1);

        let hits = service.search("pool hours", None, 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert!(hits[0].similarity_score > 0.0);
        assert!(service.search("pool", Some("policy"), 5).await.unwrap().is_empty());
        assert!(service.search("   ", None, 5).await.unwrap().is_empty());

        let again = service.upload(body, meta("copy.txt")).await.unwrap();
        assert!(again.duplicate);
        assert_eq!(again.document.id, outcome.document.id);

        let path = processed.file_path.clone();
        service.delete(&processed.id).await.unwrap();
        assert!(!std::path::Path::new(&path).exists());
        assert!(matches!(
            service.delete(&processed.id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_pdf_processing_fails_with_reason() {
        let db = test_database().await;
        let dir = tempfile::tempdir().unwrap();
        let service = DocumentService::new(db, dir.path());

        let outcome = service.upload(b"%PDF-1.4 binary", meta("brochure.pdf")).await.unwrap();
        let failed = service.process(&outcome.document.id).await.unwrap();
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert!(failed.error.unwrap().contains("PDF"));

        // the same bytes again are a fresh upload, not a duplicate of the failure
        let again = service.upload(b"%PDF-1.4 binary", meta("brochure.pdf")).await.unwrap();
        assert!(!again.duplicate);
        assert_ne!(again.document.id, outcome.document.id);
    }

    #[tokio::test]
    async fn test_processing_records_analytics_event() {
        let db = test_database().await;
        let dir = tempfile::tempdir().unwrap();
        let service = DocumentService::new(db.clone(), dir.path());

        let outcome = service
            .upload(b"Checkout is at 11 AM. Late checkout costs extra.", meta("checkout.txt"))
            .await
            .unwrap();
        service.process(&outcome.document.id).await.unwrap();

        let now = Utc::now();
        let events = AnalyticsRepository::between(
            &db,
            now - Duration::minutes(1),
            now + Duration::minutes(1),
            Some(EventType::DocumentProcessed),
        )
        .await
        .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].value, 1.0);
        assert_eq!(events[0].metadata["document_id"], outcome.document.id.as_str());
    }

    #[tokio::test]
    async fn test_upload_rejects_bad_input() {
        let db = test_database().await;
        let dir = tempfile::tempdir().unwrap();
        let service = DocumentService::new(db, dir.path());

        assert!(matches!(
            service.upload(b"data", meta("photo.png")).await,
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            service.upload(b"", meta("empty.txt")).await,
            Err(AppError::Validation(_))
        ));
    }
}
