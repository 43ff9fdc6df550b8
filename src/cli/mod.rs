//! Command line entry points: `serve`, `check`, `ingest`

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{redact_url, Settings};
use crate::domain::services::documents::UploadMeta;
use crate::domain::services::DocumentService;
use crate::domain::models::DocumentStatus;
use crate::infrastructure::cache::SessionCache;
use crate::infrastructure::database::init_database;
use crate::shared::errors::{AppError, Result};

#[derive(Parser)]
#[command(name = "hotel-desk")]
#[command(about = "AI customer service desk for hotels")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP and WebSocket server (default)
    Serve {
        /// Override HOST
        #[arg(long)]
        host: Option<String>,
        /// Override PORT
        #[arg(long)]
        port: Option<u16>,
    },
    /// Verify the database and cache are reachable
    Check {
        /// Attempts per service before giving up
        #[arg(long, default_value_t = 3)]
        retries: u32,
    },
    /// Add a document from disk to the knowledge base and index it
    Ingest {
        /// File to ingest (txt, md, doc, docx, pdf)
        path: PathBuf,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
}

/// Settings from `.env` and the environment
pub fn load_settings() -> Result<Settings> {
    Ok(Settings::from_env()?)
}

/// Delay before retry `attempt` (1-based): 1 s, 2 s, 4 s, ...
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1u64 << attempt.saturating_sub(1).min(6))
}

async fn with_retries<T, F, Fut>(what: &str, retries: u32, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let attempts = retries.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                let delay = backoff_delay(attempt);
                tracing::warn!(
                    service = what,
                    attempt = attempt,
                    retry_in_secs = delay.as_secs(),
                    "Connection failed: {}",
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Connect to every backing service, retrying with exponential backoff
pub async fn check(settings: &Settings, retries: u32) -> Result<()> {
    tracing::info!(database = %redact_url(&settings.database_url), "Checking database");
    with_retries("database", retries, || init_database(settings)).await?;
    println!("database: ok ({})", redact_url(&settings.database_url));

    tracing::info!(cache = %redact_url(&settings.redis_url), "Checking cache");
    with_retries("cache", retries, || SessionCache::connect_redis(&settings.redis_url)).await?;
    println!("cache: ok ({})", redact_url(&settings.redis_url));

    if let Some(uri) = &settings.document_db_uri {
        println!("MONGODB_URI: parsed ({})", uri.redacted());
    }
    println!(
        "twilio: {}",
        if settings.twilio.is_configured() { "configured" } else { "not configured" }
    );
    println!(
        "gemini: {}",
        if settings.google_api_key.is_some() { "configured" } else { "not configured" }
    );
    Ok(())
}

/// Upload and index a file synchronously
pub async fn ingest(
    settings: &Settings,
    path: PathBuf,
    category: Option<String>,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    let bytes = tokio::fs::read(&path).await?;
    let original_filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Validation(format!("Not a file: {}", path.display())))?;

    let db = init_database(settings).await?;
    let documents = DocumentService::new(db, settings.upload_dir.clone());
    let outcome = documents
        .upload(
            &bytes,
            UploadMeta {
                original_filename,
                mime_type: None,
                category,
                title,
                description,
                uploaded_by: Some("cli".to_string()),
            },
        )
        .await?;

    if outcome.duplicate {
        println!("Already ingested as {}", outcome.document.id);
        return Ok(());
    }

    let document = documents.process(&outcome.document.id).await?;
    match document.status {
        DocumentStatus::Processed => {
            println!("Indexed {} ({} chunks)", document.id, document.chunk_count);
            Ok(())
        }
        _ => Err(AppError::Storage(format!(
            "Processing failed: {}",
            document.error.unwrap_or_default()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_backoff_doubles() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
    }

    #[test]
    fn test_default_command_is_none() {
        let cli = Cli::parse_from(["hotel-desk"]);
        assert!(cli.command.is_none());

        let cli = Cli::parse_from(["hotel-desk", "check"]);
        assert!(matches!(cli.command, Some(Commands::Check { retries: 3 })));
    }

    #[tokio::test]
    async fn test_with_retries_gives_up_after_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retries("test", 2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Cache("down".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ingest_text_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("spa.md");
        std::fs::write(&file, "# Spa\n\nThe spa opens at 9am.").unwrap();

        let mut settings = Settings::for_testing();
        settings.upload_dir = dir.path().join("uploads");
        assert!(ingest(&settings, file, Some("amenities".to_string()), None, None).await.is_ok());
    }
}
