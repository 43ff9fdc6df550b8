//! Hotel Desk - Main Entry Point
//!
//! `serve` (the default) runs the HTTP/WebSocket server; `check` and
//! `ingest` are operator utilities.

use anyhow::Context;
use clap::Parser;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, services::ServeDir, trace::TraceLayer,
};

use hotel_desk::cli::{self, Cli, Commands};
use hotel_desk::config::{redact_url, Settings};
use hotel_desk::handlers::{self, AppState};
use hotel_desk::shared::logging;

#[tokio::main]
async fn main() {
    logging::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!("{:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = cli::load_settings().context("Invalid configuration")?;

    match cli.command.unwrap_or(Commands::Serve { host: None, port: None }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            serve(settings).await
        }
        Commands::Check { retries } => {
            cli::check(&settings, retries).await.context("Service check failed")
        }
        Commands::Ingest { path, category, title, description } => {
            cli::ingest(&settings, path, category, title, description)
                .await
                .context("Ingest failed")
        }
    }
}

async fn serve(settings: Settings) -> anyhow::Result<()> {
    tracing::info!("Starting Hotel Desk...");

    let addr = settings.bind_address();
    let database = redact_url(&settings.database_url);
    let state = AppState::build(settings)
        .await
        .context("Failed to initialize application state")?;

    logging::log_startup(
        &database,
        state.cache.backend().as_str(),
        state.chat.assistant_name(),
    );

    // NOTE: Axum 0.8 uses {param} syntax instead of :param
    let app = handlers::router(state)
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
