use anyhow::{Context, Result};
use console::style;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::database::VectorStore;
use crate::embeddings::OllamaClient;
use crate::indexer::{Indexer, IngestionReport};
use crate::loader::ParseErrorPolicy;
use crate::qa::QaChain;
use crate::web;

/// Rebuild the vector store from a directory of PDFs
///
/// `dir` defaults to `ingest.pdf_directory`; `abort_on_error` overrides the
/// configured parse-failure policy.
#[inline]
pub async fn ingest_documents(
    config: &Config,
    dir: Option<PathBuf>,
    abort_on_error: bool,
) -> Result<IngestionReport> {
    let dir = dir.unwrap_or_else(|| config.ingest.pdf_directory.clone());
    let policy = if abort_on_error {
        ParseErrorPolicy::Abort
    } else {
        config.ingest.on_parse_error
    };

    println!(
        "Ingesting PDFs from {} (on parse error: {})",
        style(dir.display()).cyan(),
        style(policy).cyan()
    );

    let mut indexer = Indexer::from_config(config)
        .await
        .context("Failed to initialize indexer")?
        .with_parse_policy(policy);

    let report = indexer
        .ingest_directory(&dir)
        .await
        .with_context(|| format!("Failed to ingest {}", dir.display()))?;

    println!("{}", style("Ingestion complete").green().bold());
    println!("  Files loaded:  {}", report.files_loaded);
    println!("  Pages loaded:  {}", report.pages_loaded);
    println!("  Chunks stored: {}", report.chunks_stored);

    if !report.skipped.is_empty() {
        println!(
            "{}",
            style(format!("  Skipped {} unreadable files:", report.skipped.len())).yellow()
        );
        for skipped in &report.skipped {
            println!("    {} ({})", skipped.path.display(), skipped.reason);
        }
    }

    if report.files_loaded == 0 {
        println!(
            "{}",
            style("No PDFs were ingested; questions will be answered without context").yellow()
        );
    }

    Ok(report)
}

/// Start the web form, optionally overriding the configured bind address
#[inline]
pub async fn serve_web(config: &Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut server = config.server.clone();
    if let Some(host) = host {
        server.host = host;
    }
    if let Some(port) = port {
        server.port = port;
    }
    server.validate()?;

    let chain = QaChain::from_config(config)
        .await
        .context("Failed to initialize Q&A chain")?;

    if chain.store().count_embeddings().await? == 0 {
        warn!("Vector store is empty; run `pdf-qa ingest` first");
    }

    println!(
        "{} on {}",
        style(&server.title).bold(),
        style(format!("http://{}", server.bind_address())).cyan()
    );
    println!("Press Ctrl+C to stop");

    web::serve(&server, Arc::new(chain)).await
}

/// Answer a single question on the terminal
#[inline]
pub async fn ask_question(config: &Config, question: &str) -> Result<()> {
    if question.trim().is_empty() {
        anyhow::bail!("Question must not be empty");
    }

    let chain = QaChain::from_config(config)
        .await
        .context("Failed to initialize Q&A chain")?;

    info!("Answering question from the command line");
    let result = chain.ask(question).await?;

    println!("{}", style("Answer").bold());
    println!("{}", result.answer);
    println!("{}", style(result.format_sources()).dim());

    Ok(())
}

/// Print the size of the vector store and the health of the external services
#[inline]
pub async fn show_status(config: &Config) -> Result<()> {
    println!("{}", style("PDF Q&A Status Report").bold());
    println!("{}", "=".repeat(50));
    println!();

    println!("Vector Store:");
    match VectorStore::new(config).await {
        Ok(store) => {
            println!("   ✅ LanceDB: {}", store.path().display());
            match store.count_embeddings().await {
                Ok(count) => println!("   Chunks: {}", count),
                Err(e) => println!("   ❌ Failed to count chunks - {}", e),
            }
            match store.count_source_files().await {
                Ok(count) => println!("   Source files: {}", count),
                Err(e) => println!("   ❌ Failed to count source files - {}", e),
            }
            println!("   Dimension: {}", store.dimension());
        }
        Err(e) => {
            println!("   ❌ LanceDB: Failed to open - {}", e);
        }
    }

    println!();
    println!("Ollama:");
    match OllamaClient::new(config) {
        Ok(client) => {
            let health = tokio::task::spawn_blocking(move || client.health_check())
                .await
                .context("Health check task panicked")?;
            match health {
                Ok(()) => println!(
                    "   ✅ Connected ({}:{}), model {}",
                    config.ollama.host, config.ollama.port, config.ollama.model
                ),
                Err(e) => println!("   ⚠️  Unhealthy - {:#}", e),
            }
        }
        Err(e) => println!("   ❌ Failed to create client - {}", e),
    }

    println!();
    println!("Language model:");
    println!("   Endpoint: {}", config.llm.base_url);
    println!("   Model: {}", config.llm.model);
    match config.llm.resolve_api_key() {
        Ok(_) => println!("   ✅ API key found in {}", config.llm.api_key_env),
        Err(e) => println!("   ❌ {}", e),
    }

    Ok(())
}
