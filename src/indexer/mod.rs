// Indexer module
// Rebuilds the vector store from a directory of PDFs: load, chunk, embed, store


use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{EmbeddingRecord, VectorStore};
use crate::embeddings::{ChunkingConfig, Embedder, OllamaClient, chunk_pages};
use crate::loader::{ParseErrorPolicy, SkippedPdf, load_directory};
use crate::{QaError, Result};

/// Outcome of one ingest run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestionReport {
    pub files_loaded: usize,
    pub pages_loaded: usize,
    pub chunks_stored: usize,
    pub skipped: Vec<SkippedPdf>,
}

/// One-shot batch ingestion into a [`VectorStore`]
pub struct Indexer {
    embedder: Arc<dyn Embedder>,
    store: VectorStore,
    chunking: ChunkingConfig,
    batch_size: usize,
    parse_policy: ParseErrorPolicy,
    show_progress: bool,
}

impl Indexer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: VectorStore,
        chunking: ChunkingConfig,
        batch_size: usize,
        parse_policy: ParseErrorPolicy,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            batch_size: batch_size.max(1),
            parse_policy,
            show_progress: false,
        }
    }

    /// Build an indexer backed by the configured Ollama model and on-disk store
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = OllamaClient::new(config).context("Failed to initialize Ollama client")?;
        let store = VectorStore::new(config).await?;

        Ok(Self::new(
            Arc::new(embedder),
            store,
            config.chunking.clone(),
            config.ollama.batch_size as usize,
            config.ingest.on_parse_error,
        )
        .with_progress(console::user_attended_stderr()))
    }

    #[inline]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[inline]
    pub fn with_parse_policy(mut self, parse_policy: ParseErrorPolicy) -> Self {
        self.parse_policy = parse_policy;
        self
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[inline]
    pub fn into_store(self) -> VectorStore {
        self.store
    }

    /// Replace the store's contents with the chunks of every PDF in `dir`
    ///
    /// The store is only rewritten once every chunk has been embedded, so a
    /// run that fails while loading, chunking or embedding leaves the previous
    /// index in place. A failure inside [`VectorStore::rebuild`] after the old
    /// table is dropped does not.
    #[inline]
    pub async fn ingest_directory(&mut self, dir: &Path) -> Result<IngestionReport> {
        info!("Ingesting PDFs from {}", dir.display());

        let dir_owned: PathBuf = dir.to_path_buf();
        let policy = self.parse_policy;
        let loaded = tokio::task::spawn_blocking(move || load_directory(&dir_owned, policy))
            .await
            .context("PDF loading task panicked")?
            .map_err(|e| QaError::Pdf(e.to_string()))?;

        let chunks = chunk_pages(&loaded.pages, &self.chunking)?;
        info!(
            "Split {} pages into {} chunks",
            loaded.pages.len(),
            chunks.len()
        );

        let bar = if self.show_progress {
            ProgressBar::new(chunks.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Embedding chunks")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let created_at = Utc::now().to_rfc3339();
        let mut records = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = self
                .embedder
                .embed_documents(&texts)
                .await
                .map_err(|e| QaError::Embedding(format!("{:#}", e)))?;

            if vectors.len() != batch.len() {
                return Err(QaError::Embedding(format!(
                    "Embedder returned {} vectors for {} chunks",
                    vectors.len(),
                    batch.len()
                )));
            }

            records.extend(
                batch
                    .iter()
                    .zip(vectors)
                    .map(|(chunk, vector)| EmbeddingRecord::from_chunk(chunk, vector, &created_at)),
            );
            bar.inc(batch.len() as u64);
            debug!("Embedded {}/{} chunks", records.len(), chunks.len());
        }
        bar.finish_and_clear();

        let chunks_stored = self.store.rebuild(records).await?;

        let report = IngestionReport {
            files_loaded: loaded.files_loaded,
            pages_loaded: loaded.pages.len(),
            chunks_stored,
            skipped: loaded.skipped,
        };

        info!(
            "Ingestion complete: {} files, {} pages, {} chunks, {} skipped",
            report.files_loaded,
            report.pages_loaded,
            report.chunks_stored,
            report.skipped.len()
        );

        Ok(report)
    }
}
