// Question answering over the vector store
// Retrieves the nearest chunks for a question and asks the language model to answer from them


use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::{SearchResult, VectorStore};
use crate::embeddings::{DocumentChunk, Embedder, OllamaClient};
use crate::llm::{ChatMessage, CompletionModel, OpenAiClient};
use crate::{QaError, Result};

const SYSTEM_PROMPT_PREFIX: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n";

/// The model's answer and the chunks it was given, nearest first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub answer: String,
    pub sources: Vec<DocumentChunk>,
}

impl AnswerResult {
    /// Citation block listing the file and page of every source chunk
    #[inline]
    pub fn format_sources(&self) -> String {
        let lines: Vec<String> = self
            .sources
            .iter()
            .map(|chunk| format!("- {}, Page {}...", chunk.source_file, chunk.page_number))
            .collect();

        format!("\n\nSources:\n{}", lines.join("\n\n"))
    }
}

/// Anything that can turn a question into an answer with sources
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, question: &str) -> Result<AnswerResult>;
}

/// Build the chat request for `question` with `chunks` stuffed into the system prompt
#[inline]
pub fn build_messages(question: &str, chunks: &[DocumentChunk]) -> Vec<ChatMessage> {
    let context = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    vec![
        ChatMessage::system(format!("{}{}", SYSTEM_PROMPT_PREFIX, context)),
        ChatMessage::user(question),
    ]
}

fn chunk_from_result(result: SearchResult) -> DocumentChunk {
    let metadata = result.chunk_metadata;
    DocumentChunk {
        text: metadata.content,
        source_file: metadata.source_file,
        page_number: metadata.page_number,
        chunk_index: metadata.chunk_index as usize,
    }
}

/// Retrieval-augmented answering chain
pub struct QaChain {
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn CompletionModel>,
    store: VectorStore,
    top_k: usize,
}

impl QaChain {
    #[inline]
    pub fn new(
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn CompletionModel>,
        store: VectorStore,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            llm,
            store,
            top_k,
        }
    }

    /// Connect the Ollama embedder, the chat completion client and the on-disk store
    #[inline]
    pub async fn from_config(config: &Config) -> Result<Self> {
        let embedder = OllamaClient::new(config).context("Failed to initialize Ollama client")?;
        let llm = OpenAiClient::from_config(&config.llm)
            .map_err(|e| QaError::Config(format!("{:#}", e)))?;
        let store = VectorStore::new(config).await?;

        info!(
            "Q&A chain ready: {} stored chunks, top_k = {}, model {}",
            store.count_embeddings().await?,
            config.retrieval.top_k,
            llm.model()
        );

        Ok(Self::new(
            Arc::new(embedder),
            Arc::new(llm),
            store,
            config.retrieval.top_k,
        ))
    }

    #[inline]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// The `top_k` stored chunks nearest to `question`
    #[inline]
    pub async fn retrieve(&self, question: &str) -> Result<Vec<DocumentChunk>> {
        if self.store.count_embeddings().await? == 0 {
            debug!("Vector store is empty, skipping retrieval");
            return Ok(Vec::new());
        }

        let query_vector = self
            .embedder
            .embed_query(question)
            .await
            .map_err(|e| QaError::Embedding(format!("{:#}", e)))?;

        let results = self.store.search_similar(&query_vector, self.top_k).await?;
        debug!("Retrieved {} chunks", results.len());

        Ok(results.into_iter().map(chunk_from_result).collect())
    }

    #[inline]
    pub async fn ask(&self, question: &str) -> Result<AnswerResult> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Other(anyhow::anyhow!("Question must not be empty")));
        }

        let sources = self.retrieve(question).await?;
        let messages = build_messages(question, &sources);

        let answer = self
            .llm
            .complete(&messages)
            .await
            .map_err(|e| QaError::Llm(format!("{:#}", e)))?;

        info!("Answered question using {} source chunks", sources.len());
        Ok(AnswerResult { answer, sources })
    }
}

#[async_trait]
impl Answerer for QaChain {
    async fn answer(&self, question: &str) -> Result<AnswerResult> {
        self.ask(question).await
    }
}
