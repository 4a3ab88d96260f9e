// Shared fixtures for unit tests: generated PDFs and deterministic model stand-ins

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};

use crate::embeddings::Embedder;
use crate::llm::{ChatMessage, CompletionModel};

pub(crate) const TEST_DIMENSION: usize = 32;

/// Write a PDF with one page per entry of `pages`, each holding that text
pub(crate) fn write_text_pdf(path: &Path, pages: &[&str]) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![50.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("content should encode"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    doc.save(path).expect("test PDF should be written");
}

/// Bag-of-words hashing embedder: identical texts get identical vectors and
/// texts sharing words point in similar directions
#[derive(Debug, Clone, Default)]
pub(crate) struct HashingEmbedder;

impl HashingEmbedder {
    pub(crate) fn vector_for(text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; TEST_DIMENSION];
        for word in text.split_whitespace() {
            let word = word.to_lowercase();
            let bucket = word
                .bytes()
                .fold(7_usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize))
                % TEST_DIMENSION;
            vector[bucket] += 1.0;
        }
        // keep empty input away from the zero vector so cosine distance is defined
        vector[0] += 0.01;
        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        vector.iter().map(|v| v / norm).collect()
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        Ok(Self::vector_for(text))
    }
}

/// Completion model that records every request and answers with a fixed string
#[derive(Debug, Default)]
pub(crate) struct RecordingModel {
    pub(crate) answer: String,
    pub(crate) requests: Mutex<Vec<Vec<ChatMessage>>>,
}

impl RecordingModel {
    pub(crate) fn answering(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn recorded(&self) -> Vec<Vec<ChatMessage>> {
        self.requests.lock().expect("lock is not poisoned").clone()
    }
}

#[async_trait]
impl CompletionModel for RecordingModel {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.requests
            .lock()
            .expect("lock is not poisoned")
            .push(messages.to_vec());
        Ok(self.answer.clone())
    }
}
