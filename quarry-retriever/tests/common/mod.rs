//! Test doubles shared by the integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use quarry_embed::{EmbedError, EmbeddingProvider, EmbeddingResult};
use quarry_ingest::{CorpusSource, SourceDocument};
use quarry_retriever::retrieval::IndexBuilder;
use quarry_retriever::storage::IndexPaths;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Embeds text by table lookup. Unknown text maps to a far-away constant vector.
pub struct TableEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
    texts_embedded: AtomicUsize,
}

impl TableEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: HashMap::new(),
            texts_embedded: AtomicUsize::new(0),
        }
    }

    /// Map `text` to `vector`. The vector may deliberately have the wrong length.
    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.table.insert(text.to_string(), vector);
        self
    }

    /// Map `text` to the unit vector along `axis`.
    pub fn with_axis(self, text: &str, axis: usize) -> Self {
        let mut vector = vec![0.0; self.dimension];
        vector[axis] = 1.0;
        self.with(text, vector)
    }

    pub fn texts_embedded(&self) -> usize {
        self.texts_embedded.load(Ordering::SeqCst)
    }

    fn lookup(&self, text: &str) -> Vec<f32> {
        self.texts_embedded.fetch_add(1, Ordering::SeqCst);
        self.table
            .get(text)
            .cloned()
            .unwrap_or_else(|| vec![100.0; self.dimension])
    }
}

#[async_trait]
impl EmbeddingProvider for TableEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.lookup(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult, EmbedError> {
        let embeddings = texts.iter().map(|t| self.lookup(t)).collect();
        Ok(EmbeddingResult {
            embeddings,
            dimension: self.dimension,
        })
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "table"
    }
}

/// In-memory corpus whose contents can be replaced and whose loads are counted.
#[derive(Default)]
pub struct CountingCorpus {
    documents: Mutex<Vec<SourceDocument>>,
    loads: AtomicUsize,
}

impl CountingCorpus {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self {
            documents: Mutex::new(documents),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn set_documents(&self, documents: Vec<SourceDocument>) {
        *self.documents.lock().unwrap() = documents;
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CorpusSource for CountingCorpus {
    async fn load_corpus(&self) -> quarry_ingest::Result<Vec<SourceDocument>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.documents.lock().unwrap().clone())
    }

    fn describe(&self) -> String {
        "counting test corpus".to_string()
    }
}

pub fn doc(text: &str, source: &str) -> SourceDocument {
    SourceDocument::new(text, source, "txt")
}

pub fn paths_in(dir: &Path) -> IndexPaths {
    IndexPaths::from_index_path(dir.join("index").join("docs.index"))
}

pub fn builder(
    provider: &Arc<TableEmbedder>,
    corpus: &Arc<CountingCorpus>,
    paths: &IndexPaths,
) -> IndexBuilder {
    IndexBuilder::new(provider.clone(), corpus.clone(), paths.clone())
}

/// Three documents on distinct axes of a 3-dimensional space.
pub fn three_axis_fixture() -> (Arc<TableEmbedder>, Arc<CountingCorpus>) {
    let provider = TableEmbedder::new(3)
        .with_axis("Invoices are due in 30 days.", 0)
        .with_axis("Travel must be booked two weeks ahead.", 1)
        .with_axis("Laptops are replaced every three years.", 2);
    let corpus = CountingCorpus::new(vec![
        doc("Invoices are due in 30 days.", "finance.txt"),
        doc("Travel must be booked two weeks ahead.", "travel.md"),
        doc("Laptops are replaced every three years.", "it.txt"),
    ]);
    (Arc::new(provider), Arc::new(corpus))
}
