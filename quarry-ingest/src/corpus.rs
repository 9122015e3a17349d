//! Corpus sources: where the documents to index come from.
//!
//! The retriever only needs an ordered list of `(text, metadata)` pairs, which
//! it asks for through [`CorpusSource::load_corpus`]. [`DirectoryCorpus`]
//! produces them from text and PDF files on disk; [`InMemoryCorpus`] hands back a
//! fixed list and is mostly useful for tests and embedding callers.
//!
//! Every document carries at least two metadata keys:
//! - `source`: the file path relative to the corpus root
//! - `type`: the lower-cased file extension
//!
//! When chunking is enabled the chunk position is recorded as well
//! (`chunk`, `chunk_count`).

use crate::error::{IngestError, Result};
use crate::text::TextSplitter;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extensions read by [`DirectoryCorpus`].
pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown", "rst", "pdf"];

/// Raw document produced by ingestion, before it is embedded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDocument {
    pub text: String,
    pub metadata: Map<String, Value>,
}

impl SourceDocument {
    /// Create a document tagged with the mandatory `source` and `type` keys.
    pub fn new(text: impl Into<String>, source: impl Into<String>, doc_type: impl Into<String>) -> Self {
        let mut metadata = Map::new();
        metadata.insert("source".to_string(), Value::String(source.into()));
        metadata.insert("type".to_string(), Value::String(doc_type.into()));
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// Anything that can produce the full corpus in a stable order.
#[async_trait]
pub trait CorpusSource: Send + Sync {
    async fn load_corpus(&self) -> Result<Vec<SourceDocument>>;

    /// Short human readable description, used in logs and status output
    fn describe(&self) -> String;
}

/// Chunking settings for [`DirectoryCorpus`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
        }
    }
}

/// Loads every supported file under a directory.
#[derive(Debug, Clone)]
pub struct DirectoryCorpus {
    root: PathBuf,
    splitter: Option<TextSplitter>,
}

impl DirectoryCorpus {
    /// One document per file, no chunking.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            splitter: None,
        }
    }

    /// Split each file into overlapping chunks, one document per chunk.
    pub fn with_chunking(mut self, options: ChunkingOptions) -> Result<Self> {
        self.splitter = Some(TextSplitter::new(options.chunk_size, options.chunk_overlap)?);
        Ok(self)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Supported files under the root, sorted by path so rebuilds are deterministic.
    fn discover_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(IngestError::MissingRoot {
                path: self.root.clone(),
            });
        }

        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(&self.root)
            .hidden(true)
            .sort_by_file_path(|a, b| a.cmp(b))
            .build();

        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            if extension_of(entry.path()).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str())) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn documents_for_file(&self, relative: &str, doc_type: &str, text: String) -> Vec<SourceDocument> {
        let Some(splitter) = &self.splitter else {
            return vec![SourceDocument::new(text, relative, doc_type)];
        };

        let chunks: Vec<_> = splitter
            .split(&text)
            .into_iter()
            .filter(|chunk| !chunk.text.trim().is_empty())
            .collect();
        let chunk_count = chunks.len();

        chunks
            .into_iter()
            .enumerate()
            .map(|(position, chunk)| {
                let mut doc = SourceDocument::new(chunk.text, relative, doc_type);
                doc.metadata.insert("chunk".to_string(), Value::from(position));
                doc.metadata.insert("chunk_count".to_string(), Value::from(chunk_count));
                doc
            })
            .collect()
    }
}

#[async_trait]
impl CorpusSource for DirectoryCorpus {
    async fn load_corpus(&self) -> Result<Vec<SourceDocument>> {
        let files = self.discover_files()?;
        info!("Found {} files in {}", files.len(), self.root.display());

        let mut documents = Vec::new();
        let mut loaded_files = 0usize;

        for path in &files {
            let text = match read_text(path).await {
                Ok(text) => text,
                Err(err) => {
                    // A single unreadable file must not sink the whole corpus
                    warn!("Skipping file: {}", err);
                    continue;
                }
            };

            if text.trim().is_empty() {
                warn!("Skipping {}: no text content", path.display());
                continue;
            }

            let relative = relative_source(&self.root, path);
            let doc_type = extension_of(path).unwrap_or_default();
            let file_docs = self.documents_for_file(&relative, &doc_type, text);
            debug!("Loaded {} document(s) from {}", file_docs.len(), relative);

            documents.extend(file_docs);
            loaded_files += 1;
        }

        info!(
            "Loaded {} documents from {} of {} files",
            documents.len(),
            loaded_files,
            files.len()
        );
        Ok(documents)
    }

    fn describe(&self) -> String {
        match &self.splitter {
            Some(splitter) => format!(
                "directory {} (chunks of {} bytes, overlap {})",
                self.root.display(),
                splitter.chunk_size(),
                splitter.chunk_overlap()
            ),
            None => format!("directory {}", self.root.display()),
        }
    }
}

/// A fixed, already loaded corpus.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCorpus {
    documents: Vec<SourceDocument>,
}

impl InMemoryCorpus {
    pub fn new(documents: Vec<SourceDocument>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl CorpusSource for InMemoryCorpus {
    async fn load_corpus(&self) -> Result<Vec<SourceDocument>> {
        Ok(self.documents.clone())
    }

    fn describe(&self) -> String {
        format!("in-memory corpus of {} documents", self.documents.len())
    }
}

async fn read_text(path: &Path) -> Result<String> {
    if extension_of(path).as_deref() == Some("pdf") {
        let owned = path.to_path_buf();
        return tokio::task::spawn_blocking(move || crate::pdf::extract_text(&owned)).await?;
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn relative_source(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tracing_test::traced_test;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn test_directory_corpus_loads_supported_files_in_order() {
        let dir = tempdir().unwrap();
        write(dir.path(), "b.md", "# Beta\n\nSecond file.");
        write(dir.path(), "a.txt", "First file.");
        write(dir.path(), "nested/c.TXT", "Nested file.");
        write(dir.path(), "image.png", "not really an image");

        let docs = DirectoryCorpus::new(dir.path()).load_corpus().await.unwrap();

        let sources: Vec<_> = docs.iter().map(|d| d.source().unwrap()).collect();
        assert_eq!(sources, vec!["a.txt", "b.md", "nested/c.TXT"]);
        assert_eq!(docs[0].text, "First file.");
        assert_eq!(docs[1].metadata["type"], "md");
        assert_eq!(docs[2].metadata["type"], "txt");
    }

    #[tokio::test]
    #[traced_test]
    async fn test_blank_files_are_skipped_with_warning() {
        let dir = tempdir().unwrap();
        write(dir.path(), "empty.txt", "  \n\n ");
        write(dir.path(), "full.txt", "Content.");

        let docs = DirectoryCorpus::new(dir.path()).load_corpus().await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source(), Some("full.txt"));
        assert!(logs_contain("no text content"));
    }

    #[tokio::test]
    async fn test_hidden_files_are_ignored() {
        let dir = tempdir().unwrap();
        write(dir.path(), ".secret.txt", "hidden");
        write(dir.path(), "visible.txt", "shown");

        let docs = DirectoryCorpus::new(dir.path()).load_corpus().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source(), Some("visible.txt"));
    }

    #[tokio::test]
    async fn test_missing_root_is_an_error() {
        let dir = tempdir().unwrap();
        let corpus = DirectoryCorpus::new(dir.path().join("nope"));
        assert!(matches!(
            corpus.load_corpus().await,
            Err(IngestError::MissingRoot { .. })
        ));
    }

    #[tokio::test]
    async fn test_chunked_corpus_tags_chunks() {
        let dir = tempdir().unwrap();
        let long = (0..40)
            .map(|i| format!("Line {i} of the handbook covers policy.\n"))
            .collect::<String>();
        write(dir.path(), "handbook.md", &long);

        let corpus = DirectoryCorpus::new(dir.path())
            .with_chunking(ChunkingOptions {
                chunk_size: 200,
                chunk_overlap: 20,
            })
            .unwrap();
        let docs = corpus.load_corpus().await.unwrap();

        assert!(docs.len() > 1);
        for (i, doc) in docs.iter().enumerate() {
            assert_eq!(doc.source(), Some("handbook.md"));
            assert_eq!(doc.metadata["chunk"], i);
            assert_eq!(doc.metadata["chunk_count"], docs.len());
            assert!(doc.text.len() <= 220);
        }
        assert!(corpus.describe().contains("chunks of 200 bytes"));
    }

    #[tokio::test]
    async fn test_in_memory_corpus() {
        let corpus = InMemoryCorpus::new(vec![SourceDocument::new("hello", "greeting.txt", "txt")]);
        let docs = corpus.load_corpus().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["source"], "greeting.txt");
        assert_eq!(docs[0].metadata["type"], "txt");
    }

    #[tokio::test]
    async fn test_pdf_files_are_read_page_by_page() {
        let dir = tempdir().unwrap();
        write(dir.path(), "notes.txt", "Plain notes.");
        crate::pdf::fixtures::write_pdf(
            &dir.path().join("policy.pdf"),
            &["Expense reports need receipts", "Refunds take ten days"],
        );

        let docs = DirectoryCorpus::new(dir.path()).load_corpus().await.unwrap();

        assert_eq!(docs.len(), 2);
        assert_eq!(docs[1].source(), Some("policy.pdf"));
        assert_eq!(docs[1].metadata["type"], "pdf");
        assert!(docs[1].text.contains("Expense reports need receipts"));
        assert!(docs[1].text.contains("Refunds take ten days"));
    }

    #[tokio::test]
    #[traced_test]
    async fn test_broken_pdf_is_skipped_with_warning() {
        let dir = tempdir().unwrap();
        write(dir.path(), "broken.pdf", "not a pdf at all");
        write(dir.path(), "ok.txt", "Still indexed.");

        let docs = DirectoryCorpus::new(dir.path()).load_corpus().await.unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].source(), Some("ok.txt"));
        assert!(logs_contain("Failed to parse PDF"));
    }
}
