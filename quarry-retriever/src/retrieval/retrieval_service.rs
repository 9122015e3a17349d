//! Query-time entry point.
//!
//! [`RetrievalService::get_relevant_documents`] embeds the query, scans the
//! current snapshot for the `k` nearest rows and returns copies of the matching
//! documents with `similarity_score` (the squared L2 distance) attached.
//! Candidates that do not resolve to a stored document, or whose distance is
//! not below the threshold, are dropped; the result may be shorter than `k`.

use crate::error::{Result, RetrieverError};
use crate::retrieval::index_state::IndexHandle;
use crate::storage::Document;
use quarry_embed::EmbeddingProvider;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// Query defaults.
///
/// The threshold is on the squared L2 scale of normalised embeddings; other
/// models may need a different value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub distance_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            distance_threshold: 15.0,
        }
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RetrieverError::config("top_k must be at least 1"));
        }
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(RetrieverError::config(format!(
                "distance_threshold must be a positive number, got {}",
                self.distance_threshold
            )));
        }
        Ok(())
    }
}

/// Flattened view of a returned document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryHit {
    pub content: String,
    pub source: Option<String>,
    #[serde(rename = "type")]
    pub doc_type: Option<String>,
    pub similarity_score: Option<f64>,
}

impl From<&Document> for QueryHit {
    fn from(doc: &Document) -> Self {
        Self {
            content: doc.content.clone(),
            source: doc.source().map(str::to_string),
            doc_type: doc.doc_type().map(str::to_string),
            similarity_score: doc.similarity_score(),
        }
    }
}

pub struct RetrievalService {
    handle: IndexHandle,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrievalConfig,
}

impl RetrievalService {
    pub fn new(handle: IndexHandle, provider: Arc<dyn EmbeddingProvider>, config: RetrievalConfig) -> Self {
        Self {
            handle,
            provider,
            config,
        }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// [`get_relevant_documents`](Self::get_relevant_documents) with the configured defaults.
    pub async fn search(&self, query: &str) -> Result<Vec<Document>> {
        self.get_relevant_documents(query, self.config.top_k, self.config.distance_threshold)
            .await
    }

    /// Up to `k` documents whose distance to `query` is below `distance_threshold`,
    /// closest first.
    ///
    /// Readiness and emptiness are checked before the query is embedded, so a
    /// refused query or an empty index never calls the provider.
    ///
    /// Fails with [`RetrieverError::NotReady`] before the first snapshot is
    /// published. A query vector of the wrong length is reported as
    /// [`RetrieverError::DimensionMismatch`] rather than an empty result, since
    /// it means the provider no longer matches the index.
    pub async fn get_relevant_documents(
        &self,
        query: &str,
        k: usize,
        distance_threshold: f32,
    ) -> Result<Vec<Document>> {
        let snapshot = self.handle.ready_snapshot().await?;
        if snapshot.is_empty() {
            info!("Index is empty; no documents for query");
            return Ok(Vec::new());
        }

        let query_vector = self.provider.embed_text(query).await?;
        let hits = snapshot.index().search(&query_vector, k)?;

        let mut documents = Vec::with_capacity(hits.len());
        for hit in hits {
            let doc = match snapshot.store().get(hit.row) {
                Ok(doc) => doc,
                Err(e) => {
                    debug!("Skipping candidate: {}", e);
                    continue;
                }
            };
            // NaN distances or thresholds never pass
            if hit.distance.partial_cmp(&distance_threshold) != Some(Ordering::Less) {
                debug!(
                    "Skipping row {} at distance {:.4} (threshold {})",
                    hit.row, hit.distance, distance_threshold
                );
                continue;
            }
            debug!("Keeping row {} at distance {:.4}", hit.row, hit.distance);
            documents.push(doc.with_similarity_score(hit.distance));
        }

        if documents.is_empty() {
            info!("No documents within distance {} of query", distance_threshold);
        }
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retrieval::index_state::IndexSnapshot;
    use crate::storage::{DocumentStore, VectorIndex};
    use async_trait::async_trait;
    use proptest::prelude::*;
    use quarry_embed::{EmbedError, EmbeddingResult};
    use quarry_ingest::SourceDocument;

    /// Embeds every text as the same fixed vector.
    struct FixedProvider(Vec<f32>);

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed_text(&self, _text: &str) -> std::result::Result<Vec<f32>, EmbedError> {
            Ok(self.0.clone())
        }

        async fn embed_texts(&self, texts: &[String]) -> std::result::Result<EmbeddingResult, EmbedError> {
            Ok(EmbeddingResult {
                embeddings: texts.iter().map(|_| self.0.clone()).collect(),
                dimension: self.0.len(),
            })
        }

        fn embedding_dimension(&self) -> usize {
            self.0.len()
        }

        fn provider_name(&self) -> &str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn test_out_of_range_rows_are_skipped() {
        // Three rows but only two documents: row 2 cannot be resolved
        let mut index = VectorIndex::new(1);
        index.add(&[vec![0.0], vec![1.0], vec![0.5]]).unwrap();
        let store = DocumentStore::from_documents(vec![
            SourceDocument::new("zero", "0.txt", "txt").into(),
            SourceDocument::new("one", "1.txt", "txt").into(),
        ]);

        let handle = IndexHandle::new();
        handle.publish(IndexSnapshot::unchecked(index, store)).await;
        let service = RetrievalService::new(
            handle,
            Arc::new(FixedProvider(vec![0.0])),
            RetrievalConfig::default(),
        );

        let docs = service.get_relevant_documents("anything", 3, 15.0).await.unwrap();
        let contents: Vec<_> = docs.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["zero", "one"]);
    }

    #[test]
    fn test_retrieval_config_validation() {
        assert!(RetrievalConfig::default().validate().is_ok());
        assert!(RetrievalConfig { top_k: 0, ..Default::default() }.validate().is_err());
        assert!(
            RetrievalConfig {
                distance_threshold: f32::NAN,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            RetrievalConfig {
                distance_threshold: -1.0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_query_hit_view() {
        let doc: Document = SourceDocument::new("body", "a.md", "md").into();
        let hit = QueryHit::from(&doc.with_similarity_score(1.5));

        assert_eq!(hit.source.as_deref(), Some("a.md"));
        assert_eq!(hit.similarity_score, Some(1.5));
        let json = serde_json::to_value(&hit).unwrap();
        assert_eq!(json["type"], "md");
        assert_eq!(json["content"], "body");
    }

    proptest! {
        #[test]
        fn prop_results_are_ordered_and_under_threshold(
            rows in prop::collection::vec(-5.0f32..5.0, 1..30),
            query in -5.0f32..5.0,
            k in 1usize..40,
            threshold in 0.01f32..50.0,
        ) {
            let mut index = VectorIndex::new(1);
            index.add(&rows.iter().map(|&x| vec![x]).collect::<Vec<_>>()).unwrap();
            let store = DocumentStore::from_documents(
                (0..rows.len())
                    .map(|i| SourceDocument::new(format!("doc {i}"), format!("{i}.txt"), "txt").into())
                    .collect(),
            );

            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let docs = runtime.block_on(async {
                let handle = IndexHandle::new();
                handle.publish(IndexSnapshot::new(index, store).unwrap()).await;
                let service = RetrievalService::new(
                    handle,
                    Arc::new(FixedProvider(vec![query])),
                    RetrievalConfig::default(),
                );
                service.get_relevant_documents("q", k, threshold).await.unwrap()
            });

            prop_assert!(docs.len() <= k);
            let scores: Vec<f64> = docs.iter().map(|d| d.similarity_score().unwrap()).collect();
            for score in &scores {
                prop_assert!(*score < f64::from(threshold));
            }
            for pair in scores.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
        }
    }
}
