use crate::embeddings::EmbeddingProvider;
use crate::error::EmbeddingProviderError;
use crate::models::{Embedding, ScoredChunk, TextChunk};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum DistanceMetric {
    #[default]
    Cosine,
    /// Scored as the negated L2 distance so higher is still closer.
    Euclidean,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexConfig {
    pub metric: DistanceMetric,
    pub embed_batch_size: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            metric: DistanceMetric::Cosine,
            embed_batch_size: 64,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndexedChunk {
    pub chunk: TextChunk,
    pub embedding: Embedding,
}

/// In-memory similarity index over embedded chunks.
///
/// The index remembers which embedding model built it; lookups with a
/// different model are refused by the retriever.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    model_id: String,
    dimensions: usize,
    metric: DistanceMetric,
    entries: Vec<IndexedChunk>,
}

impl VectorIndex {
    pub fn empty(model_id: impl Into<String>, dimensions: usize, metric: DistanceMetric) -> Self {
        Self {
            model_id: model_id.into(),
            dimensions,
            metric,
            entries: Vec::new(),
        }
    }

    /// Embeds every chunk and returns the finished index, or the first
    /// provider error. Nothing is returned for a partially embedded batch.
    pub fn build<P>(
        provider: &P,
        chunks: Vec<TextChunk>,
        config: &IndexConfig,
    ) -> Result<Self, EmbeddingProviderError>
    where
        P: EmbeddingProvider + ?Sized,
    {
        let expected_dimensions = provider.dimensions();
        let batch_size = config.embed_batch_size.max(1);
        let mut embeddings = Vec::with_capacity(chunks.len());

        for (batch_no, batch) in chunks.chunks(batch_size).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|chunk| chunk.text.as_str()).collect();
            let vectors = provider.embed_batch(&texts)?;

            if vectors.len() != texts.len() {
                return Err(EmbeddingProviderError::CountMismatch {
                    expected: texts.len(),
                    actual: vectors.len(),
                });
            }
            if let Some(wrong) = vectors
                .iter()
                .find(|vector| vector.dimensions() != expected_dimensions)
            {
                return Err(EmbeddingProviderError::DimensionMismatch {
                    expected: expected_dimensions,
                    actual: wrong.dimensions(),
                });
            }

            debug!(batch = batch_no, size = texts.len(), "embedded batch");
            embeddings.extend(vectors);
        }

        let entries = chunks
            .into_iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexedChunk { chunk, embedding })
            .collect::<Vec<_>>();

        info!(
            model = provider.model_id(),
            chunk_count = entries.len(),
            "built vector index"
        );

        Ok(Self {
            model_id: provider.model_id().to_string(),
            dimensions: expected_dimensions,
            metric: config.metric,
            entries,
        })
    }

    /// Top `k` chunks by descending similarity; equal scores keep chunk order.
    pub fn search(&self, query: &Embedding, k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let score = match self.metric {
                    DistanceMetric::Cosine => query.cosine_similarity(&entry.embedding),
                    DistanceMetric::Euclidean => -query.l2_distance(&entry.embedding),
                };
                (position, score)
            })
            .collect();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        scored
            .into_iter()
            .take(k)
            .map(|(position, score)| ScoredChunk {
                chunk: self.entries[position].chunk.clone(),
                score,
            })
            .collect()
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &TextChunk> {
        self.entries.iter().map(|entry| &entry.chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{split_text, ChunkingConfig};
    use crate::test_support::{chunk, FailingEmbedder, KeywordEmbedder, MisshapenEmbedder, VectorFault};

    #[test]
    fn build_embeds_every_chunk_in_order() {
        let chunks = vec![chunk(0, "refund policy"), chunk(1, "shipping rules")];
        let index = VectorIndex::build(&KeywordEmbedder, chunks, &IndexConfig::default()).unwrap();

        assert_eq!(index.len(), 2);
        assert_eq!(index.model_id(), "keyword-test");
        let texts: Vec<&str> = index.chunks().map(|chunk| chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["refund policy", "shipping rules"]);
    }

    #[test]
    fn provider_failure_builds_nothing() {
        let chunks = vec![chunk(0, "a"), chunk(1, "b"), chunk(2, "c")];
        let embedder = FailingEmbedder::after(2);
        let config = IndexConfig {
            embed_batch_size: 1,
            ..IndexConfig::default()
        };

        let result = VectorIndex::build(&embedder, chunks, &config);
        assert!(matches!(result, Err(EmbeddingProviderError::Rejected { .. })));
    }

    #[test]
    fn ties_keep_original_chunk_order() {
        let chunks = vec![
            chunk(0, "nothing relevant"),
            chunk(1, "refund one"),
            chunk(2, "refund two"),
            chunk(3, "refund three"),
        ];
        let index = VectorIndex::build(&KeywordEmbedder, chunks, &IndexConfig::default()).unwrap();
        let query = KeywordEmbedder.embed("refund").unwrap();

        let hits = index.search(&query, 2);
        let indices: Vec<usize> = hits.iter().map(|hit| hit.chunk.index).collect();
        assert_eq!(indices, vec![1, 2]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn same_chunks_same_query_same_ranking() {
        let text = "Refunds are processed within 30 days.\nShipping is free.\nSupport answers email.\n"
            .repeat(20);
        let config = ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
            ..ChunkingConfig::default()
        };
        let embedder = crate::CharacterNgramEmbedder::default();
        let query = embedder.embed("how long do refunds take").unwrap();

        let first = VectorIndex::build(&embedder, split_text(&text, config.clone()).unwrap(), &IndexConfig::default()).unwrap();
        let second = VectorIndex::build(&embedder, split_text(&text, config).unwrap(), &IndexConfig::default()).unwrap();

        assert_eq!(first.search(&query, 4), second.search(&query, 4));
    }

    #[test]
    fn euclidean_metric_prefers_nearest_vector() {
        let chunks = vec![chunk(0, "shipping"), chunk(1, "refund")];
        let config = IndexConfig {
            metric: DistanceMetric::Euclidean,
            ..IndexConfig::default()
        };
        let index = VectorIndex::build(&KeywordEmbedder, chunks, &config).unwrap();
        let query = KeywordEmbedder.embed("refund").unwrap();

        let hits = index.search(&query, 1);
        assert_eq!(hits[0].chunk.index, 1);
        assert!(hits[0].score <= 0.0);
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = VectorIndex::empty("keyword-test", 4, DistanceMetric::Cosine);
        let query = KeywordEmbedder.embed("refund").unwrap();
        assert!(index.search(&query, 4).is_empty());
    }

    #[test]
    fn short_batch_from_provider_is_a_count_mismatch() {
        let embedder = MisshapenEmbedder::default();
        embedder.fault.set(VectorFault::DropLast);
        let chunks = vec![chunk(0, "refund"), chunk(1, "shipping"), chunk(2, "support")];

        let result = VectorIndex::build(&embedder, chunks, &IndexConfig::default());

        assert!(matches!(
            result,
            Err(EmbeddingProviderError::CountMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn wrong_vector_width_is_a_dimension_mismatch() {
        let embedder = MisshapenEmbedder::default();
        embedder.fault.set(VectorFault::ExtraDimension);
        let chunks = vec![chunk(0, "refund"), chunk(1, "shipping")];

        let result = VectorIndex::build(&embedder, chunks, &IndexConfig::default());

        assert!(matches!(
            result,
            Err(EmbeddingProviderError::DimensionMismatch { expected: 4, actual: 5 })
        ));
    }
}
