use crate::embeddings::EmbeddingProvider;
use crate::error::EmbeddingProviderError;
use crate::index::VectorIndex;
use crate::models::ScoredChunk;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 4;

pub struct Retriever<'a, P: EmbeddingProvider + ?Sized> {
    provider: &'a P,
    top_k: usize,
}

impl<'a, P: EmbeddingProvider + ?Sized> Retriever<'a, P> {
    pub fn new(provider: &'a P, top_k: usize) -> Self {
        Self { provider, top_k }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embeds the query and returns the closest chunks. An empty index
    /// answers with no chunks and never reaches the provider.
    pub fn retrieve(
        &self,
        index: &VectorIndex,
        query: &str,
    ) -> Result<Vec<ScoredChunk>, EmbeddingProviderError> {
        if index.is_empty() {
            return Ok(Vec::new());
        }

        if self.provider.model_id() != index.model_id()
            || self.provider.dimensions() != index.dimensions()
        {
            return Err(EmbeddingProviderError::ModelMismatch {
                indexed: format!("{} ({} dims)", index.model_id(), index.dimensions()),
                query: format!(
                    "{} ({} dims)",
                    self.provider.model_id(),
                    self.provider.dimensions()
                ),
            });
        }

        let query_vector = self.provider.embed(query)?;
        if query_vector.dimensions() != index.dimensions() {
            return Err(EmbeddingProviderError::DimensionMismatch {
                expected: index.dimensions(),
                actual: query_vector.dimensions(),
            });
        }

        let hits = index.search(&query_vector, self.top_k);
        debug!(requested = self.top_k, returned = hits.len(), "retrieved chunks");
        Ok(hits)
    }
}
