use crate::error::EmbeddingProviderError;
use crate::models::Embedding;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 128;

/// Turns text into vectors. Query and corpus must go through the same
/// provider and model, so every provider names the model it embeds with.
pub trait EmbeddingProvider {
    fn model_id(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError>;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingProviderError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

impl<P: EmbeddingProvider + ?Sized> EmbeddingProvider for &P {
    fn model_id(&self) -> &str {
        (**self).model_id()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        (**self).embed(text)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingProviderError> {
        (**self).embed_batch(texts)
    }
}

/// Offline embedder hashing character trigrams into buckets.
#[derive(Debug, Clone)]
pub struct CharacterNgramEmbedder {
    dimensions: usize,
    model_id: String,
}

impl CharacterNgramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self {
            dimensions,
            model_id: format!("char-trigram-{dimensions}"),
        }
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        // pad so words at the edges still produce full trigrams
        let padded: Vec<char> = std::iter::once(' ')
            .chain(text.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();

        let mut vector = vec![0f32; self.dimensions];
        for trigram in padded.windows(3) {
            let bucket = fnv1a(trigram) % self.dimensions as u64;
            vector[bucket as usize] += 1.0;
        }

        let norm = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|value| *value /= norm);
        }
        vector
    }
}

fn fnv1a(chars: &[char]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;

    chars
        .iter()
        .flat_map(|ch| (*ch as u32).to_le_bytes())
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(byte)).wrapping_mul(PRIME))
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_EMBEDDING_DIMENSIONS)
    }
}

impl EmbeddingProvider for CharacterNgramEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        Ok(Embedding::new(self.vector(text)))
    }
}
