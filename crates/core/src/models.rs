use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Raw bytes of one uploaded PDF plus the name it is displayed under.
#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl PdfUpload {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytes);
        format!("{:x}", hasher.finalize())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedDocument {
    pub name: String,
    pub text: String,
    pub pages_read: usize,
    pub pages_skipped: usize,
}

/// A bounded slice of document text prepared for embedding.
///
/// `start` and `end` are character offsets into the text the chunk was cut
/// from, so neighbouring chunks can be compared for overlap.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TextChunk {
    pub chunk_id: String,
    pub index: usize,
    pub document: Option<String>,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl TextChunk {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding(pub Vec<f32>);

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn dimensions(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn cosine_similarity(&self, other: &Embedding) -> f32 {
        let dot = self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum::<f32>();
        let left = self.0.iter().map(|value| value * value).sum::<f32>().sqrt();
        let right = other.0.iter().map(|value| value * value).sum::<f32>().sqrt();

        if left == 0.0 || right == 0.0 {
            0.0
        } else {
            dot / (left * right)
        }
    }

    pub fn l2_distance(&self, other: &Embedding) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b) * (a - b))
            .sum::<f32>()
            .sqrt()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: TextChunk,
    pub score: f32,
}

/// Result of a direct query: the model's answer and the passages it was given.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Answer {
    pub answer: String,
    pub source_chunks: Vec<TextChunk>,
}

/// One remembered question/answer turn of a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Exchange {
    pub question: String,
    pub answer: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Credentials {
    pub authenticated: bool,
    pub is_premium: bool,
}

pub(crate) fn make_chunk_id(document: Option<&str>, index: usize, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.unwrap_or_default().as_bytes());
    hasher.update((index as u64).to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
