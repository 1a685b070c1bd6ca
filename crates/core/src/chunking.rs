use crate::error::SessionError;
use crate::extractor::DocumentBoundary;
use crate::models::{make_chunk_id, ExtractedDocument, TextChunk};
use regex::Regex;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CHUNK_SIZE: usize = 1_000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Separator {
    Literal(String),
    Pattern(String),
}

impl Default for Separator {
    fn default() -> Self {
        Self::Literal("\n".to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub separator: Separator,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            separator: Separator::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

/// Cuts text into overlapping chunks, preferring separator boundaries.
///
/// Sizes are counted in characters. A chunk starting at `s` ends at the
/// furthest separator boundary in `(s + overlap, s + size]`, or is hard-cut at
/// `s + size` when there is none. The next chunk starts `overlap` characters
/// before the previous end, so stripping the first `overlap` characters of
/// every chunk after the first and concatenating gives back the input.
#[derive(Debug, Clone)]
pub struct TextSplitter {
    config: ChunkingConfig,
    pattern: Option<Regex>,
}

impl TextSplitter {
    pub fn new(config: ChunkingConfig) -> Result<Self, SessionError> {
        if config.chunk_size == 0 {
            return Err(SessionError::InvalidChunkConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if config.chunk_overlap >= config.chunk_size {
            return Err(SessionError::InvalidChunkConfig(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                config.chunk_overlap, config.chunk_size
            )));
        }

        let pattern = match &config.separator {
            Separator::Literal(literal) if literal.is_empty() => {
                return Err(SessionError::InvalidChunkConfig(
                    "separator is empty".to_string(),
                ));
            }
            Separator::Literal(_) => None,
            Separator::Pattern(source) => {
                let regex = Regex::new(source)
                    .map_err(|error| SessionError::InvalidChunkConfig(error.to_string()))?;
                if regex.is_match("") {
                    return Err(SessionError::InvalidChunkConfig(format!(
                        "separator pattern {source:?} matches the empty string"
                    )));
                }
                Some(regex)
            }
        };

        Ok(Self { config, pattern })
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    pub fn split(&self, text: &str, document: Option<&str>, first_index: usize) -> Vec<TextChunk> {
        // byte offset of every char, plus the end of the text
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(position, _)| position)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;
        if total == 0 {
            return Vec::new();
        }

        let boundaries = self.boundaries(text, &offsets);
        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        let mut chunks = Vec::new();
        let mut start = 0;
        loop {
            let limit = start + size;
            let end = if limit >= total {
                total
            } else {
                let upper = boundaries.partition_point(|&boundary| boundary <= limit);
                match boundaries[..upper].last() {
                    Some(&boundary) if boundary > start + overlap => boundary,
                    _ => limit,
                }
            };

            let index = first_index + chunks.len();
            let piece = &text[offsets[start]..offsets[end]];
            chunks.push(TextChunk {
                chunk_id: make_chunk_id(document, index, piece),
                index,
                document: document.map(str::to_string),
                start,
                end,
                text: piece.to_string(),
            });

            if end == total {
                break;
            }
            start = end - overlap;
        }

        chunks
    }

    /// Character positions directly after each separator match.
    fn boundaries(&self, text: &str, offsets: &[usize]) -> Vec<usize> {
        let byte_ends: Vec<usize> = match (&self.pattern, &self.config.separator) {
            (Some(regex), _) => regex.find_iter(text).map(|found| found.end()).collect(),
            (None, Separator::Literal(literal)) => text
                .match_indices(literal.as_str())
                .map(|(position, matched)| position + matched.len())
                .collect(),
            (None, Separator::Pattern(_)) => Vec::new(),
        };

        let mut positions: Vec<usize> = byte_ends
            .into_iter()
            .filter_map(|byte| offsets.binary_search(&byte).ok())
            .collect();
        positions.dedup();
        positions
    }
}

pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<TextChunk>, SessionError> {
    Ok(TextSplitter::new(config)?.split(text, None, 0))
}

/// Chunks extracted documents according to the boundary policy.
pub fn chunk_documents(
    documents: &[ExtractedDocument],
    boundary: DocumentBoundary,
    config: ChunkingConfig,
) -> Result<Vec<TextChunk>, SessionError> {
    let splitter = TextSplitter::new(config)?;

    match boundary {
        DocumentBoundary::Concatenate => {
            let text: String = documents.iter().map(|document| document.text.as_str()).collect();
            Ok(splitter.split(&text, None, 0))
        }
        DocumentBoundary::Isolate => {
            let mut chunks = Vec::new();
            for document in documents {
                let next = splitter.split(&document.text, Some(&document.name), chunks.len());
                chunks.extend(next);
            }
            Ok(chunks)
        }
    }
}
