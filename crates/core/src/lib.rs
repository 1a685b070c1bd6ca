pub mod auth;
pub mod chunking;
pub mod conversation;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod models;
pub mod providers;
pub mod retriever;
pub mod session;
pub mod synthesis;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{CredentialStore, SqliteUserStore};
pub use chunking::{chunk_documents, split_text, ChunkingConfig, Separator, TextSplitter};
pub use conversation::{ConversationState, Message};
pub use embeddings::{CharacterNgramEmbedder, EmbeddingProvider, DEFAULT_EMBEDDING_DIMENSIONS};
pub use error::{
    AuthError, EmbeddingProviderError, ExtractionError, IngestError, SessionError, SynthesisError,
};
pub use extractor::{
    extract_documents, DocumentBoundary, ExtractionReport, LopdfExtractor, PageText, PdfExtractor,
    SkippedDocument,
};
pub use index::{DistanceMetric, IndexConfig, VectorIndex};
pub use ingest::{discover_pdf_files, load_folder, load_upload, load_uploads};
pub use llm::{LanguageModel, Prompt, PromptKind};
pub use models::{
    Answer, Credentials, Embedding, Exchange, ExtractedDocument, PdfUpload, ScoredChunk, TextChunk,
};
pub use providers::{OpenAiChat, OpenAiEmbeddings};
pub use retriever::{Retriever, DEFAULT_TOP_K};
pub use session::{Session, SessionConfig, UploadReport};
pub use synthesis::{
    AnswerSynthesizer, ChainState, ConversationConfig, ConversationalAnswer, ConversationalChain,
};
