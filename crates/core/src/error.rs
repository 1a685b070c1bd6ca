use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error in {document}: {details}")]
    PdfParse { document: String, details: String },

    #[error("no readable text in any uploaded document")]
    NoText,
}

#[derive(Debug, Error)]
pub enum EmbeddingProviderError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("embedding provider rejected the request ({status}): {details}")]
    Rejected { status: u16, details: String },

    #[error("embedding provider rate limit: {0}")]
    RateLimited(String),

    #[error("malformed embedding response: {0}")]
    MalformedResponse(String),

    #[error("embedding count {actual} doesn't match input count {expected}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("embedding dimension {actual} != {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("index was built with {indexed} but the query embedder is {query}")]
    ModelMismatch { indexed: String, query: String },
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("retrieval failed: {0}")]
    Retrieval(#[from] EmbeddingProviderError),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("language model rejected the request ({status}): {details}")]
    Rejected { status: u16, details: String },

    #[error("language model rate limit: {0}")]
    RateLimited(String),

    #[error("malformed language model response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no document index yet: upload at least one pdf first")]
    EmptyIndex,

    #[error("question is empty")]
    EmptyQuestion,

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingProviderError),

    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no pdf files found in {0}")]
    NoPdfs(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("stored password hash is unreadable: {0}")]
    CorruptHash(String),
}

pub type Result<T, E = SessionError> = std::result::Result<T, E>;
