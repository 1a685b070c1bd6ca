use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::conversation::{ConversationState, Message};
use crate::embeddings::EmbeddingProvider;
use crate::error::{Result, SessionError};
use crate::extractor::{extract_documents, DocumentBoundary, LopdfExtractor, PdfExtractor, SkippedDocument};
use crate::index::{IndexConfig, VectorIndex};
use crate::llm::LanguageModel;
use crate::models::{Exchange, ExtractedDocument, PdfUpload};
use crate::retriever::{Retriever, DEFAULT_TOP_K};
use crate::synthesis::{AnswerSynthesizer, ChainState, ConversationConfig, ConversationalChain};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionConfig {
    pub chunking: ChunkingConfig,
    pub boundary: DocumentBoundary,
    pub index: IndexConfig,
    pub top_k: usize,
    pub conversation: ConversationConfig,
    /// Attach retrieved chunks to conversational answers as well.
    pub cite_conversational_sources: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkingConfig::default(),
            boundary: DocumentBoundary::default(),
            index: IndexConfig::default(),
            top_k: DEFAULT_TOP_K,
            conversation: ConversationConfig::default(),
            cite_conversational_sources: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadReport {
    pub documents: Vec<ExtractedDocument>,
    pub skipped: Vec<SkippedDocument>,
    pub chunk_count: usize,
}

/// One user's documents and conversation.
///
/// Every request runs to completion through `&mut self`. A new index is
/// built into a local value and only replaces the current one once it is
/// complete, so a failed upload leaves the previous index answering.
pub struct Session<E, L, X = LopdfExtractor> {
    id: Uuid,
    config: SessionConfig,
    embedder: E,
    model: L,
    extractor: X,
    index: Option<VectorIndex>,
    chain: ConversationalChain,
    conversation: ConversationState,
}

impl<E, L> Session<E, L>
where
    E: EmbeddingProvider,
    L: LanguageModel,
{
    pub fn new(embedder: E, model: L, config: SessionConfig) -> Self {
        Self::with_extractor(embedder, model, LopdfExtractor, config)
    }
}

impl<E, L, X> Session<E, L, X>
where
    E: EmbeddingProvider,
    L: LanguageModel,
    X: PdfExtractor,
{
    pub fn with_extractor(embedder: E, model: L, extractor: X, config: SessionConfig) -> Self {
        let chain = ConversationalChain::new(config.conversation.clone());
        Self {
            id: Uuid::new_v4(),
            config,
            embedder,
            model,
            extractor,
            index: None,
            chain,
            conversation: ConversationState::new(),
        }
    }

    /// Extracts, chunks and indexes the uploads, then swaps the new index in.
    #[instrument(skip(self, uploads), fields(session = %self.id, uploads = uploads.len()))]
    pub fn upload(&mut self, uploads: &[PdfUpload]) -> Result<UploadReport> {
        let extraction = extract_documents(&self.extractor, uploads)?;
        let chunks = chunk_documents(
            &extraction.documents,
            self.config.boundary,
            self.config.chunking.clone(),
        )?;
        info!(chunk_count = chunks.len(), "chunked documents");

        let index = VectorIndex::build(&self.embedder, chunks, &self.config.index).map_err(|error| {
            warn!(reason = %error, "indexing failed, keeping previous index");
            error
        })?;

        let chunk_count = index.len();
        self.index = Some(index);
        info!(
            documents = extraction.documents.len(),
            skipped = extraction.skipped.len(),
            chunk_count,
            "index replaced"
        );

        Ok(UploadReport {
            documents: extraction.documents,
            skipped: extraction.skipped,
            chunk_count,
        })
    }

    /// Conversational query: answers with the running conversation in mind.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn ask(&mut self, question: &str) -> Result<&[Message]> {
        let question = non_empty(question)?;
        let index = self.index.as_ref().ok_or(SessionError::EmptyIndex)?;
        let retriever = Retriever::new(&self.embedder, self.config.top_k);

        let turn = self.chain.ask(&retriever, &self.model, index, question)?;
        let answer = turn.answer;
        let sources = self
            .config
            .cite_conversational_sources
            .then_some(turn.source_chunks);

        Ok(self.conversation.append_exchange(question, answer, sources))
    }

    /// Direct query: answers from the question and retrieved passages only,
    /// and always attaches the passages to the bot message.
    #[instrument(skip(self), fields(session = %self.id))]
    pub fn query_direct(&mut self, question: &str) -> Result<&[Message]> {
        let question = non_empty(question)?;
        let index = self.index.as_ref().ok_or(SessionError::EmptyIndex)?;
        let synthesizer = AnswerSynthesizer::new(
            Retriever::new(&self.embedder, self.config.top_k),
            &self.model,
        );

        let answer = synthesizer.answer_direct(index, question)?;
        Ok(self
            .conversation
            .append_exchange(question, answer.answer, Some(answer.source_chunks)))
    }

    /// Clears the conversation log and memory; the index stays.
    pub fn reset(&mut self) {
        self.conversation.reset();
        self.chain.clear();
        info!(session = %self.id, "conversation reset");
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn conversation(&self) -> &ConversationState {
        &self.conversation
    }

    pub fn history(&self) -> &[Exchange] {
        self.chain.memory()
    }

    pub fn chain_state(&self) -> ChainState {
        self.chain.state()
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn indexed_chunks(&self) -> usize {
        self.index.as_ref().map_or(0, VectorIndex::len)
    }
}

fn non_empty(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        Err(SessionError::EmptyQuestion)
    } else {
        Ok(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{EmbeddingProviderError, ExtractionError, SynthesisError};
    use crate::test_support::{
        pdf_with_pages, KeywordEmbedder, MisshapenEmbedder, RecordingModel, SwitchableEmbedder,
        VectorFault,
    };

    fn policy_pdf() -> PdfUpload {
        PdfUpload::new(
            "policy.pdf",
            pdf_with_pages(&["Refunds are processed within 30 days", "Shipping is free"]),
        )
    }

    fn session() -> (Session<KeywordEmbedder, RecordingModel>, RecordingModel) {
        let model = RecordingModel::default();
        let session = Session::new(KeywordEmbedder, model.clone(), SessionConfig::default());
        (session, model)
    }

    #[test]
    fn direct_query_cites_the_refund_passage() {
        let (mut session, _model) = session();
        let report = session.upload(&[policy_pdf()]).unwrap();
        assert_eq!(report.documents.len(), 1);
        assert!(report.chunk_count >= 1);

        let pair = session.query_direct("What is the refund policy?").unwrap();

        assert_eq!(pair.len(), 2);
        assert_eq!(pair[0].content(), "What is the refund policy?");
        let sources = pair[1].source_chunks().expect("direct answers carry sources");
        assert!(sources[0].text.contains("Refunds are processed within 30 days"));
        assert!(pair[1].content().contains("Refunds are processed within 30 days"));
    }

    #[test]
    fn queries_before_upload_report_empty_index() {
        let (mut session, _model) = session();

        assert!(matches!(session.ask("hello?"), Err(SessionError::EmptyIndex)));
        assert!(matches!(
            session.query_direct("hello?"),
            Err(SessionError::EmptyIndex)
        ));
        assert!(session.messages().is_empty());
    }

    #[test]
    fn failed_upload_keeps_previous_index_answering() {
        let embedder = SwitchableEmbedder::default();
        let down = embedder.down.clone();
        let mut session = Session::new(embedder, RecordingModel::default(), SessionConfig::default());
        session.upload(&[policy_pdf()]).unwrap();
        let indexed = session.index().map(VectorIndex::len);

        down.set(true);
        let other = PdfUpload::new("support.pdf", pdf_with_pages(&["Support answers email"]));
        let failed = session.upload(&[other]);
        assert!(matches!(
            failed,
            Err(SessionError::Embedding(EmbeddingProviderError::MalformedResponse(_)))
        ));

        down.set(false);
        assert_eq!(session.index().map(VectorIndex::len), indexed);
        let pair = session.query_direct("refund?").unwrap();
        let sources = pair[1].source_chunks().unwrap();
        assert!(sources[0].text.contains("Refunds"));
    }

    #[test]
    fn unreadable_upload_reports_extraction_error() {
        let (mut session, _model) = session();
        let broken = PdfUpload::new("broken.pdf", b"%PDF-1.4\n%broken".to_vec());

        let result = session.upload(&[broken]);

        assert!(matches!(
            result,
            Err(SessionError::Extraction(ExtractionError::NoText))
        ));
        assert!(!session.has_index());
        assert_eq!(session.indexed_chunks(), 0);
    }

    #[test]
    fn failed_query_leaves_log_untouched() {
        let (mut session, model) = session();
        session.upload(&[policy_pdf()]).unwrap();
        session.ask("How do refunds work?").unwrap();
        let before = session.messages().to_vec();

        model.fail.set(true);
        let result = session.ask("And shipping?");

        assert!(matches!(
            result,
            Err(SessionError::Synthesis(SynthesisError::RateLimited(_)))
        ));
        assert_eq!(session.messages(), before.as_slice());
        assert_eq!(session.history().len(), 1);
        assert_eq!(session.chain_state(), ChainState::Idle);
    }

    #[test]
    fn conversational_answers_skip_citations_by_default() {
        let (mut session, _model) = session();
        session.upload(&[policy_pdf()]).unwrap();

        let pair = session.ask("How do refunds work?").unwrap();
        assert!(pair[1].source_chunks().is_none());
    }

    #[test]
    fn conversational_citations_can_be_enabled() {
        let config = SessionConfig {
            cite_conversational_sources: true,
            ..SessionConfig::default()
        };
        let mut session = Session::new(KeywordEmbedder, RecordingModel::default(), config);
        session.upload(&[policy_pdf()]).unwrap();

        let pair = session.ask("How do refunds work?").unwrap();
        assert!(pair[1].source_chunks().is_some_and(|chunks| !chunks.is_empty()));
    }

    #[test]
    fn direct_query_ignores_earlier_turns() {
        let (mut session, model) = session();
        session.upload(&[policy_pdf()]).unwrap();
        session.ask("How do refunds work?").unwrap();

        session.query_direct("What about shipping?").unwrap();

        let prompts = model.prompts.borrow();
        let last = prompts.last().unwrap();
        assert!(last.history.is_empty());
        assert_eq!(last.question, "What about shipping?");
        assert_eq!(session.messages().len(), 4);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn blank_questions_are_rejected() {
        let (mut session, _model) = session();
        session.upload(&[policy_pdf()]).unwrap();
        assert!(matches!(session.ask("   "), Err(SessionError::EmptyQuestion)));
    }

    #[test]
    fn reset_twice_equals_reset_once() {
        let (mut session, _model) = session();
        session.upload(&[policy_pdf()]).unwrap();
        session.ask("How do refunds work?").unwrap();

        session.reset();
        assert!(session.messages().is_empty());
        assert!(session.history().is_empty());
        session.reset();
        assert!(session.messages().is_empty());
        assert!(session.has_index());
    }

    #[test]
    fn misshapen_provider_output_keeps_previous_index() {
        let embedder = MisshapenEmbedder::default();
        let fault = embedder.fault.clone();
        let mut session = Session::new(embedder, RecordingModel::default(), SessionConfig::default());
        session.upload(&[policy_pdf()]).unwrap();
        let indexed = session.indexed_chunks();
        let other = PdfUpload::new("support.pdf", pdf_with_pages(&["Support answers email"]));

        fault.set(VectorFault::DropLast);
        assert!(matches!(
            session.upload(&[other.clone()]),
            Err(SessionError::Embedding(EmbeddingProviderError::CountMismatch { .. }))
        ));

        fault.set(VectorFault::ExtraDimension);
        assert!(matches!(
            session.upload(&[other]),
            Err(SessionError::Embedding(EmbeddingProviderError::DimensionMismatch { .. }))
        ));

        fault.set(VectorFault::Healthy);
        assert_eq!(session.indexed_chunks(), indexed);
        let pair = session.query_direct("refund?").unwrap();
        assert!(pair[1].source_chunks().unwrap()[0].text.contains("Refunds"));
    }
}
