use crate::embeddings::EmbeddingProvider;
use crate::error::SynthesisError;
use crate::index::VectorIndex;
use crate::llm::{LanguageModel, Prompt};
use crate::models::{Answer, Exchange, ScoredChunk, TextChunk};
use crate::retriever::Retriever;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Stateless question answering: retrieve for the question alone, then answer.
pub struct AnswerSynthesizer<'a, P, L>
where
    P: EmbeddingProvider + ?Sized,
    L: LanguageModel + ?Sized,
{
    retriever: Retriever<'a, P>,
    model: &'a L,
}

impl<'a, P, L> AnswerSynthesizer<'a, P, L>
where
    P: EmbeddingProvider + ?Sized,
    L: LanguageModel + ?Sized,
{
    pub fn new(retriever: Retriever<'a, P>, model: &'a L) -> Self {
        Self { retriever, model }
    }

    pub fn answer_direct(&self, index: &VectorIndex, question: &str) -> Result<Answer, SynthesisError> {
        let hits = self.retriever.retrieve(index, question)?;
        let answer = self.model.complete(&Prompt::answer(question, &hits, &[]))?;

        Ok(Answer {
            answer: answer.trim().to_string(),
            source_chunks: hits.into_iter().map(|hit| hit.chunk).collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ChainState {
    Idle,
    Retrieving,
    Synthesizing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationConfig {
    /// Rewrite follow-ups into standalone questions before retrieving.
    pub condense_question: bool,
    /// How many recent exchanges are folded into prompts.
    pub history_window: usize,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            condense_question: true,
            history_window: 10,
        }
    }
}

#[derive(Debug)]
pub struct ConversationalAnswer<'m> {
    pub answer: String,
    pub source_chunks: Vec<TextChunk>,
    pub history: &'m [Exchange],
}

/// Multi-turn question answering with a running memory of exchanges.
///
/// Memory only grows when a turn completes; a failed turn leaves it as it was
/// and the chain back in `Idle`.
#[derive(Debug, Clone)]
pub struct ConversationalChain {
    config: ConversationConfig,
    memory: Vec<Exchange>,
    state: ChainState,
}

impl ConversationalChain {
    pub fn new(config: ConversationConfig) -> Self {
        Self {
            config,
            memory: Vec::new(),
            state: ChainState::Idle,
        }
    }

    pub fn state(&self) -> ChainState {
        self.state
    }

    pub fn memory(&self) -> &[Exchange] {
        &self.memory
    }

    pub fn clear(&mut self) {
        self.memory.clear();
        self.state = ChainState::Idle;
    }

    pub fn ask<P, L>(
        &mut self,
        retriever: &Retriever<'_, P>,
        model: &L,
        index: &VectorIndex,
        question: &str,
    ) -> Result<ConversationalAnswer<'_>, SynthesisError>
    where
        P: EmbeddingProvider + ?Sized,
        L: LanguageModel + ?Sized,
    {
        let outcome = self.run(retriever, model, index, question);
        self.transition(ChainState::Idle);
        let (answer, hits) = outcome?;

        self.memory.push(Exchange {
            question: question.to_string(),
            answer: answer.clone(),
        });

        Ok(ConversationalAnswer {
            answer,
            source_chunks: hits.into_iter().map(|hit| hit.chunk).collect(),
            history: &self.memory,
        })
    }

    fn run<P, L>(
        &mut self,
        retriever: &Retriever<'_, P>,
        model: &L,
        index: &VectorIndex,
        question: &str,
    ) -> Result<(String, Vec<ScoredChunk>), SynthesisError>
    where
        P: EmbeddingProvider + ?Sized,
        L: LanguageModel + ?Sized,
    {
        let skip = self.memory.len().saturating_sub(self.config.history_window);
        let window = self.memory[skip..].to_vec();

        self.transition(ChainState::Retrieving);
        let search_query = if self.config.condense_question && !window.is_empty() {
            let condensed = model.complete(&Prompt::condense(question, &window))?;
            let condensed = condensed.trim();
            if condensed.is_empty() {
                question.to_string()
            } else {
                condensed.to_string()
            }
        } else {
            question.to_string()
        };
        let hits = retriever.retrieve(index, &search_query)?;

        self.transition(ChainState::Synthesizing);
        let answer = model.complete(&Prompt::answer(question, &hits, &window))?;
        Ok((answer.trim().to_string(), hits))
    }

    fn transition(&mut self, next: ChainState) {
        debug!(from = ?self.state, to = ?next, "conversation chain state");
        self.state = next;
    }
}

impl Default for ConversationalChain {
    fn default() -> Self {
        Self::new(ConversationConfig::default())
    }
}
