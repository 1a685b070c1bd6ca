use crate::error::SynthesisError;
use crate::models::{Exchange, ScoredChunk};
use serde::{Deserialize, Serialize};

const ANSWER_INSTRUCTIONS: &str = "Answer the question using only the document passages \
below. If the passages do not contain the answer, say that you don't know instead of \
making one up.";

const CONDENSE_INSTRUCTIONS: &str = "Rewrite the follow-up question so it can be \
understood without the conversation before it. Reply with the rewritten question only.";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PromptKind {
    Answer,
    CondenseQuestion,
}

/// Everything a language model needs for one completion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prompt {
    pub kind: PromptKind,
    pub instructions: String,
    pub context: Vec<String>,
    pub history: Vec<Exchange>,
    pub question: String,
}

impl Prompt {
    pub fn answer(question: &str, context: &[ScoredChunk], history: &[Exchange]) -> Self {
        Self {
            kind: PromptKind::Answer,
            instructions: ANSWER_INSTRUCTIONS.to_string(),
            context: context.iter().map(|hit| hit.chunk.text.clone()).collect(),
            history: history.to_vec(),
            question: question.to_string(),
        }
    }

    pub fn condense(question: &str, history: &[Exchange]) -> Self {
        Self {
            kind: PromptKind::CondenseQuestion,
            instructions: CONDENSE_INSTRUCTIONS.to_string(),
            context: Vec::new(),
            history: history.to_vec(),
            question: question.to_string(),
        }
    }

    /// Flattens the prompt into a single text block for completion-style models.
    pub fn render(&self) -> String {
        let mut text = String::new();
        text.push_str(&self.instructions);
        text.push_str("\n\n");

        if !self.context.is_empty() {
            text.push_str("Passages:\n");
            for (position, passage) in self.context.iter().enumerate() {
                text.push_str(&format!("[{}] {}\n", position + 1, passage.trim()));
            }
            text.push('\n');
        }

        if !self.history.is_empty() {
            text.push_str("Conversation so far:\n");
            for exchange in &self.history {
                text.push_str(&format!("Human: {}\nAssistant: {}\n", exchange.question, exchange.answer));
            }
            text.push('\n');
        }

        match self.kind {
            PromptKind::Answer => text.push_str(&format!("Question: {}\nAnswer:", self.question)),
            PromptKind::CondenseQuestion => {
                text.push_str(&format!("Follow-up question: {}\nStandalone question:", self.question))
            }
        }
        text
    }
}

/// A blocking language-model round trip. Implementations do not retry.
pub trait LanguageModel {
    fn complete(&self, prompt: &Prompt) -> Result<String, SynthesisError>;
}

impl<L: LanguageModel + ?Sized> LanguageModel for &L {
    fn complete(&self, prompt: &Prompt) -> Result<String, SynthesisError> {
        (**self).complete(prompt)
    }
}
