use crate::embeddings::EmbeddingProvider;
use crate::error::{EmbeddingProviderError, SynthesisError};
use crate::llm::{LanguageModel, Prompt, PromptKind};
use crate::models::{make_chunk_id, Embedding, TextChunk};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

const KEYWORDS: [&str; 3] = ["refund", "shipping", "support"];

pub fn chunk(index: usize, text: &str) -> TextChunk {
    TextChunk {
        chunk_id: make_chunk_id(None, index, text),
        index,
        document: None,
        start: 0,
        end: text.chars().count(),
        text: text.to_string(),
    }
}

/// One dimension per keyword plus a constant bias dimension.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordEmbedder;

impl EmbeddingProvider for KeywordEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        let lowered = text.to_lowercase();
        let mut values: Vec<f32> = KEYWORDS
            .iter()
            .map(|keyword| lowered.matches(keyword).count() as f32)
            .collect();
        values.push(1.0);
        Ok(Embedding::new(values))
    }
}

/// Succeeds for a fixed number of calls, then rejects every request.
#[derive(Debug)]
pub struct FailingEmbedder {
    remaining: Cell<usize>,
}

impl FailingEmbedder {
    pub fn after(calls: usize) -> Self {
        Self {
            remaining: Cell::new(calls),
        }
    }
}

impl EmbeddingProvider for FailingEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        KeywordEmbedder.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        let remaining = self.remaining.get();
        if remaining == 0 {
            return Err(EmbeddingProviderError::Rejected {
                status: 401,
                details: "invalid api key".to_string(),
            });
        }
        self.remaining.set(remaining - 1);
        KeywordEmbedder.embed(text)
    }
}

/// Keyword embedder whose availability is toggled from the test.
#[derive(Debug, Clone, Default)]
pub struct SwitchableEmbedder {
    pub down: Rc<Cell<bool>>,
}

impl EmbeddingProvider for SwitchableEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        KeywordEmbedder.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        if self.down.get() {
            return Err(EmbeddingProviderError::MalformedResponse(
                "provider unreachable".to_string(),
            ));
        }
        KeywordEmbedder.embed(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VectorFault {
    #[default]
    Healthy,
    /// Every batch comes back one vector short.
    DropLast,
    /// Every vector carries one extra dimension.
    ExtraDimension,
}

/// Keyword embedder that can be told to return badly shaped output.
#[derive(Debug, Clone, Default)]
pub struct MisshapenEmbedder {
    pub fault: Rc<Cell<VectorFault>>,
}

impl EmbeddingProvider for MisshapenEmbedder {
    fn model_id(&self) -> &str {
        "keyword-test"
    }

    fn dimensions(&self) -> usize {
        KeywordEmbedder.dimensions()
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        let mut embedding = KeywordEmbedder.embed(text)?;
        if self.fault.get() == VectorFault::ExtraDimension {
            embedding.0.push(0.0);
        }
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingProviderError> {
        let mut embeddings = texts
            .iter()
            .map(|text| self.embed(text))
            .collect::<Result<Vec<_>, _>>()?;
        if self.fault.get() == VectorFault::DropLast {
            embeddings.pop();
        }
        Ok(embeddings)
    }
}

/// Records every prompt and answers by quoting the first context passage.
#[derive(Debug, Clone, Default)]
pub struct RecordingModel {
    pub prompts: Rc<RefCell<Vec<Prompt>>>,
    pub fail: Rc<Cell<bool>>,
}

impl LanguageModel for RecordingModel {
    fn complete(&self, prompt: &Prompt) -> Result<String, SynthesisError> {
        self.prompts.borrow_mut().push(prompt.clone());
        if self.fail.get() {
            return Err(SynthesisError::RateLimited("slow down".to_string()));
        }

        match prompt.kind {
            PromptKind::CondenseQuestion => Ok(format!("standalone: {}", prompt.question)),
            PromptKind::Answer => match prompt.context.first() {
                Some(passage) => Ok(format!("According to the documents: {passage}")),
                None => Ok("I don't know.".to_string()),
            },
        }
    }
}

/// Builds a PDF with one page per entry; empty entries make blank pages.
pub fn pdf_with_pages(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let operations = if text.is_empty() {
            Vec::new()
        } else {
            vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ]
        };
        let content = Content { operations };
        let encoded = content.encode().expect("content stream should encode");
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf should serialize");
    bytes
}
