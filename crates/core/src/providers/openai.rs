use crate::embeddings::EmbeddingProvider;
use crate::error::{EmbeddingProviderError, SynthesisError};
use crate::llm::{LanguageModel, Prompt, PromptKind};
use crate::models::Embedding;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Joins `path` onto `base`, keeping any path prefix such as `/v1`.
fn endpoint(base: &str, path: &str) -> Result<Url, url::ParseError> {
    let base = format!("{}/", base.trim_end_matches('/'));
    Url::parse(&base)?.join(path)
}

fn authorized(request: RequestBuilder, api_key: Option<&str>) -> RequestBuilder {
    match api_key {
        Some(key) => request.bearer_auth(key),
        None => request,
    }
}

/// Embeddings over an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbeddings {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddings {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, EmbeddingProviderError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint(base_url, "embeddings")?,
            api_key,
            model: model.into(),
            dimensions,
        })
    }
}

impl EmbeddingProvider for OpenAiEmbeddings {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str) -> Result<Embedding, EmbeddingProviderError> {
        let mut embeddings = self.embed_batch(&[text])?;
        embeddings
            .pop()
            .ok_or_else(|| EmbeddingProviderError::MalformedResponse("no embedding returned".to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = self.client.post(self.endpoint.clone()).json(&EmbeddingRequest {
            model: &self.model,
            input: texts,
        });
        let response = authorized(request, self.api_key.as_deref()).send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                EmbeddingProviderError::RateLimited(body)
            } else {
                EmbeddingProviderError::Rejected {
                    status: status.as_u16(),
                    details: body,
                }
            });
        }

        debug!(model = %self.model, count = texts.len(), "embedding batch returned");
        parse_embedding_response(&body, texts.len())
    }
}

fn parse_embedding_response(body: &str, expected: usize) -> Result<Vec<Embedding>, EmbeddingProviderError> {
    let mut payload: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|error| EmbeddingProviderError::MalformedResponse(error.to_string()))?;

    if payload.data.len() != expected {
        return Err(EmbeddingProviderError::CountMismatch {
            expected,
            actual: payload.data.len(),
        });
    }

    payload.data.sort_by_key(|datum| datum.index);
    Ok(payload
        .data
        .into_iter()
        .map(|datum| Embedding::new(datum.embedding))
        .collect())
}

/// Chat completions over an OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChat {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiChat {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Result<Self, SynthesisError> {
        Ok(Self {
            client: Client::new(),
            endpoint: endpoint(base_url, "chat/completions")?,
            api_key,
            model: model.into(),
            temperature,
        })
    }
}

impl LanguageModel for OpenAiChat {
    fn complete(&self, prompt: &Prompt) -> Result<String, SynthesisError> {
        let request = self.client.post(self.endpoint.clone()).json(&ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            messages: prompt_messages(prompt),
        });
        let response = authorized(request, self.api_key.as_deref()).send()?;

        let status = response.status();
        let body = response.text()?;
        if !status.is_success() {
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                SynthesisError::RateLimited(body)
            } else {
                SynthesisError::Rejected {
                    status: status.as_u16(),
                    details: body,
                }
            });
        }

        parse_chat_response(&body)
    }
}

fn prompt_messages(prompt: &Prompt) -> Vec<ChatMessage> {
    let mut system = prompt.instructions.clone();
    if !prompt.context.is_empty() {
        system.push_str("\n\nPassages:");
        for (position, passage) in prompt.context.iter().enumerate() {
            system.push_str(&format!("\n[{}] {}", position + 1, passage.trim()));
        }
    }

    let mut messages = vec![ChatMessage {
        role: "system",
        content: system,
    }];
    for exchange in &prompt.history {
        messages.push(ChatMessage {
            role: "user",
            content: exchange.question.clone(),
        });
        messages.push(ChatMessage {
            role: "assistant",
            content: exchange.answer.clone(),
        });
    }

    let question = match prompt.kind {
        PromptKind::Answer => prompt.question.clone(),
        PromptKind::CondenseQuestion => format!("Follow-up question: {}", prompt.question),
    };
    messages.push(ChatMessage {
        role: "user",
        content: question,
    });
    messages
}

fn parse_chat_response(body: &str) -> Result<String, SynthesisError> {
    let payload: ChatResponse = serde_json::from_str(body)
        .map_err(|error| SynthesisError::MalformedResponse(error.to_string()))?;

    payload
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| SynthesisError::MalformedResponse("response has no message content".to_string()))
}
