use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("model API answered {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: String,
}

impl ModelMessage {
    pub fn new<T: Into<String>>(role: ModelRole, content: T) -> Self {
        Self { role, content: content.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub temperature: f32,
    pub max_tokens: u32,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    /// Ask the API for a single JSON object instead of free text.
    pub json_object: bool,
}

pub const CHAT_SAMPLING: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: 500,
    presence_penalty: 0.1,
    frequency_penalty: 0.1,
    json_object: false,
};

pub const ASSESSMENT_SAMPLING: Sampling = Sampling {
    temperature: 0.3,
    max_tokens: 2000,
    presence_penalty: 0.0,
    frequency_penalty: 0.0,
    json_object: true,
};

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ModelMessage>,
    pub sampling: Sampling,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Returns the text of the first choice. Empty or missing content is an error.
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// Client for any OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiClient {
    http: reqwest::Client,
    config: LlmConfig,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: &'a [ModelMessage],
    temperature: f32,
    max_tokens: u32,
    presence_penalty: f32,
    frequency_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    choices: Vec<WireChoice>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireMessage,
}

#[derive(Deserialize)]
struct WireMessage {
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { http, config })
    }

    fn body<'a>(&'a self, request: &'a CompletionRequest) -> WireRequest<'a> {
        let s = request.sampling;
        WireRequest {
            model: &self.config.model,
            messages: &request.messages,
            temperature: s.temperature,
            max_tokens: s.max_tokens,
            presence_penalty: s.presence_penalty,
            frequency_penalty: s.frequency_penalty,
            response_format: s
                .json_object
                .then(|| serde_json::json!({ "type": "json_object" })),
        }
    }
}

fn first_content(response: WireResponse) -> Result<String, LlmError> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(LlmError::EmptyResponse)
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.config.base_url);
        tracing::debug!(
            model = %self.config.model,
            messages = request.messages.len(),
            "calling language model"
        );
        let res = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&self.body(&request))
            .send()
            .await?;

        let status = res.status();
        if status != reqwest::StatusCode::OK {
            let body = res.text().await.unwrap_or_default();
            return Err(LlmError::Status { status: status.as_u16(), body });
        }
        first_content(res.json::<WireResponse>().await?)
    }
}
