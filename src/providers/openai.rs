use async_trait::async_trait;
use log::{debug, error};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ProviderError;
use crate::translation::response::strip_think_tags;

use super::{Provider, TranslateRequest};

/// Default endpoint when the task does not carry one
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/";

/// Extra instruction for Markdown sources
pub const MARKDOWN_INSTRUCTION: &str = "\n请保持Markdown格式不变，只翻译文本内容。";

/// OpenAI-compatible chat completion client
pub struct OpenAI {
    /// HTTP client for API requests
    client: Client,
    /// API key for authentication
    api_key: String,
    /// Base URL, always ending with `/v1/`
    endpoint: String,
    /// Sampling temperature
    temperature: f32,
}

impl std::fmt::Debug for OpenAI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAI")
            .field("endpoint", &self.endpoint)
            .field("temperature", &self.temperature)
            .finish()
    }
}

/// Chat completion request
#[derive(Debug, Serialize)]
pub struct OpenAIRequest {
    /// The model to use
    model: String,

    /// The messages for the conversation
    messages: Vec<OpenAIMessage>,

    /// Temperature for generation
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,

    /// Maximum number of tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

/// Chat message format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct OpenAIMessage {
    /// Role of the message sender (system, user, assistant)
    pub role: String,

    /// Content of the message
    #[serde(default)]
    pub content: Option<String>,
}

/// Chat completion response
#[derive(Debug, Deserialize)]
pub struct OpenAIResponse {
    /// Generated choices
    pub choices: Vec<OpenAIChoice>,
    /// Token usage information
    #[serde(default)]
    pub usage: Option<TokenUsage>,
}

/// Single choice of a chat completion
#[derive(Debug, Deserialize)]
pub struct OpenAIChoice {
    pub message: OpenAIMessage,
}

/// Token usage information
#[derive(Debug, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Error envelope returned by compatible servers
#[derive(Debug, Deserialize)]
struct OpenAIErrorBody {
    error: OpenAIErrorDetail,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorDetail {
    message: String,
}

impl OpenAIRequest {
    /// Create a new chat request
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            temperature: None,
            max_tokens: None,
        }
    }

    /// Add a message to the request
    pub fn add_message(mut self, role: impl Into<String>, content: impl Into<String>) -> Self {
        self.messages.push(OpenAIMessage {
            role: role.into(),
            content: Some(content.into()),
        });
        self
    }

    /// Set the temperature
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set the maximum completion tokens
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Make sure the base URL ends with `/v1/`
pub fn normalize_endpoint(endpoint: &str) -> String {
    let trimmed = endpoint.trim();
    if trimmed.is_empty() {
        return DEFAULT_OPENAI_ENDPOINT.to_string();
    }
    let base = trimmed.trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{}/", base)
    } else {
        format!("{}/v1/", base)
    }
}

impl OpenAI {
    /// Create a new client
    pub fn new(api_key: impl Into<String>, endpoint: impl AsRef<str>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs.max(1)))
                .build()
                .unwrap_or_default(),
            api_key: api_key.into(),
            endpoint: normalize_endpoint(endpoint.as_ref()),
            temperature: 0.7,
        }
    }

    /// Override the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send a chat completion request
    pub async fn complete(&self, request: OpenAIRequest) -> Result<OpenAIResponse, ProviderError> {
        let api_url = format!("{}chat/completions", self.endpoint);

        let response = self
            .client
            .post(&api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            let message = serde_json::from_str::<OpenAIErrorBody>(&error_text)
                .map(|body| body.error.message)
                .unwrap_or(error_text);
            error!("OpenAI API error ({}): {}", status, message);
            return Err(ProviderError::from_status(status.as_u16(), message));
        }

        response
            .json::<OpenAIResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    /// Extract text from a chat completion response
    pub fn extract_text_from_response(response: &OpenAIResponse) -> String {
        response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default()
    }

    /// Build the chat request for one translation call
    pub fn build_request(&self, request: &TranslateRequest) -> OpenAIRequest {
        let mut instruction = request.instruction.clone();
        if request.extension == "md" {
            instruction.push_str(MARKDOWN_INSTRUCTION);
        }
        OpenAIRequest::new(&request.model)
            .add_message("system", instruction)
            .add_message("user", &request.text)
            .temperature(self.temperature)
    }
}

#[async_trait]
impl Provider for OpenAI {
    fn name(&self) -> &str {
        "openai"
    }

    async fn translate(&self, request: &TranslateRequest) -> Result<String, ProviderError> {
        let chat = self.build_request(request);
        let response = self.complete(chat).await?;
        if let Some(usage) = &response.usage {
            debug!(
                "Model {} used {} prompt / {} completion tokens",
                request.model, usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(strip_think_tags(&Self::extract_text_from_response(&response)))
    }

    async fn test_connection(&self, model: &str) -> Result<(), ProviderError> {
        let request = OpenAIRequest::new(model)
            .add_message("user", "Hello")
            .max_tokens(5);
        self.complete(request).await?;
        Ok(())
    }
}
