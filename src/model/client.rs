//! HTTP client for vision-language models.
//!
//! Speaks either the Ollama `/api/generate` protocol or the OpenAI-compatible
//! `/chat/completions` protocol.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tokio::time::sleep;

use crate::vision::NormalizedImage;

/// Default number of retry attempts for failed requests.
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Default delay between retry attempts in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 2;

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Model client errors.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("API error ({status}): {body}")]
    ApiError { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("Max retries exceeded after {0} attempts: {1}")]
    MaxRetriesExceeded(u32, String),
}

/// Wire protocol of the model endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApiFlavor {
    /// Ollama `POST /api/generate`.
    #[default]
    Ollama,
    /// OpenAI-compatible `POST /chat/completions`.
    OpenAi,
}

impl ApiFlavor {
    /// Name accepted by [`ApiFlavor::from_str`].
    pub fn as_str(&self) -> &'static str {
        match self {
            ApiFlavor::Ollama => "ollama",
            ApiFlavor::OpenAi => "openai",
        }
    }
}

impl fmt::Display for ApiFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApiFlavor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(ApiFlavor::Ollama),
            "openai" | "openai-compatible" | "oai" => Ok(ApiFlavor::OpenAi),
            other => Err(format!("unknown API flavor: {}", other)),
        }
    }
}

/// Configuration for one model endpoint.
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub api: ApiFlavor,
    pub base_url: String,
    pub api_key: String,
    pub model_name: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Maximum number of retry attempts for failed requests.
    pub max_retries: u32,
    /// Delay between retry attempts in seconds.
    pub retry_delay_secs: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api: ApiFlavor::Ollama,
            base_url: "http://localhost:11434".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "llama3.2-vision".to_string(),
            max_tokens: 1024,
            temperature: 0.0,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ModelConfig {
    /// Set the wire protocol.
    pub fn with_api(mut self, api: ApiFlavor) -> Self {
        self.api = api;
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the model name.
    pub fn with_model_name(mut self, model_name: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self
    }

    /// Set the maximum number of retry attempts.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the delay between retry attempts.
    pub fn with_retry_delay(mut self, delay_secs: u64) -> Self {
        self.retry_delay_secs = delay_secs;
        self
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// One generation request.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub system: Option<&'a str>,
    pub prompt: &'a str,
    pub image: Option<&'a NormalizedImage>,
    /// Ask the endpoint to constrain output to a JSON object.
    pub json: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// Client for a vision-language model endpoint.
#[derive(Debug, Clone)]
pub struct ModelClient {
    config: ModelConfig,
    client: Client,
}

impl ModelClient {
    /// Create a client; fails only if the HTTP client cannot be built.
    pub fn new(config: ModelConfig) -> Result<Self, ModelError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    /// Get the model configuration.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Send a request and return the model's reply text.
    ///
    /// Connection failures, 429 and 5xx responses are retried up to
    /// `max_retries` times. Everything else fails immediately.
    pub async fn generate(&self, request: &GenerateRequest<'_>) -> Result<String, ModelError> {
        let url = self.endpoint();
        let body = self.build_body(request);

        let mut last_error: Option<ModelError> = None;
        let max_attempts = self.config.max_retries + 1;

        for attempt in 1..=max_attempts {
            match self.send_request(&url, &body).await {
                Ok(reply) => return Ok(reply),
                Err(e) if !Self::is_retryable_error(&e) => return Err(e),
                Err(e) => {
                    if attempt < max_attempts {
                        tracing::warn!(
                            attempt,
                            max_attempts,
                            "model request failed, retrying in {}s: {}",
                            self.config.retry_delay_secs,
                            e
                        );
                        sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "Unknown error".to_string());
        Err(ModelError::MaxRetriesExceeded(max_attempts, last))
    }

    fn endpoint(&self) -> String {
        let base = self.config.base_url.trim_end_matches('/');
        match self.config.api {
            ApiFlavor::Ollama => format!("{}/api/generate", base),
            ApiFlavor::OpenAi => format!("{}/chat/completions", base),
        }
    }

    fn build_body(&self, request: &GenerateRequest<'_>) -> Value {
        match self.config.api {
            ApiFlavor::Ollama => {
                let mut body = json!({
                    "model": self.config.model_name,
                    "prompt": request.prompt,
                    "stream": false,
                    "options": {
                        "temperature": self.config.temperature,
                        "num_predict": self.config.max_tokens,
                    },
                });
                if let Some(system) = request.system {
                    body["system"] = json!(system);
                }
                if let Some(image) = request.image {
                    body["images"] = json!([image.to_base64()]);
                }
                if request.json {
                    body["format"] = json!("json");
                }
                body
            }
            ApiFlavor::OpenAi => {
                let mut messages = Vec::new();
                if let Some(system) = request.system {
                    messages.push(MessageBuilder::create_system_message(system));
                }
                messages.push(MessageBuilder::create_user_message(
                    request.prompt,
                    request.image,
                ));

                let mut body = json!({
                    "model": self.config.model_name,
                    "messages": messages,
                    "max_tokens": self.config.max_tokens,
                    "temperature": self.config.temperature,
                });
                if request.json {
                    body["response_format"] = json!({"type": "json_object"});
                }
                body
            }
        }
    }

    fn is_retryable_error(error: &ModelError) -> bool {
        match error {
            ModelError::RequestFailed(e) => !e.is_decode(),
            ModelError::ApiError { status, .. } => *status == 429 || *status >= 500,
            ModelError::ParseError(_) => false,
            ModelError::MaxRetriesExceeded(_, _) => false,
        }
    }

    async fn send_request(&self, url: &str, body: &Value) -> Result<String, ModelError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        let reply = Self::extract_reply(self.config.api, payload)?;
        tracing::debug!(chars = reply.len(), "model reply received");
        Ok(reply)
    }

    /// Pull the reply text out of a response envelope.
    fn extract_reply(api: ApiFlavor, payload: Value) -> Result<String, ModelError> {
        match api {
            ApiFlavor::Ollama => {
                let parsed: GenerateResponse = serde_json::from_value(payload)
                    .map_err(|e| ModelError::ParseError(e.to_string()))?;
                Ok(parsed.response)
            }
            ApiFlavor::OpenAi => {
                let parsed: ChatCompletionResponse = serde_json::from_value(payload)
                    .map_err(|e| ModelError::ParseError(e.to_string()))?;
                parsed
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.message.content)
                    .ok_or_else(|| ModelError::ParseError("No choices in response".to_string()))
            }
        }
    }
}

/// Helper for building OpenAI-style chat messages.
pub struct MessageBuilder;

impl MessageBuilder {
    /// Create a system message.
    pub fn create_system_message(content: &str) -> Value {
        json!({
            "role": "system",
            "content": content
        })
    }

    /// User message with the image (if any) before the text.
    pub fn create_user_message(text: &str, image: Option<&NormalizedImage>) -> Value {
        let mut content = Vec::new();

        if let Some(image) = image {
            content.push(json!({
                "type": "image_url",
                "image_url": {
                    "url": format!("data:{};base64,{}", image.mime_type(), image.to_base64())
                }
            }));
        }

        content.push(json!({
            "type": "text",
            "text": text
        }));

        json!({
            "role": "user",
            "content": content
        })
    }
}
