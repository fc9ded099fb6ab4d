use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{AiConfig, AiProvider};

/// Fixed instructions sent ahead of every chat-mode message.
pub const SYSTEM_PROMPT: &str =
    "You are a helpful AI assistant in a Telegram bot. Be concise, friendly, and helpful in your responses.";

/// One completion request: instructions, what we know about the user, and their message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user_context: String,
    pub message: String,
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, Error>;
}

/// Chat-completions client for OpenAI and compatible endpoints.
pub struct Client {
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl Client {
    pub fn new(config: &AiConfig) -> Self {
        Self {
            api_key: config.api_key.clone(),
            base_url: config.base_url.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionProvider for Client {
    async fn complete(&self, prompt: &Prompt) -> Result<String, Error> {
        let request = ApiRequest {
            model: &self.model,
            messages: vec![
                ApiMessage { role: "system", content: &prompt.system },
                ApiMessage { role: "system", content: &prompt.user_context },
                ApiMessage { role: "user", content: &prompt.message },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, url = %url, "Calling completion API");

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(format!("{status}: {body}")));
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        api_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty())
            .ok_or(Error::Empty)
    }
}

/// Build the configured provider, or `None` when chat mode has no backend.
pub fn from_config(config: &AiConfig) -> Option<Arc<dyn CompletionProvider>> {
    if !config.enabled || config.provider == AiProvider::Disabled {
        return None;
    }
    if config.api_key.is_empty() && config.provider == AiProvider::OpenAi {
        warn!("AI enabled but no API key set, AI features will be disabled");
        return None;
    }
    Some(Arc::new(Client::new(config)))
}

/// Context line describing the user to the model.
pub fn user_context(full_name: &str, interests: &[String], location: &str) -> String {
    let name = if full_name.is_empty() { "a user" } else { full_name };
    let interests = if interests.is_empty() {
        "not specified".to_string()
    } else {
        interests.join(", ")
    };
    let location = if location.is_empty() { "an unknown location" } else { location };
    format!("You are chatting with {name}. Their interests include: {interests}. They are from {location}.")
}

#[derive(Debug)]
pub enum Error {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Http(e) => write!(f, "HTTP error: {e}"),
            Error::Api(e) => write!(f, "API error: {e}"),
            Error::Parse(e) => write!(f, "Parse error: {e}"),
            Error::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for Error {}
