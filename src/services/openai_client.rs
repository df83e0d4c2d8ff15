use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::configuration::CompletionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("no API key is configured for the completion service")]
    Authentication,
    #[error("completion request failed: {0}")]
    Transport(String),
    #[error("completion response could not be decoded: {0}")]
    MalformedResponse(String),
    #[error("completion request could not be built: {0}")]
    InvalidRequest(String),
}

impl From<OpenAIError> for CompletionError {
    fn from(value: OpenAIError) -> Self {
        CompletionError::InvalidRequest(value.to_string())
    }
}

/// One request/response exchange with a chat completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `prompt` as the next user message after `history` and returns
    /// the text of the reply.
    async fn send(&self, prompt: &str, history: &[ChatMessage]) -> Result<String, CompletionError>;
}

/// Client for OpenAI-compatible `/chat/completions` endpoints (OpenAI, DeepSeek).
pub struct OpenaiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionReply {
    choices: Vec<ReplyChoice>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

impl OpenaiClient {
    pub fn new(settings: &CompletionSettings) -> Result<Self, CompletionError> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| CompletionError::Transport(e.to_string()))?;

        Ok(OpenaiClient {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            temperature: settings.temperature,
        })
    }

    fn api_key(&self) -> Result<&str, CompletionError> {
        self.api_key
            .as_deref()
            .filter(|key| !key.trim().is_empty())
            .ok_or(CompletionError::Authentication)
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.as_str();
    let message: ChatCompletionRequestMessage = match message.role {
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    };

    Ok(message)
}

#[async_trait]
impl CompletionClient for OpenaiClient {
    async fn send(&self, prompt: &str, history: &[ChatMessage]) -> Result<String, CompletionError> {
        let api_key = self.api_key()?;

        let mut messages = history
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()?;
        messages.push(to_request_message(&ChatMessage::user(prompt))?);

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()?;

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                log::error!("Completion request to {} failed: {:?}", self.base_url, e);
                CompletionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            log::error!("Completion service answered {}: {}", status, body);
            return Err(CompletionError::Transport(format!(
                "completion service answered {}: {}",
                status, body
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| CompletionError::Transport(e.to_string()))?;
        let reply: ChatCompletionReply = serde_json::from_str(&body)
            .map_err(|e| CompletionError::MalformedResponse(e.to_string()))?;

        let content = reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                CompletionError::MalformedResponse("no content in the first choice".to_string())
            })?;

        log::info!(
            "Completion reply of {} characters after {} history messages",
            content.len(),
            history.len()
        );

        Ok(content)
    }
}
