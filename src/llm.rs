use crate::classify::{extract_error_message, ErrorTable};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub created: i64,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl ChatCompletionResponse {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.created, 0)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ChatMessage,
}

/// Settings applied once, in order, when a [`ChatClient`] is built.
#[derive(Debug, Clone)]
pub enum ClientOption {
    BaseUrl(String),
    Timeout(Duration),
    ErrorTable(ErrorTable),
}

pub struct ChatClient {
    client: Client,
    api_key: String,
    base_url: String,
    timeout: Duration,
    errors: ErrorTable,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl ChatClient {
    pub fn new(
        api_key: impl Into<String>,
        options: impl IntoIterator<Item = ClientOption>,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Configuration("API key must not be empty".to_string()));
        }

        let mut base_url = DEFAULT_BASE_URL.to_string();
        let mut timeout = DEFAULT_TIMEOUT;
        let mut errors = ErrorTable::default();
        for option in options {
            match option {
                ClientOption::BaseUrl(url) => base_url = url,
                ClientOption::Timeout(value) => timeout = value,
                ClientOption::ErrorTable(table) => errors = table,
            }
        }

        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            Error::Configuration(format!("Failed to build HTTP client for {}: {}", base_url, e))
        })?;

        Ok(Self {
            client,
            api_key,
            base_url,
            timeout,
            errors,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends `question` as a single user message with the default model and
    /// temperature and returns the first choice's content.
    pub async fn create_chat_completion(&self, question: &str) -> Result<String> {
        self.complete(
            vec![ChatMessage::user(question)],
            DEFAULT_MODEL,
            Some(DEFAULT_TEMPERATURE),
        )
        .await
    }

    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        model: &str,
        temperature: Option<f32>,
    ) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let request_body = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            temperature: temperature.map(clamp_temperature),
        };

        tracing::debug!(
            "Calling chat completion API: {} with model: {} ({} messages)",
            url,
            model,
            request_body.messages.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            let body = response.text().await?;
            let parsed: ChatCompletionResponse = serde_json::from_str(&body)?;
            tracing::debug!(
                id = %parsed.id,
                created = ?parsed.created_at(),
                choices = parsed.choices.len(),
                "Chat completion received"
            );
            return parsed
                .choices
                .into_iter()
                .next()
                .map(|choice| choice.message.content)
                .ok_or(Error::EmptyResponse);
        }

        // The envelope is optional; a body we cannot read classifies like an empty one.
        let body = response.text().await.unwrap_or_default();
        let detail = extract_error_message(&body);
        tracing::debug!(
            status = status.as_u16(),
            detail = detail.as_deref().unwrap_or(""),
            "Chat completion API returned an error status"
        );

        match self.errors.classify(status.as_u16(), detail.as_deref()) {
            Some(api_error) => Err(api_error.into()),
            None => Err(Error::UnexpectedStatus(status.as_u16())),
        }
    }
}

fn clamp_temperature(value: f32) -> f32 {
    value.clamp(0.0, 2.0)
}
