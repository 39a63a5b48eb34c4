//! Core LLM client trait, error type and a scripted mock

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Stateless completion client - each call is independent
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single prompt in, completion text out
    async fn complete(&self, prompt: &str) -> Result<String, LlmError>;

    /// Model name, recorded in chat history
    fn model(&self) -> &str;
}

/// Settings shared by the HTTP-backed clients
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            model: "llama3.2".to_string(),
            temperature: 0.0,
            max_tokens: 1000,
            timeout: Duration::from_secs(300),
        }
    }
}

/// Errors that can occur during LLM operations
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Missing API key: environment variable {env_var} not set")]
    MissingApiKey { env_var: String },
}

impl LlmError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::RateLimited { .. } => true,
            LlmError::ApiError { status, .. } => *status >= 500,
            LlmError::Network(_) => true,
            LlmError::InvalidResponse(_) => false,
            LlmError::MissingApiKey { .. } => false,
        }
    }
}

/// Send a JSON request and map HTTP failures onto [`LlmError`]
pub(crate) async fn send_json(request: reqwest::RequestBuilder) -> Result<Value, LlmError> {
    let response = request.send().await?;
    let status = response.status();

    if status.as_u16() == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(60);
        return Err(LlmError::RateLimited {
            retry_after: Duration::from_secs(retry_after),
        });
    }

    if !status.is_success() {
        let message = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
        return Err(LlmError::ApiError {
            status: status.as_u16(),
            message,
        });
    }

    response
        .json()
        .await
        .map_err(|e| LlmError::InvalidResponse(format!("Failed to parse response: {}", e)))
}

enum Scripted {
    Text(String),
    Error(LlmError),
}

/// Replays scripted completions in order and records every prompt
pub struct MockLlmClient {
    model: String,
    script: Mutex<VecDeque<Scripted>>,
    prompts: Mutex<Vec<String>>,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self {
            model: "mock-model".to_string(),
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Mock that answers with each response in turn
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        for response in responses {
            mock.push(Scripted::Text(response.into()));
        }
        mock
    }

    /// Queue a successful completion
    pub fn respond(self, text: impl Into<String>) -> Self {
        self.push(Scripted::Text(text.into()));
        self
    }

    /// Queue a server failure (HTTP 500)
    pub fn fail(self, message: impl Into<String>) -> Self {
        self.fail_with(LlmError::ApiError {
            status: 500,
            message: message.into(),
        })
    }

    /// Queue a specific error
    pub fn fail_with(self, error: LlmError) -> Self {
        self.push(Scripted::Error(error));
        self
    }

    /// Prompts received so far
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn push(&self, item: Scripted) {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).push_back(item);
    }
}

impl Default for MockLlmClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(prompt.to_string());

        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(Scripted::Text(text)) => Ok(text),
            Some(Scripted::Error(error)) => Err(error),
            None => Err(LlmError::InvalidResponse("mock script exhausted".to_string())),
        }
    }

    fn model(&self) -> &str {
        &self.model
    }
}
