//! Ollama client - local models through `/api/generate`

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{CompletionSettings, LlmClient, LlmError, send_json};

/// Default local Ollama endpoint
pub const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

pub struct OllamaClient {
    client: Client,
    base_url: String,
    settings: CompletionSettings,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, settings: CompletionSettings) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            settings,
        })
    }

    fn build_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.settings.model,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.settings.temperature,
                "num_predict": self.settings.max_tokens,
            }
        })
    }

    fn parse_response(body: &Value) -> Result<String, LlmError> {
        body["response"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("missing 'response' field".to_string()))
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.base_url);
        let request = self.client.post(url).json(&self.build_request(prompt));

        match send_json(request).await {
            Ok(body) => Self::parse_response(&body),
            Err(LlmError::ApiError { status: 404, message }) if message.contains("not found") => Err(LlmError::ApiError {
                status: 404,
                message: format!(
                    "Model '{}' not found. Install it with: ollama pull {}",
                    self.settings.model, self.settings.model
                ),
            }),
            Err(e) => Err(e),
        }
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

impl std::fmt::Debug for OllamaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaClient")
            .field("base_url", &self.base_url)
            .field("model", &self.settings.model)
            .finish()
    }
}
