//! OpenAI-compatible chat completions client

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::client::{CompletionSettings, LlmClient, LlmError, send_json};

pub const OPENAI_DEFAULT_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    settings: CompletionSettings,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        settings: CompletionSettings,
    ) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            settings,
        })
    }

    /// Read the API key from `OPENAI_API_KEY`
    pub fn from_env(base_url: impl Into<String>, settings: CompletionSettings) -> Result<Self, LlmError> {
        let api_key = std::env::var(OPENAI_API_KEY_ENV).map_err(|_| LlmError::MissingApiKey {
            env_var: OPENAI_API_KEY_ENV.to_string(),
        })?;
        Self::new(base_url, api_key, settings)
    }

    fn build_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        })
    }

    fn parse_response(body: &Value) -> Result<String, LlmError> {
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| LlmError::InvalidResponse("missing choices[0].message.content".to_string()))
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&self.build_request(prompt));

        let body = send_json(request).await?;
        Self::parse_response(&body)
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.settings.model)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
