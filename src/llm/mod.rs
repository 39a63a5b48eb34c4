//! LLM Client Layer - prompt in, completion text out
//!
//! This module provides:
//! - LlmClient trait for provider abstraction
//! - Ollama and OpenAI-compatible clients
//! - A scripted mock for tests

pub mod client;
pub mod ollama;
pub mod openai;

pub use client::{CompletionSettings, LlmClient, LlmError, MockLlmClient};
pub use ollama::{OLLAMA_DEFAULT_URL, OllamaClient};
pub use openai::{OPENAI_API_KEY_ENV, OPENAI_DEFAULT_URL, OpenAiClient};

use crate::config::{LlmConfig, LlmProvider};

/// Build the configured client
pub fn create_client(config: &LlmConfig) -> Result<Box<dyn LlmClient>, LlmError> {
    let settings = CompletionSettings {
        model: config.model.clone(),
        temperature: config.temperature,
        max_tokens: config.max_tokens,
        timeout: config.timeout(),
    };

    let client: Box<dyn LlmClient> = match config.provider {
        LlmProvider::Ollama => {
            let base_url = config.base_url.as_deref().unwrap_or(OLLAMA_DEFAULT_URL);
            Box::new(OllamaClient::new(base_url, settings)?)
        }
        LlmProvider::Openai => {
            let base_url = config.base_url.as_deref().unwrap_or(OPENAI_DEFAULT_URL);
            Box::new(OpenAiClient::from_env(base_url, settings)?)
        }
    };
    log::debug!("Created {:?} client for model {}", config.provider, client.model());
    Ok(client)
}
