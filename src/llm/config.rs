//! LLM configuration for the Ollama endpoint

use crate::llm::client::GenerationOptions;
use serde::{Deserialize, Serialize};

/// Configuration for the language-model service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    /// Base URL of the Ollama server
    pub base_url: String,

    /// Model identifier as known to the server
    pub model_id: String,

    /// Temperature for sampling (0.0 = deterministic, 1.0+ = creative)
    pub temperature: f32,

    /// Top-p (nucleus) sampling parameter, server default when unset
    pub top_p: Option<f32>,

    /// Maximum tokens to generate per response, unbounded when unset
    pub max_tokens: Option<u32>,

    /// Seconds to wait for the TCP connection
    pub connect_timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model_id: "gemma3:4b".to_string(),
            temperature: 0.7,
            top_p: None,
            max_tokens: None,
            connect_timeout_secs: 10,
        }
    }
}

impl LLMConfig {
    /// Create a new LLM configuration with the specified model
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    /// Set the server base URL
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top-p sampling
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set maximum tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Sampling options sent with every chat turn
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model_id.clone(),
            temperature: self.temperature,
            top_p: self.top_p,
            max_tokens: self.max_tokens,
        }
    }

    /// Endpoint URL with any trailing slash on the base removed
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.model_id.trim().is_empty() {
            return Err("LLM model id is required".to_string());
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(format!("LLM base URL must be http(s): {}", self.base_url));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(format!("Temperature out of range: {}", self.temperature));
        }
        Ok(())
    }
}
