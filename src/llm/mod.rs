//! Language-model integration over the Ollama HTTP API
//!
//! - **config**: endpoint, model and sampling parameters
//! - **client**: the [`ModelClient`] seam used by chat-turn tasks
//! - **ollama**: streaming `/api/chat` client
//!
//! # Usage
//!
//! ```rust,ignore
//! use mentris::llm::{LLMConfig, ModelClient, OllamaClient};
//! use mentris::messages::ConversationHistory;
//!
//! let config = LLMConfig::default();
//! let client = OllamaClient::new(config.clone())?;
//! let history = ConversationHistory::default();
//!
//! for fragment in client.stream_turn(&history.snapshot_for_request("Olá!"), &config.generation_options())? {
//!     print!("{}", fragment?);
//! }
//! ```

pub mod client;
pub mod config;
pub mod ollama;

pub use client::{FragmentStream, GenerationOptions, ModelClient};
pub use config::LLMConfig;
pub use ollama::OllamaClient;
