//! Streaming client for Ollama's `/api/chat` endpoint
//!
//! The server answers a streamed chat request with newline-delimited JSON
//! objects, each carrying a piece of the assistant message, and a final
//! object with `"done": true`.

use crate::llm::client::{FragmentStream, GenerationOptions, ModelClient};
use crate::llm::config::LLMConfig;
use crate::messages::Message;
use crate::{MentrisError, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    stream: bool,
    options: ChatOptions,
}

#[derive(Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ModelsResponse {
    models: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    name: String,
}

/// What one line of the response body means
#[derive(Debug, PartialEq)]
enum ChunkEvent {
    Fragment(String),
    /// Closing object that still carries text
    Last(String),
    Done,
    Skip,
}

fn parse_line(line: &str) -> Result<ChunkEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(ChunkEvent::Skip);
    }

    let chunk: ChatChunk = serde_json::from_str(line)
        .map_err(|e| MentrisError::StreamError(format!("Malformed response line: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(MentrisError::StreamError(error));
    }
    let content = chunk.message.map(|m| m.content).unwrap_or_default();
    match (chunk.done, content.is_empty()) {
        (true, true) => Ok(ChunkEvent::Done),
        (true, false) => Ok(ChunkEvent::Last(content)),
        (false, true) => Ok(ChunkEvent::Skip),
        (false, false) => Ok(ChunkEvent::Fragment(content)),
    }
}

/// Splits a byte stream into lines, keeping partial lines across reads
#[derive(Debug, Default)]
struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// Whatever remains once the body has ended
    fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(rest)
    }
}

/// Fragment iterator over an in-flight response body
struct ChatStream {
    runtime: Arc<Runtime>,
    body: BoxStream<'static, Result<Vec<u8>>>,
    decoder: LineDecoder,
    pending: VecDeque<Result<String>>,
    finished: bool,
}

impl ChatStream {
    fn new(runtime: Arc<Runtime>, body: BoxStream<'static, Result<Vec<u8>>>) -> Self {
        Self {
            runtime,
            body,
            decoder: LineDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        }
    }

    /// Queue the events of decoded lines; returns false once the stream is over
    fn absorb(&mut self, lines: Vec<String>) -> bool {
        for line in lines {
            match parse_line(&line) {
                Ok(ChunkEvent::Fragment(text)) => self.pending.push_back(Ok(text)),
                Ok(ChunkEvent::Skip) => {}
                Ok(ChunkEvent::Last(text)) => {
                    self.pending.push_back(Ok(text));
                    return false;
                }
                Ok(ChunkEvent::Done) => return false,
                Err(e) => {
                    self.pending.push_back(Err(e));
                    return false;
                }
            }
        }
        true
    }
}

impl Iterator for ChatStream {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }
            if self.finished {
                return None;
            }

            match self.runtime.block_on(self.body.next()) {
                Some(Ok(bytes)) => {
                    let lines = self.decoder.push(&bytes);
                    if !self.absorb(lines) {
                        self.finished = true;
                    }
                }
                Some(Err(e)) => {
                    self.finished = true;
                    self.pending.push_back(Err(e));
                }
                None => {
                    self.finished = true;
                    let rest: Vec<String> = self.decoder.finish().into_iter().collect();
                    if self.absorb(rest) {
                        // Body ended without the closing `done` object
                        self.pending.push_back(Err(MentrisError::StreamError(
                            "Response ended unexpectedly".to_string(),
                        )));
                    }
                }
            }
        }
    }
}

/// Ollama chat client.
///
/// Owns a small tokio runtime so callers on plain worker threads can consume
/// the streamed reply as a blocking iterator.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    runtime: Arc<Runtime>,
    config: LLMConfig,
}

impl OllamaClient {
    pub fn new(config: LLMConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mentris-http")
            .enable_all()
            .build()
            .map_err(|e| MentrisError::ConfigError(format!("Failed to create runtime: {}", e)))?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| MentrisError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        info!("Ollama client for {} at {}", config.model_id, config.base_url);

        Ok(Self {
            client,
            runtime: Arc::new(runtime),
            config,
        })
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    /// Names of the models installed on the server
    pub fn list_models(&self) -> Result<Vec<String>> {
        let url = self.config.endpoint("/api/tags");

        self.runtime.block_on(async {
            let response = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| MentrisError::StreamError(connect_hint(&e.to_string())))?;

            if !response.status().is_success() {
                return Err(MentrisError::StreamError(format!(
                    "Failed to list models: {}",
                    response.status()
                )));
            }

            let models: ModelsResponse = response
                .json()
                .await
                .map_err(|e| MentrisError::StreamError(format!("Invalid model list: {}", e)))?;

            Ok(models.models.into_iter().map(|m| m.name).collect())
        })
    }

    /// Whether the configured model is installed on the server
    pub fn has_configured_model(&self) -> Result<bool> {
        let models = self.list_models()?;
        let wanted = &self.config.model_id;
        // An untagged name refers to `:latest`
        Ok(models
            .iter()
            .any(|m| m == wanted || m.strip_suffix(":latest") == Some(wanted.as_str())))
    }
}

impl ModelClient for OllamaClient {
    fn stream_turn(
        &self,
        messages: &[Message],
        options: &GenerationOptions,
    ) -> Result<FragmentStream> {
        let url = self.config.endpoint("/api/chat");
        let request = ChatRequest {
            model: &options.model,
            messages,
            stream: true,
            options: ChatOptions {
                temperature: options.temperature,
                top_p: options.top_p,
                num_predict: options.max_tokens,
            },
        };

        debug!("POST {} with {} messages", url, messages.len());

        let response = self
            .runtime
            .block_on(self.client.post(&url).json(&request).send())
            .map_err(|e| MentrisError::StreamError(connect_hint(&e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let body = self.runtime.block_on(response.text()).unwrap_or_default();
            warn!("Chat request rejected with {}: {}", status, body);
            return Err(MentrisError::StreamError(rejection_message(status.as_u16(), &body)));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|e| MentrisError::StreamError(format!("Connection lost: {}", e)))
            })
            .boxed();

        Ok(Box::new(ChatStream::new(Arc::clone(&self.runtime), body)))
    }
}

fn connect_hint(error: &str) -> String {
    format!("{}. Make sure Ollama is running with: ollama serve", error)
}

/// Prefer the server's own `{"error": ...}` explanation when it sent one
fn rejection_message(status: u16, body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => format!("{} ({})", parsed.error, status),
        Err(_) => format!("Ollama request failed with status {}", status),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fragment_line() {
        let line = r#"{"model":"gemma3:4b","message":{"role":"assistant","content":"Olá"},"done":false}"#;
        assert_eq!(parse_line(line).unwrap(), ChunkEvent::Fragment("Olá".to_string()));
    }

    #[test]
    fn test_parse_done_line() {
        let line = r#"{"model":"gemma3:4b","message":{"role":"assistant","content":""},"done":true,"total_duration":123}"#;
        assert_eq!(parse_line(line).unwrap(), ChunkEvent::Done);
    }

    #[test]
    fn test_parse_done_line_with_text() {
        let line = r#"{"message":{"role":"assistant","content":"fim."},"done":true}"#;
        assert_eq!(parse_line(line).unwrap(), ChunkEvent::Last("fim.".to_string()));
    }

    #[test]
    fn test_parse_error_line() {
        let err = parse_line(r#"{"error":"model 'x' not found"}"#).unwrap_err();
        assert_eq!(err, MentrisError::StreamError("model 'x' not found".to_string()));
    }

    #[test]
    fn test_parse_blank_and_malformed() {
        assert_eq!(parse_line("   ").unwrap(), ChunkEvent::Skip);
        assert!(matches!(parse_line("{not json"), Err(MentrisError::StreamError(_))));
    }

    #[test]
    fn test_line_decoder_keeps_partial_lines() {
        let mut decoder = LineDecoder::default();

        assert!(decoder.push(b"{\"a\":").is_empty());
        let lines = decoder.push(b"1}\n{\"b\":2}\n{\"c\"");
        assert_eq!(lines, vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()]);
        assert_eq!(decoder.finish(), Some("{\"c\"".to_string()));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_line_decoder_multibyte_split() {
        let mut decoder = LineDecoder::default();
        let text = "ção\n".as_bytes();

        assert!(decoder.push(&text[..2]).is_empty());
        assert_eq!(decoder.push(&text[2..]), vec!["ção".to_string()]);
    }

    fn collect_body(reads: Vec<Result<&str>>) -> Vec<Result<String>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        let reads: Vec<Result<Vec<u8>>> = reads
            .into_iter()
            .map(|read| read.map(|text| text.as_bytes().to_vec()))
            .collect();
        ChatStream::new(Arc::new(runtime), futures::stream::iter(reads).boxed()).collect()
    }

    fn fragment(text: &str) -> String {
        format!(
            "{{\"message\":{{\"role\":\"assistant\",\"content\":\"{}\"}},\"done\":false}}\n",
            text
        )
    }

    const DONE: &str = "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n";

    #[test]
    fn test_stream_stops_at_done() {
        let body = format!("{}{}{}{}", fragment("Ol"), fragment("á"), DONE, fragment("depois"));
        let items = collect_body(vec![Ok(body.as_str())]);

        assert_eq!(items, vec![Ok("Ol".to_string()), Ok("á".to_string())]);
    }

    #[test]
    fn test_stream_ignores_reads_after_done() {
        let first = format!("{}{}", fragment("Ol"), DONE);
        let late = fragment("tarde");
        let items = collect_body(vec![Ok(first.as_str()), Ok(late.as_str())]);

        assert_eq!(items, vec![Ok("Ol".to_string())]);
    }

    #[test]
    fn test_stream_truncated_body_is_error() {
        let body = format!("{}{}", fragment("Ol"), fragment("a"));
        let items = collect_body(vec![Ok(body.as_str())]);

        assert_eq!(
            items,
            vec![
                Ok("Ol".to_string()),
                Ok("a".to_string()),
                Err(MentrisError::StreamError("Response ended unexpectedly".to_string())),
            ]
        );
    }

    #[test]
    fn test_stream_fragment_split_across_reads() {
        let line = fragment("inteiro");
        let (head, tail) = line.split_at(17);
        let items = collect_body(vec![Ok(head), Ok(tail), Ok(DONE)]);

        assert_eq!(items, vec![Ok("inteiro".to_string())]);
    }

    #[test]
    fn test_stream_final_text_on_done_line() {
        let last = "{\"message\":{\"role\":\"assistant\",\"content\":\" fim.\"},\"done\":true}\n";
        let body = format!("{}{}", fragment("Quase"), last);
        let items = collect_body(vec![Ok(body.as_str())]);

        assert_eq!(items, vec![Ok("Quase".to_string()), Ok(" fim.".to_string())]);
    }

    #[test]
    fn test_stream_transport_error_ends_stream() {
        let first = fragment("meio");
        let lost = MentrisError::StreamError("Connection lost: reset".to_string());
        let items = collect_body(vec![Ok(first.as_str()), Err(lost.clone()), Ok(DONE)]);

        assert_eq!(items, vec![Ok("meio".to_string()), Err(lost)]);
    }

    #[test]
    fn test_rejection_message_uses_server_error() {
        assert_eq!(
            rejection_message(404, r#"{"error":"model \"gemma3:4b\" not found, try pulling it first"}"#),
            "model \"gemma3:4b\" not found, try pulling it first (404)"
        );
        assert_eq!(
            rejection_message(500, "boom"),
            "Ollama request failed with status 500"
        );
    }

    #[test]
    fn test_request_serialization() {
        let messages = vec![Message::system("Responda em português brasileiro."), Message::user("Oi")];
        let request = ChatRequest {
            model: "gemma3:4b",
            messages: &messages,
            stream: true,
            options: ChatOptions {
                temperature: 0.7,
                top_p: None,
                num_predict: None,
            },
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gemma3:4b");
        assert_eq!(value["stream"], true);
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value["options"].get("top_p").is_none());
    }

    #[test]
    fn test_unreachable_server_is_stream_error() {
        // Port 9 (discard) is essentially never serving HTTP
        let config = LLMConfig::default().with_base_url("http://127.0.0.1:9");
        let client = OllamaClient::new(config.clone()).unwrap();

        let result = client.stream_turn(&[Message::user("Oi")], &config.generation_options());
        assert!(matches!(result, Err(MentrisError::StreamError(_))));
    }
}
