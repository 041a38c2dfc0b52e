//! Scripted stand-ins for the model, microphone and speaker

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver, Sender};
use mentris::integration::TaskDispatcher;
use mentris::llm::{FragmentStream, GenerationOptions, ModelClient};
use mentris::messages::{HistoryConfig, Message};
use mentris::speech::{SpeechCapture, SpeechOutput};
use mentris::ui::{ChatCoordinator, VoiceSettings};
use mentris::{MentrisError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// One scripted model reply
#[derive(Clone)]
pub enum Reply {
    Stream(Vec<Result<String>>),
    Refuse(MentrisError),
}

impl Reply {
    pub fn text(fragments: &[&str]) -> Self {
        Reply::Stream(fragments.iter().map(|f| Ok(f.to_string())).collect())
    }

    pub fn fail_after(fragments: &[&str], error: &str) -> Self {
        let mut items: Vec<Result<String>> = fragments.iter().map(|f| Ok(f.to_string())).collect();
        items.push(Err(MentrisError::StreamError(error.to_string())));
        Reply::Stream(items)
    }
}

/// Model that answers from a queue of replies and records every request.
///
/// With a gate, each call waits for a token before answering, which keeps
/// the chat slot busy for as long as a test needs.
#[derive(Default)]
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Vec<Message>>>,
    gate: Option<Receiver<()>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            ..Default::default()
        }
    }

    pub fn gated(replies: Vec<Reply>) -> (Self, Sender<()>) {
        let (tx, rx) = unbounded();
        let model = Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: Some(rx),
        };
        (model, tx)
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().clone()
    }
}

impl ModelClient for ScriptedModel {
    fn stream_turn(&self, messages: &[Message], _: &GenerationOptions) -> Result<FragmentStream> {
        self.requests.lock().push(messages.to_vec());

        if let Some(gate) = &self.gate {
            gate.recv_timeout(TIMEOUT)
                .map_err(|e| MentrisError::StreamError(e.to_string()))?;
        }

        match self.replies.lock().pop_front() {
            Some(Reply::Stream(items)) => Ok(Box::new(items.into_iter())),
            Some(Reply::Refuse(error)) => Err(error),
            None => Err(MentrisError::StreamError("no scripted reply".to_string())),
        }
    }
}

/// Microphone that "hears" queued results in order
#[derive(Default)]
pub struct ScriptedCapture {
    results: Mutex<VecDeque<Result<String>>>,
}

impl ScriptedCapture {
    pub fn new(results: Vec<Result<String>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
        }
    }
}

impl SpeechCapture for ScriptedCapture {
    fn capture(&self) -> Result<String> {
        self.results
            .lock()
            .pop_front()
            .unwrap_or(Err(MentrisError::NoSpeechRecognized))
    }
}

/// Speaker that records what it was asked to say
#[derive(Default)]
pub struct RecordingOutput {
    spoken: Mutex<Vec<String>>,
    gate: Option<Receiver<()>>,
}

impl RecordingOutput {
    pub fn gated() -> (Self, Sender<()>) {
        let (tx, rx) = unbounded();
        let output = Self {
            spoken: Mutex::new(Vec::new()),
            gate: Some(rx),
        };
        (output, tx)
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

impl SpeechOutput for RecordingOutput {
    fn speak(&self, text: &str) -> Result<()> {
        if let Some(gate) = &self.gate {
            gate.recv_timeout(TIMEOUT)
                .map_err(|e| MentrisError::SynthesisError(e.to_string()))?;
        }
        self.spoken.lock().push(text.to_string());
        Ok(())
    }
}

pub fn options() -> GenerationOptions {
    GenerationOptions {
        model: "scripted".to_string(),
        temperature: 0.0,
        top_p: None,
        max_tokens: None,
    }
}

/// Coordinator wired to the given fakes, with every voice feature on
pub fn coordinator(
    model: Arc<ScriptedModel>,
    capture: Arc<ScriptedCapture>,
    output: Arc<RecordingOutput>,
) -> ChatCoordinator {
    coordinator_with(model, capture, output, &HistoryConfig::default(), VoiceSettings::default())
}

pub fn coordinator_with(
    model: Arc<ScriptedModel>,
    capture: Arc<ScriptedCapture>,
    output: Arc<RecordingOutput>,
    history: &HistoryConfig,
    voice: VoiceSettings,
) -> ChatCoordinator {
    let dispatcher = TaskDispatcher::new(model, capture, output, options());
    ChatCoordinator::new(dispatcher, history, voice)
}

/// Poll until `condition` holds or the timeout passes
pub fn poll_until(chat: &mut ChatCoordinator, condition: impl Fn(&ChatCoordinator) -> bool) -> bool {
    let deadline = std::time::Instant::now() + TIMEOUT;
    while std::time::Instant::now() < deadline {
        chat.poll();
        if condition(chat) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    false
}
