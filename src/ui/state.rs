//! Chat coordination
//!
//! [`ChatCoordinator`] is the UI-thread owner of the conversation. It starts
//! tasks through the [`TaskDispatcher`], folds their notifications into the
//! visible log and commits finished turns to the [`ConversationHistory`].

use crate::integration::{Notification, TaskDispatcher, TaskHandle, TaskKind};
use crate::messages::{ConversationHistory, HistoryConfig, LogEntry, Speaker, TurnRequest};
use crate::{MentrisError, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const WELCOME_MESSAGE: &str = "Bem-vindo! Como posso te ajudar hoje?";

/// Reply text arriving for the in-flight chat turn
#[derive(Debug, Clone, Default)]
pub struct StreamingResponse {
    pub text: String,
    pub task: Option<TaskHandle>,
    pub request: Option<TurnRequest>,
}

impl StreamingResponse {
    pub fn is_active(&self) -> bool {
        self.task.is_some()
    }

    fn start(&mut self, task: TaskHandle, request: TurnRequest) {
        self.text.clear();
        self.task = Some(task);
        self.request = Some(request);
    }

    fn finish(&mut self) {
        self.text.clear();
        self.task = None;
        self.request = None;
    }
}

/// Which voice features this session offers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoiceSettings {
    /// A recognizer is available, so the voice button is shown enabled
    pub capture: bool,
    /// Replies to voice turns are spoken
    pub speak_replies: bool,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            capture: true,
            speak_replies: true,
        }
    }
}

pub struct ChatCoordinator {
    history: ConversationHistory,
    log: Vec<LogEntry>,
    dispatcher: TaskDispatcher,
    voice: VoiceSettings,

    /// Current text input
    pub input_text: String,

    streaming: StreamingResponse,

    /// Recognized phrases waiting for the chat slot
    queued_voice: VecDeque<String>,

    /// Voice-turn replies waiting for the playback slot
    pending_replies: VecDeque<String>,

    last_error: Option<String>,
}

impl ChatCoordinator {
    pub fn new(dispatcher: TaskDispatcher, history: &HistoryConfig, voice: VoiceSettings) -> Self {
        Self {
            history: ConversationHistory::new(history),
            log: vec![LogEntry::new(Speaker::Assistant, WELCOME_MESSAGE)],
            dispatcher,
            voice,
            input_text: String::new(),
            streaming: StreamingResponse::default(),
            queued_voice: VecDeque::new(),
            pending_replies: VecDeque::new(),
            last_error: None,
        }
    }

    /// Run `waker` whenever a worker reports, so the UI repaints
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.dispatcher.set_waker(waker);
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.log
    }

    pub fn streaming(&self) -> &StreamingResponse {
        &self.streaming
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn voice_settings(&self) -> VoiceSettings {
        self.voice
    }

    pub fn queued_voice_len(&self) -> usize {
        self.queued_voice.len()
    }

    pub fn pending_replies_len(&self) -> usize {
        self.pending_replies.len()
    }

    pub fn is_generating(&self) -> bool {
        self.dispatcher.is_busy(TaskKind::ChatTurn)
    }

    pub fn is_listening(&self) -> bool {
        self.dispatcher.is_busy(TaskKind::VoiceCapture)
    }

    pub fn is_speaking(&self) -> bool {
        self.dispatcher.is_busy(TaskKind::Playback)
    }

    /// Text entry and send are usable
    pub fn input_enabled(&self) -> bool {
        !self.is_generating()
    }

    pub fn can_send(&self) -> bool {
        self.input_enabled() && !self.input_text.trim().is_empty()
    }

    /// The voice button is usable; off while listening and while speaking so
    /// the microphone never hears the reply
    pub fn voice_enabled(&self) -> bool {
        self.voice.capture && !self.is_listening() && !self.is_speaking()
    }

    /// Nothing running and nothing queued
    pub fn is_idle(&self) -> bool {
        !self.is_generating() && !self.is_listening() && !self.is_speaking()
            && self.queued_voice.is_empty()
            && self.pending_replies.is_empty()
    }

    /// Submit the text box as a typed turn
    pub fn submit_input(&mut self) -> Result<()> {
        let text = self.input_text.trim().to_string();
        if text.is_empty() || !self.input_enabled() {
            return Ok(());
        }
        self.input_text.clear();
        self.submit(TurnRequest::typed(text))
    }

    /// Start a chat turn: log the user's line and stream the reply
    pub fn submit(&mut self, request: TurnRequest) -> Result<()> {
        let messages = self.history.snapshot_for_request(&request.user_text);

        let task = self.dispatcher.submit_turn(request.clone(), messages)?;
        debug!("Submitted {:?} turn {}", request.origin, task.id);

        self.log.push(LogEntry::new(Speaker::User, request.user_text.clone()));
        self.streaming.start(task, request);
        Ok(())
    }

    /// Start listening on the microphone
    pub fn start_voice_capture(&mut self) -> Result<()> {
        if !self.voice.capture {
            return Err(MentrisError::RecognitionServiceError(
                "Speech recognition is not available".to_string(),
            ));
        }
        if self.is_speaking() {
            return Err(MentrisError::SlotBusy(TaskKind::Playback));
        }
        self.dispatcher.start_capture()?;
        info!("Listening for voice input");
        Ok(())
    }

    /// Apply every waiting notification; returns how many were handled
    pub fn poll(&mut self) -> usize {
        let mut handled = 0;
        while let Some(notification) = self.dispatcher.try_recv() {
            self.handle(notification);
            handled += 1;
        }
        self.submit_queued_voice();
        self.speak_pending_replies();
        handled
    }

    /// Block until everything in flight has finished, or `timeout` passes.
    /// Returns whether the coordinator went idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.poll();
            if self.is_idle() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            if let Some(notification) = self.dispatcher.recv_timeout(deadline - now) {
                self.handle(notification);
            }
        }
    }

    fn handle(&mut self, notification: Notification) {
        match notification {
            Notification::Chunk { task, text } => {
                if self.streaming.task == Some(task) {
                    self.streaming.text.push_str(&text);
                }
            }

            Notification::Completed {
                task,
                request,
                response,
            } => {
                if self.streaming.task == Some(task) {
                    self.streaming.finish();
                }
                self.history.append_turn(request.user_text.clone(), response.clone());
                self.log.push(LogEntry::new(Speaker::Assistant, response.clone()));
                debug!("History now holds {} messages", self.history.len());

                if request.is_voice() && self.voice.speak_replies {
                    self.pending_replies.push_back(response);
                    self.speak_pending_replies();
                }
            }

            Notification::Recognized { text, .. } => {
                info!("Heard: {}", text);
                self.queued_voice.push_back(text);
            }

            Notification::Spoken { .. } => {
                debug!("Reply spoken");
            }

            Notification::Failed { task, error } => {
                if task.kind == TaskKind::ChatTurn && self.streaming.task == Some(task) {
                    self.streaming.finish();
                }
                warn!("{} failed: {}", task.kind, error);
                let message = error.user_message();
                self.log
                    .push(LogEntry::new(Speaker::System, format!("Erro: {}", message)));
                self.last_error = Some(message);
            }
        }
    }

    /// Replies are spoken one after another as the playback slot frees
    fn speak_pending_replies(&mut self) {
        if self.is_speaking() {
            return;
        }
        let Some(reply) = self.pending_replies.pop_front() else {
            return;
        };
        match self.dispatcher.start_playback(reply.clone()) {
            Ok(task) => debug!("Speaking reply {}", task.id),
            Err(MentrisError::SlotBusy(_)) => self.pending_replies.push_front(reply),
            Err(e) => warn!("Could not speak reply: {}", e),
        }
    }

    /// Voice results wait for the chat slot so turns commit one at a time
    fn submit_queued_voice(&mut self) {
        while !self.is_generating() {
            let Some(text) = self.queued_voice.pop_front() else {
                return;
            };
            if let Err(e) = self.submit(TurnRequest::voice(text)) {
                warn!("Dropped voice turn: {}", e);
                self.log
                    .push(LogEntry::new(Speaker::System, format!("Erro: {}", e.user_message())));
            }
        }
    }
}
