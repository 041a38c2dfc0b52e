//! Background task dispatch
//!
//! Every blocking operation (a streamed chat turn, a microphone capture,
//! speaking a reply) runs on its own worker thread and reports back through
//! typed [`Notification`]s on a single channel drained by the UI thread.
//!
//! There is one slot per [`TaskKind`]. Starting a task whose slot is taken
//! fails with [`MentrisError::SlotBusy`]; a slot is released when the UI
//! side receives the task's terminal notification, so the coordinator always
//! observes a result before the next task of that kind can start.

use crate::llm::{GenerationOptions, ModelClient};
use crate::messages::{Message, TurnRequest};
use crate::speech::{speak_response, SpeechCapture, SpeechOutput};
use crate::{MentrisError, Result};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TaskKind {
    ChatTurn,
    VoiceCapture,
    Playback,
}

impl TaskKind {
    fn thread_name(self) -> &'static str {
        match self {
            TaskKind::ChatTurn => "mentris-chat",
            TaskKind::VoiceCapture => "mentris-capture",
            TaskKind::Playback => "mentris-playback",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::ChatTurn => "chat turn",
            TaskKind::VoiceCapture => "voice capture",
            TaskKind::Playback => "playback",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
}

/// Identifies one in-flight job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TaskHandle {
    pub id: Uuid,
    pub kind: TaskKind,
}

impl TaskHandle {
    fn new(kind: TaskKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }
}

/// Progress and results sent from workers to the UI thread
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// One response fragment, in stream order
    Chunk { task: TaskHandle, text: String },

    /// The chat turn finished; `response` is every chunk concatenated
    Completed {
        task: TaskHandle,
        request: TurnRequest,
        response: String,
    },

    /// A voice capture produced text
    Recognized { task: TaskHandle, text: String },

    /// A reply finished playing
    Spoken { task: TaskHandle },

    Failed {
        task: TaskHandle,
        error: MentrisError,
    },
}

impl Notification {
    pub fn task(&self) -> TaskHandle {
        match self {
            Notification::Chunk { task, .. }
            | Notification::Completed { task, .. }
            | Notification::Recognized { task, .. }
            | Notification::Spoken { task }
            | Notification::Failed { task, .. } => *task,
        }
    }

    /// Whether this is the last notification its task sends
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Notification::Chunk { .. })
    }
}

/// Called after each notification so an idle UI loop wakes up
pub type Waker = Arc<dyn Fn() + Send + Sync>;

/// Worker side of the notification channel
#[derive(Clone)]
pub struct Notifier {
    tx: Sender<Notification>,
    waker: Option<Waker>,
}

impl Notifier {
    pub fn new(tx: Sender<Notification>, waker: Option<Waker>) -> Self {
        Self { tx, waker }
    }

    /// Send, returning false once the UI side has gone away
    pub fn send(&self, notification: Notification) -> bool {
        let delivered = self.tx.send(notification).is_ok();
        if let Some(wake) = &self.waker {
            wake();
        }
        delivered
    }
}

/// One streamed conversation turn
pub struct ChatTurnTask {
    handle: TaskHandle,
    request: TurnRequest,
    messages: Vec<Message>,
    accumulated: String,
    state: TaskState,
}

impl ChatTurnTask {
    pub fn new(handle: TaskHandle, request: TurnRequest, messages: Vec<Message>) -> Self {
        Self {
            handle,
            request,
            messages,
            accumulated: String::new(),
            state: TaskState::Pending,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    /// Stream the reply, forwarding each fragment, and finish with exactly
    /// one `Completed` or `Failed`.
    pub fn run(
        &mut self,
        client: &dyn ModelClient,
        options: &GenerationOptions,
        notifier: &Notifier,
    ) -> TaskState {
        self.state = TaskState::Running;
        debug!(
            "Chat turn {} started with {} messages",
            self.handle.id,
            self.messages.len()
        );

        match self.stream(client, options, notifier) {
            Ok(()) => {
                self.state = TaskState::Completed;
                info!(
                    "Chat turn {} completed ({} chars)",
                    self.handle.id,
                    self.accumulated.len()
                );
                notifier.send(Notification::Completed {
                    task: self.handle,
                    request: self.request.clone(),
                    response: self.accumulated.clone(),
                });
            }
            Err(e) => {
                self.state = TaskState::Failed;
                error!("Chat turn {} failed: {}", self.handle.id, e);
                // Partial text is never committed
                self.accumulated.clear();
                notifier.send(Notification::Failed {
                    task: self.handle,
                    error: e,
                });
            }
        }

        self.state
    }

    fn stream(
        &mut self,
        client: &dyn ModelClient,
        options: &GenerationOptions,
        notifier: &Notifier,
    ) -> Result<()> {
        let fragments = client.stream_turn(&self.messages, options)?;

        for fragment in fragments {
            let text = fragment?;
            if text.is_empty() {
                continue;
            }
            self.accumulated.push_str(&text);
            let delivered = notifier.send(Notification::Chunk {
                task: self.handle,
                text,
            });
            if !delivered {
                return Err(MentrisError::ChannelError(
                    "Notification receiver dropped".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// One microphone capture
pub struct VoiceCaptureTask {
    handle: TaskHandle,
    state: TaskState,
}

impl VoiceCaptureTask {
    pub fn new(handle: TaskHandle) -> Self {
        Self {
            handle,
            state: TaskState::Pending,
        }
    }

    pub fn run(&mut self, capture: &dyn SpeechCapture, notifier: &Notifier) -> TaskState {
        self.state = TaskState::Running;

        let notification = match capture.capture() {
            Ok(text) => {
                self.state = TaskState::Completed;
                debug!("Capture {} recognized {} chars", self.handle.id, text.len());
                Notification::Recognized {
                    task: self.handle,
                    text,
                }
            }
            Err(e) => {
                self.state = TaskState::Failed;
                warn!("Capture {} failed: {}", self.handle.id, e);
                Notification::Failed {
                    task: self.handle,
                    error: e,
                }
            }
        };

        notifier.send(notification);
        self.state
    }
}

/// Speaks one completed reply
pub struct PlaybackTask {
    handle: TaskHandle,
    text: String,
    state: TaskState,
}

impl PlaybackTask {
    pub fn new(handle: TaskHandle, text: String) -> Self {
        Self {
            handle,
            text,
            state: TaskState::Pending,
        }
    }

    pub fn run(&mut self, output: &dyn SpeechOutput, notifier: &Notifier) -> TaskState {
        self.state = TaskState::Running;

        let notification = match speak_response(output, &self.text) {
            Ok(()) => {
                self.state = TaskState::Completed;
                Notification::Spoken { task: self.handle }
            }
            Err(e) => {
                self.state = TaskState::Failed;
                error!("Playback {} failed: {}", self.handle.id, e);
                Notification::Failed {
                    task: self.handle,
                    error: e,
                }
            }
        };

        notifier.send(notification);
        self.state
    }
}

/// Starts tasks on worker threads and hands their notifications to the UI
pub struct TaskDispatcher {
    client: Arc<dyn ModelClient>,
    capture: Arc<dyn SpeechCapture>,
    output: Arc<dyn SpeechOutput>,
    options: GenerationOptions,
    tx: Sender<Notification>,
    rx: Receiver<Notification>,
    waker: Option<Waker>,
    slots: HashMap<TaskKind, TaskHandle>,
}

impl TaskDispatcher {
    pub fn new(
        client: Arc<dyn ModelClient>,
        capture: Arc<dyn SpeechCapture>,
        output: Arc<dyn SpeechOutput>,
        options: GenerationOptions,
    ) -> Self {
        let (tx, rx) = unbounded();
        Self {
            client,
            capture,
            output,
            options,
            tx,
            rx,
            waker: None,
            slots: HashMap::new(),
        }
    }

    /// Install a callback run after every notification (egui repaint)
    pub fn set_waker(&mut self, waker: impl Fn() + Send + Sync + 'static) {
        self.waker = Some(Arc::new(waker));
    }

    pub fn is_busy(&self, kind: TaskKind) -> bool {
        self.slots.contains_key(&kind)
    }

    pub fn active(&self, kind: TaskKind) -> Option<TaskHandle> {
        self.slots.get(&kind).copied()
    }

    /// Stream a reply for `messages` on a worker
    pub fn submit_turn(&mut self, request: TurnRequest, messages: Vec<Message>) -> Result<TaskHandle> {
        let handle = self.claim(TaskKind::ChatTurn)?;
        let client = Arc::clone(&self.client);
        let options = self.options.clone();

        self.spawn(handle, move |notifier| {
            let mut task = ChatTurnTask::new(handle, request, messages);
            task.run(client.as_ref(), &options, &notifier);
        })
    }

    /// Listen on the microphone on a worker
    pub fn start_capture(&mut self) -> Result<TaskHandle> {
        let handle = self.claim(TaskKind::VoiceCapture)?;
        let capture = Arc::clone(&self.capture);

        self.spawn(handle, move |notifier| {
            VoiceCaptureTask::new(handle).run(capture.as_ref(), &notifier);
        })
    }

    /// Speak `text` on a worker
    pub fn start_playback(&mut self, text: String) -> Result<TaskHandle> {
        let handle = self.claim(TaskKind::Playback)?;
        let output = Arc::clone(&self.output);

        self.spawn(handle, move |notifier| {
            PlaybackTask::new(handle, text).run(output.as_ref(), &notifier);
        })
    }

    /// Next notification, if one is waiting
    pub fn try_recv(&mut self) -> Option<Notification> {
        let notification = self.rx.try_recv().ok()?;
        self.release_if_terminal(&notification);
        Some(notification)
    }

    /// Wait up to `timeout` for the next notification
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<Notification> {
        match self.rx.recv_timeout(timeout) {
            Ok(notification) => {
                self.release_if_terminal(&notification);
                Some(notification)
            }
            Err(RecvTimeoutError::Timeout) => None,
            // The dispatcher holds a sender, so this never happens
            Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    fn claim(&mut self, kind: TaskKind) -> Result<TaskHandle> {
        if self.slots.contains_key(&kind) {
            debug!("Rejected {}: slot busy", kind);
            return Err(MentrisError::SlotBusy(kind));
        }
        let handle = TaskHandle::new(kind);
        self.slots.insert(kind, handle);
        Ok(handle)
    }

    fn release_if_terminal(&mut self, notification: &Notification) {
        if !notification.is_terminal() {
            return;
        }
        let task = notification.task();
        if self.slots.get(&task.kind) == Some(&task) {
            self.slots.remove(&task.kind);
            debug!("Released {} slot", task.kind);
        }
    }

    fn spawn<F>(&mut self, handle: TaskHandle, job: F) -> Result<TaskHandle>
    where
        F: FnOnce(Notifier) + Send + 'static,
    {
        let notifier = Notifier::new(self.tx.clone(), self.waker.clone());
        let panic_notifier = notifier.clone();

        let spawned = thread::Builder::new()
            .name(handle.kind.thread_name().to_string())
            .spawn(move || {
                if panic::catch_unwind(AssertUnwindSafe(|| job(notifier))).is_err() {
                    error!("{} task panicked", handle.kind);
                    panic_notifier.send(Notification::Failed {
                        task: handle,
                        error: MentrisError::ChannelError(format!("{} task panicked", handle.kind)),
                    });
                }
            });

        match spawned {
            Ok(_) => {
                debug!("Started {} task {}", handle.kind, handle.id);
                Ok(handle)
            }
            Err(e) => {
                self.slots.remove(&handle.kind);
                Err(e.into())
            }
        }
    }
}
