//! Wiring between the chat surface and the blocking collaborators
//!
//! The dispatcher runs model turns, voice captures and playback off the UI
//! thread; the config module loads the settings that build them.

pub mod config;
pub mod dispatcher;

pub use config::{AppConfig, CONFIG_ENV};
pub use dispatcher::{
    ChatTurnTask, Notification, Notifier, PlaybackTask, TaskDispatcher, TaskHandle, TaskKind,
    TaskState, VoiceCaptureTask, Waker,
};
