use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role of a message sent to the model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One role-tagged message of the conversation.
///
/// Serializes to the `{"role": ..., "content": ...}` shape the chat endpoint expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Where a submitted turn came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOrigin {
    Typed,
    Voice,
}

/// A single user submission, consumed by exactly one chat-turn task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnRequest {
    pub user_text: String,
    pub origin: TurnOrigin,
}

impl TurnRequest {
    pub fn typed(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            origin: TurnOrigin::Typed,
        }
    }

    pub fn voice(user_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            origin: TurnOrigin::Voice,
        }
    }

    pub fn is_voice(&self) -> bool {
        self.origin == TurnOrigin::Voice
    }
}

/// Who a line of the visible chat log belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
    System,
}

impl Speaker {
    /// Label shown above the entry
    pub fn label(&self) -> &'static str {
        match self {
            Speaker::User => "Você",
            Speaker::Assistant => "Mentris",
            Speaker::System => "Sistema",
        }
    }
}

/// An entry of the scrollback log shown in the window.
///
/// Unlike [`Message`], log entries are display-only: the assistant entry grows
/// chunk by chunk while a turn streams, and error lines never reach the model.
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub id: Uuid,
    pub speaker: Speaker,
    pub text: String,
    pub timestamp: DateTime<Local>,
}

impl LogEntry {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            speaker,
            text: text.into(),
            timestamp: Local::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_lowercase_role() {
        let json = serde_json::to_string(&Message::assistant("oi")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"oi"}"#);
    }

    #[test]
    fn test_turn_request_origin() {
        assert!(TurnRequest::voice("olá").is_voice());
        assert!(!TurnRequest::typed("olá").is_voice());
    }

    #[test]
    fn test_speaker_labels() {
        assert_eq!(Speaker::User.label(), "Você");
        assert_eq!(Speaker::Assistant.label(), "Mentris");
        assert_eq!(Speaker::System.label(), "Sistema");
    }
}
