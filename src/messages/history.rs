//! Conversation history sent to the model on every turn.
//!
//! The history is owned by the UI context and only grows: a completed turn
//! appends exactly one user and one assistant message.

use super::types::{Message, Role};
use serde::{Deserialize, Serialize};

/// System prompt fixing the response language
pub const DEFAULT_SYSTEM_PROMPT: &str = "Responda em português brasileiro.";

/// A user/assistant pair placed after the system prompt at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedExchange {
    pub user: String,
    pub assistant: String,
}

/// Initial contents of a [`ConversationHistory`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryConfig {
    pub system_prompt: String,
    pub seed_exchanges: Vec<SeedExchange>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            seed_exchanges: Vec::new(),
        }
    }
}

impl HistoryConfig {
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_seed_exchange(
        mut self,
        user: impl Into<String>,
        assistant: impl Into<String>,
    ) -> Self {
        self.seed_exchanges.push(SeedExchange {
            user: user.into(),
            assistant: assistant.into(),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Vec<Message>,
    seed_len: usize,
}

impl ConversationHistory {
    pub fn new(config: &HistoryConfig) -> Self {
        let mut messages = Vec::with_capacity(1 + config.seed_exchanges.len() * 2);
        messages.push(Message::system(config.system_prompt.clone()));
        for exchange in &config.seed_exchanges {
            messages.push(Message::user(exchange.user.clone()));
            messages.push(Message::assistant(exchange.assistant.clone()));
        }

        let seed_len = messages.len();
        Self { messages, seed_len }
    }

    /// Append a completed turn: the user message, then the assistant reply
    pub fn append_turn(&mut self, user_text: impl Into<String>, assistant_text: impl Into<String>) {
        self.messages.push(Message::user(user_text));
        self.messages.push(Message::assistant(assistant_text));
    }

    /// Full history plus a trailing user message, ready to send to the model.
    ///
    /// Does not modify the history.
    pub fn snapshot_for_request(&self, user_text: &str) -> Vec<Message> {
        let mut snapshot = Vec::with_capacity(self.messages.len() + 1);
        snapshot.extend(self.messages.iter().cloned());
        snapshot.push(Message::user(user_text));
        snapshot
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Always false: the system prompt is never removed
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Number of messages present at creation
    pub fn seed_len(&self) -> usize {
        self.seed_len
    }

    /// Number of turns completed since creation
    pub fn completed_turns(&self) -> usize {
        (self.messages.len() - self.seed_len) / 2
    }

    pub fn system_prompt(&self) -> &str {
        // Index 0 is always the system message pushed in `new`
        debug_assert_eq!(self.messages[0].role, Role::System);
        &self.messages[0].content
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new(&HistoryConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_seed_is_system_prompt_only() {
        let history = ConversationHistory::default();
        assert_eq!(history.len(), 1);
        assert_eq!(history.seed_len(), 1);
        assert_eq!(history.system_prompt(), DEFAULT_SYSTEM_PROMPT);
        assert!(!history.is_empty());
    }

    #[test]
    fn test_seed_exchanges_follow_system_prompt() {
        let config = HistoryConfig::default().with_seed_exchange("Oi", "Olá! Em que posso ajudar?");
        let history = ConversationHistory::new(&config);

        assert_eq!(history.seed_len(), 3);
        let roles: Vec<Role> = history.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[test]
    fn test_append_turn_grows_by_two_in_order() {
        let mut history = ConversationHistory::default();
        history.append_turn("pergunta", "resposta");

        assert_eq!(history.len(), 3);
        assert_eq!(history.messages()[1], Message::user("pergunta"));
        assert_eq!(history.messages()[2], Message::assistant("resposta"));
        assert_eq!(history.completed_turns(), 1);
    }

    #[test]
    fn test_append_accepts_empty_content() {
        let mut history = ConversationHistory::default();
        history.append_turn("", "");
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut history = ConversationHistory::default();
        history.append_turn("a", "b");

        let snapshot = history.snapshot_for_request("c");

        assert_eq!(snapshot.len(), 4);
        assert_eq!(snapshot.last(), Some(&Message::user("c")));
        assert_eq!(history.len(), 3);
        assert_eq!(history.last(), Some(&Message::assistant("b")));
    }

    #[test]
    fn test_many_turns_alternate_after_seed() {
        let mut history = ConversationHistory::default();
        for i in 0..10 {
            history.append_turn(format!("u{}", i), format!("a{}", i));
        }

        assert_eq!(history.len(), history.seed_len() + 20);
        for (i, message) in history.messages()[history.seed_len()..].iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(message.role, expected);
        }
    }
}
