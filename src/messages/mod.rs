pub mod history;
pub mod types;

pub use history::{ConversationHistory, HistoryConfig, SeedExchange, DEFAULT_SYSTEM_PROMPT};
pub use types::{LogEntry, Message, Role, Speaker, TurnOrigin, TurnRequest};
