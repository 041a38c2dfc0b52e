//! Widgets of the chat window

mod input_bar;
mod message_list;

pub use input_bar::{
    InputBar, INPUT_ACCESS_NAME, INPUT_HINT, LISTENING_LABEL, SEND_ACCESS_NAME, SEND_LABEL,
    VOICE_ACCESS_NAME, VOICE_LABEL,
};
pub use message_list::MessageList;
