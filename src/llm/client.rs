//! The streaming model seam used by chat-turn tasks

use crate::messages::Message;
use crate::Result;

/// Per-turn generation parameters
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationOptions {
    pub model: String,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Lazy, finite sequence of response fragments in production order.
///
/// Each `next()` may block until the service produces the next fragment. An
/// `Err` item is terminal: the stream yields nothing after it.
pub type FragmentStream = Box<dyn Iterator<Item = Result<String>> + Send>;

/// A language-model service that streams its reply
pub trait ModelClient: Send + Sync {
    /// Start one streamed reply for `messages`.
    ///
    /// Failing before the first fragment returns `Err` directly; failing
    /// later yields a single `Err` item.
    fn stream_turn(&self, messages: &[Message], options: &GenerationOptions)
        -> Result<FragmentStream>;
}
