//! Ordered message list for a model request.
//!
//! `[preamble, ...supplementary, ...memories (system), current (user)]`.
//! Pure and deterministic: no I/O happens here.

use threadkeeper_core::message::Message;

/// Builds the message list every model request starts from.
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    preamble: String,
}

impl ContextBuilder {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    /// Assemble the request messages.
    ///
    /// Supplementary entries keep their own roles; each retrieved memory
    /// becomes one system entry, in the order given.
    pub fn build(&self, supplementary: &[Message], memories: &[String], current: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(2 + supplementary.len() + memories.len());
        messages.push(Message::system(&self.preamble));
        messages.extend(supplementary.iter().cloned());
        messages.extend(memories.iter().map(Message::system));
        messages.push(Message::user(current));
        messages
    }
}
