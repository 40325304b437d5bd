//! Answering Slack messages from conversational memory.
//!
//! An inbound message flows through:
//!
//! 1. **Relevance gate** (channel messages only): should we answer at all?
//! 2. **Orchestrator**: build context, query the model with the tools
//!    offered for this path, dispatch a tool if one is chosen
//! 3. **Dispatcher**: keyword or thread lookup, summarized by a second,
//!    tool-free model request
//! 4. **Handler**: post the reply and remember both sides of the exchange

pub mod context;
pub mod dispatcher;
pub mod gate;
pub mod handler;
pub mod orchestrator;
pub mod prompts;

#[cfg(test)]
mod test_helpers;

pub use context::ContextBuilder;
pub use dispatcher::{DispatchContext, Dispatcher, Summarizer, ToolOutcome};
pub use gate::RelevanceGate;
pub use handler::ConversationHandler;
pub use orchestrator::{AnswerRequest, Orchestrator, OrchestratorSettings};
