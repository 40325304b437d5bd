//! Relevance gate: should the assistant answer this message at all?
//!
//! The model is offered a single argument-less tool. Calling it means yes.

use std::sync::Arc;

use threadkeeper_core::chat::PlatformMessage;
use threadkeeper_core::error::ProviderError;
use threadkeeper_core::message::Message;
use threadkeeper_core::provider::{Provider, ProviderRequest, ToolDefinition};
use tracing::debug;

use crate::context::ContextBuilder;
use crate::prompts::SHOULD_ANSWER_CONTEXT;

pub struct RelevanceGate {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    context: ContextBuilder,
    tools: Vec<ToolDefinition>,
}

impl RelevanceGate {
    /// `tools` is what the model may call to say yes, normally just the
    /// answer gate definition.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        temperature: f32,
        context: ContextBuilder,
        tools: Vec<ToolDefinition>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature,
            context,
            tools,
        }
    }

    /// Decide whether to answer. Empty messages and messages carrying a
    /// subtype are `false` without a model call; provider errors propagate.
    pub async fn should_respond(&self, message: &PlatformMessage) -> Result<bool, ProviderError> {
        if message.subtype.is_some() || message.text.trim().is_empty() {
            debug!(channel = %message.channel, "Skipping relevance check");
            return Ok(false);
        }

        let messages = self
            .context
            .build(&[Message::system(SHOULD_ANSWER_CONTEXT)], &[], &message.text);
        let mut request = ProviderRequest::new(&self.model, messages).with_tools(self.tools.clone());
        request.temperature = self.temperature;

        let response = self.provider.complete(request).await?;
        let should = response.requests_tool();
        debug!(channel = %message.channel, should_respond = should, "Relevance decided");
        Ok(should)
    }
}
