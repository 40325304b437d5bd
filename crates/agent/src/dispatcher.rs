//! Routes a tool invocation to its handler.
//!
//! Handlers that need the model again (summaries, "nothing found" replies)
//! go through a [`Summarizer`], which never offers tools. That keeps every
//! exchange at most one level deep.

use std::sync::Arc;

use async_trait::async_trait;
use threadkeeper_core::chat::ChatTransport;
use threadkeeper_core::error::{Result, ToolError};
use threadkeeper_core::tool::ToolInvocation;
use threadkeeper_memory::MemoryStore;
use threadkeeper_tools::{KeywordArgs, TimestampArgs, ToolName};
use tracing::{debug, info, warn};

/// Tool-free model requests a handler can make.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize the given messages. `None` if the model produced nothing.
    async fn summarize(&self, material: &[String], channel: &str) -> Result<Option<String>>;

    /// Ask the model to phrase a polite "could not find" reply for `query`.
    async fn phrase_not_found(&self, query: &str, channel: &str) -> Result<Option<String>>;
}

/// What a dispatch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// Model-generated text. Empty when the model returned nothing.
    Produced(String),
    /// The fixed default message. Never persisted.
    Fallback(String),
}

impl ToolOutcome {
    pub fn text(&self) -> &str {
        match self {
            ToolOutcome::Produced(text) | ToolOutcome::Fallback(text) => text,
        }
    }
}

/// Per-request inputs of a dispatch.
pub struct DispatchContext<'a> {
    pub channel: &'a str,
    pub summarizer: &'a dyn Summarizer,
}

/// Executes the lookup tools.
pub struct Dispatcher {
    memory: Arc<MemoryStore>,
    transport: Arc<dyn ChatTransport>,
    fallback_message: String,
}

impl Dispatcher {
    pub fn new(
        memory: Arc<MemoryStore>,
        transport: Arc<dyn ChatTransport>,
        fallback_message: impl Into<String>,
    ) -> Self {
        Self {
            memory,
            transport,
            fallback_message: fallback_message.into(),
        }
    }

    /// Run the named tool. Unknown names and empty threads produce the
    /// fallback message instead of an error.
    pub async fn dispatch(&self, invocation: &ToolInvocation, ctx: DispatchContext<'_>) -> Result<ToolOutcome> {
        match ToolName::parse(&invocation.name) {
            Some(ToolName::KeywordLookup) => self.lookup_by_keyword(invocation, ctx).await,
            Some(ToolName::TimestampLookup) => self.lookup_by_timestamp(invocation, ctx).await,
            Some(ToolName::AnswerGate) => {
                warn!(tool = %invocation.name, "Model selected the answer gate during lookup");
                Ok(self.fallback())
            }
            None => {
                let error = ToolError::UnknownTool(invocation.name.clone());
                warn!(%error, "Falling back to the default message");
                Ok(self.fallback())
            }
        }
    }

    async fn lookup_by_keyword(&self, invocation: &ToolInvocation, ctx: DispatchContext<'_>) -> Result<ToolOutcome> {
        let args: KeywordArgs = invocation.parse_args()?;
        let found = self.memory.thread_messages_by_keyword(&args.keywords).await?;
        info!(keywords = %args.keywords, matches = found.len(), "Keyword thread lookup");

        let text = if found.is_empty() {
            ctx.summarizer
                .phrase_not_found(&invocation.raw_query, ctx.channel)
                .await?
        } else {
            ctx.summarizer.summarize(&found, ctx.channel).await?
        };
        Ok(ToolOutcome::Produced(text.unwrap_or_default()))
    }

    async fn lookup_by_timestamp(&self, invocation: &ToolInvocation, ctx: DispatchContext<'_>) -> Result<ToolOutcome> {
        let args = match invocation.parse_args::<TimestampArgs>() {
            Ok(args) if !args.ts.is_empty() => args,
            _ => {
                warn!(channel = ctx.channel, "Timestamp lookup without a thread timestamp");
                return Ok(self.fallback());
            }
        };

        let replies = self.transport.fetch_thread_replies(ctx.channel, &args.ts).await?;
        let texts: Vec<String> = replies
            .into_iter()
            .map(|r| r.text)
            .filter(|t| !t.trim().is_empty())
            .collect();
        debug!(ts = %args.ts, replies = texts.len(), "Fetched thread replies");

        if texts.is_empty() {
            return Ok(self.fallback());
        }
        let summary = ctx.summarizer.summarize(&texts, ctx.channel).await?;
        Ok(ToolOutcome::Produced(summary.unwrap_or_default()))
    }

    fn fallback(&self) -> ToolOutcome {
        ToolOutcome::Fallback(self.fallback_message.clone())
    }
}
