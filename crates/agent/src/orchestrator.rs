//! The answer pipeline.
//!
//! For each request:
//!
//! 1. **Build context**: preamble, recent memories, the user's text
//! 2. **Query the model** with the tools offered for this request
//! 3. **If a tool was chosen**: parse its arguments, inject the thread
//!    timestamp, dispatch, persist the result as a `tool` memory
//! 4. **Otherwise**: return the model's answer
//!
//! Summaries and "nothing found" replies are separate, tool-free requests
//! (see [`Summarizer`]), so a dispatch can never trigger another dispatch.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use threadkeeper_config::AppConfig;
use threadkeeper_core::error::Result;
use threadkeeper_core::event::{DomainEvent, EventBus};
use threadkeeper_core::memory::NewMemory;
use threadkeeper_core::message::{Message, Role};
use threadkeeper_core::provider::{Provider, ProviderRequest, ProviderResponse, ToolDefinition};
use threadkeeper_core::tool::ToolInvocation;
use threadkeeper_memory::MemoryStore;
use tracing::{debug, info};

use crate::context::ContextBuilder;
use crate::dispatcher::{DispatchContext, Dispatcher, Summarizer, ToolOutcome};
use crate::prompts;

/// Model and reply settings for the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: String,
    /// Returned when a tool cannot produce anything
    pub fallback_message: String,
    /// Recent memories injected into answer requests
    pub recent_count: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.default_model.clone(),
            temperature: config.default_temperature,
            max_tokens: Some(config.default_max_tokens),
            system_prompt: config.assistant.system_prompt.clone(),
            fallback_message: config.assistant.fallback_message.clone(),
            recent_count: config.memory.recent_count,
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// A user question to answer, possibly with tools.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub text: String,
    pub channel: String,
    pub user: String,
    /// Root of the enclosing thread, if any
    pub thread_ts: Option<String>,
    pub tools: Vec<ToolDefinition>,
    pub include_recent_memory: bool,
}

impl AnswerRequest {
    pub fn new(channel: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            channel: channel.into(),
            user: String::new(),
            thread_ts: None,
            tools: Vec::new(),
            include_recent_memory: true,
        }
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Empty timestamps are ignored.
    pub fn with_thread_ts(mut self, thread_ts: Option<&str>) -> Self {
        self.thread_ts = thread_ts.filter(|ts| !ts.is_empty()).map(str::to_string);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn without_recent_memory(mut self) -> Self {
        self.include_recent_memory = false;
        self
    }
}

pub struct Orchestrator {
    provider: Arc<dyn Provider>,
    memory: Arc<MemoryStore>,
    dispatcher: Dispatcher,
    context: ContextBuilder,
    settings: OrchestratorSettings,
    events: Option<Arc<EventBus>>,
}

impl Orchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        memory: Arc<MemoryStore>,
        dispatcher: Dispatcher,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            provider,
            memory,
            dispatcher,
            context: ContextBuilder::new(&settings.system_prompt),
            settings,
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Answer a question. `None` means the model produced no text.
    pub async fn answer(&self, request: AnswerRequest) -> Result<Option<String>> {
        let recent = if request.include_recent_memory {
            self.memory
                .query_recent(self.settings.recent_count)
                .await?
                .iter()
                .map(|c| c.joined())
                .collect()
        } else {
            Vec::new()
        };

        let messages = self.context.build(&[], &recent, &request.text);
        debug!(
            channel = %request.channel,
            memories = recent.len(),
            tools = request.tools.len(),
            "Querying model"
        );
        let response = self.complete(messages, request.tools.clone()).await?;

        if !response.requests_tool() || response.message.tool_calls.is_empty() {
            return Ok(non_empty(response.message.content));
        }

        let mut invocation = ToolInvocation::from_call(&response.message.tool_calls[0], &request.text)?;
        // Outside a thread the model must not choose the parent itself.
        invocation.inject("ts", request.thread_ts.as_deref().unwrap_or_default());
        info!(tool = %invocation.name, channel = %request.channel, "Dispatching tool");

        let start = Instant::now();
        let outcome = self
            .dispatcher
            .dispatch(
                &invocation,
                DispatchContext {
                    channel: &request.channel,
                    summarizer: self,
                },
            )
            .await?;
        self.publish(DomainEvent::ToolDispatched {
            tool_name: invocation.name.clone(),
            produced: matches!(outcome, ToolOutcome::Produced(_)),
            duration_ms: start.elapsed().as_millis() as u64,
            timestamp: Utc::now(),
        });

        match outcome {
            ToolOutcome::Produced(text) if text.trim().is_empty() => Ok(None),
            ToolOutcome::Produced(text) => {
                let record = NewMemory::new(Role::Tool, text.as_str())
                    .with_user(&request.user)
                    .with_channel(&request.channel)
                    .with_message_ts("")
                    .with_parent_message_ts(invocation.str_arg("ts").unwrap_or_default());
                self.memory.upsert(record).await?;
                Ok(Some(text))
            }
            ToolOutcome::Fallback(text) => Ok(Some(text)),
        }
    }

    async fn complete(&self, messages: Vec<Message>, tools: Vec<ToolDefinition>) -> Result<ProviderResponse> {
        let mut request = ProviderRequest::new(&self.settings.model, messages).with_tools(tools);
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        Ok(self.provider.complete(request).await?)
    }

    fn publish(&self, event: DomainEvent) {
        if let Some(events) = &self.events {
            events.publish(event);
        }
    }
}

#[async_trait]
impl Summarizer for Orchestrator {
    async fn summarize(&self, material: &[String], channel: &str) -> Result<Option<String>> {
        debug!(channel, messages = material.len(), "Summarizing");
        let supplementary = [Message::system(prompts::summarization_prompt(material))];
        let messages = self.context.build(&supplementary, &[], prompts::SUMMARIZATION_QUERY);
        let response = self.complete(messages, Vec::new()).await?;
        Ok(non_empty(response.message.content))
    }

    async fn phrase_not_found(&self, query: &str, channel: &str) -> Result<Option<String>> {
        debug!(channel, "Phrasing not-found reply");
        let messages = self.context.build(&[], &[], &prompts::not_found_query(query));
        let response = self.complete(messages, Vec::new()).await?;
        Ok(non_empty(response.message.content))
    }
}

fn non_empty(content: String) -> Option<String> {
    if content.trim().is_empty() { None } else { Some(content) }
}
