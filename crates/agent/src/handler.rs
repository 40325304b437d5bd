//! Chat event handling: channel messages, mentions, deletions.
//!
//! A failure before the reply is posted is logged and turned into an
//! apology in the channel. Memory writes happen after the reply and only
//! log. A bad message never takes the listener down.

use std::sync::Arc;

use chrono::Utc;
use threadkeeper_core::chat::{ChatTransport, PlatformMessage};
use threadkeeper_core::error::Result;
use threadkeeper_core::event::{DomainEvent, EventBus};
use threadkeeper_core::memory::NewMemory;
use threadkeeper_core::message::Role;
use threadkeeper_memory::MemoryStore;
use threadkeeper_tools::ToolRegistry;
use tracing::{debug, error, info, warn};

use crate::gate::RelevanceGate;
use crate::orchestrator::{AnswerRequest, Orchestrator};
use crate::prompts;

const PREVIEW_CHARS: usize = 80;

pub struct ConversationHandler {
    orchestrator: Arc<Orchestrator>,
    gate: RelevanceGate,
    memory: Arc<MemoryStore>,
    transport: Arc<dyn ChatTransport>,
    tools: ToolRegistry,
    events: Arc<EventBus>,
}

impl ConversationHandler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        gate: RelevanceGate,
        memory: Arc<MemoryStore>,
        transport: Arc<dyn ChatTransport>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            orchestrator,
            gate,
            memory,
            transport,
            tools: ToolRegistry::builtin(),
            events,
        }
    }

    /// A plain channel message. `bot_user_id` is the assistant's own user,
    /// whose mentions are left to [`Self::on_mention`].
    pub async fn on_message(&self, message: &PlatformMessage, bot_user_id: Option<&str>) {
        if message.is_deletion() {
            self.on_deletion(message).await;
            return;
        }
        if message.bot_id.is_some() {
            debug!(channel = %message.channel, "Ignoring bot message");
            return;
        }
        if bot_user_id.is_some_and(|id| message.mentions(id)) {
            debug!(channel = %message.channel, "Mention left to the mention handler");
            return;
        }

        self.received(message);
        if let Err(e) = self.answer_message(message).await {
            self.report_failure("channel message", message, None, &e).await;
        }
    }

    /// The assistant was mentioned: always answer, in the thread if there is one.
    pub async fn on_mention(&self, message: &PlatformMessage) {
        self.received(message);
        if let Err(e) = self.answer_mention(message).await {
            self.report_failure("mention", message, message.thread(), &e).await;
        }
    }

    async fn answer_message(&self, message: &PlatformMessage) -> Result<()> {
        let should = self.gate.should_respond(message).await?;
        self.events.publish(DomainEvent::RelevanceDecided {
            channel: message.channel.clone(),
            should_respond: should,
            timestamp: Utc::now(),
        });
        if !should {
            return Ok(());
        }

        self.transport
            .post_message(&message.channel, prompts::PROCESSING_NOTICE, None)
            .await?;

        let request = AnswerRequest::new(&message.channel, &message.text)
            .with_user(&message.user)
            .with_thread_ts(message.thread())
            .with_tools(self.tools.for_channel_message());
        let answer = self.orchestrator.answer(request).await?;

        self.deliver(message, answer.as_deref(), None).await?;
        self.remember_exchange(message, answer).await;
        Ok(())
    }

    async fn answer_mention(&self, message: &PlatformMessage) -> Result<()> {
        let thread = message.thread();
        let request = AnswerRequest::new(&message.channel, &message.text)
            .with_user(&message.user)
            .with_thread_ts(thread)
            .with_tools(self.tools.for_mention(thread.is_some()));
        let answer = self.orchestrator.answer(request).await?;

        self.deliver(message, answer.as_deref(), thread).await?;
        self.remember_exchange(message, answer).await;
        Ok(())
    }

    /// Post the answer, or apologize when there is none.
    async fn deliver(&self, message: &PlatformMessage, answer: Option<&str>, thread: Option<&str>) -> Result<()> {
        let text = answer.unwrap_or(prompts::NO_ANSWER_REPLY);
        self.transport.post_message(&message.channel, text, thread).await?;
        if answer.is_some() {
            info!(channel = %message.channel, "Answered");
        }
        Ok(())
    }

    /// Remember the user's message and the answer given to it.
    ///
    /// Runs after delivery, so a failed write is logged and published but
    /// never reaches the channel.
    async fn remember_exchange(&self, message: &PlatformMessage, answer: Option<String>) {
        let parent = message.thread().unwrap_or_default();
        let mut records = vec![
            NewMemory::new(Role::User, message.text.as_str())
                .with_user(&message.user)
                .with_channel(&message.channel)
                .with_message_ts(&message.ts)
                .with_parent_message_ts(parent),
        ];
        if let Some(answer) = answer {
            records.push(
                NewMemory::new(Role::Assistant, answer)
                    .with_channel(&message.channel)
                    .with_message_ts("")
                    .with_parent_message_ts(parent),
            );
        }

        for record in records {
            let role = record.role;
            if let Err(e) = self.memory.upsert(record).await {
                warn!(channel = %message.channel, %role, error = %e, "Failed to remember message");
                self.events.publish(DomainEvent::ErrorOccurred {
                    context: "memory write".into(),
                    error_message: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    async fn on_deletion(&self, message: &PlatformMessage) {
        let Some(previous) = &message.previous_message else {
            warn!(channel = %message.channel, "Deletion event without the deleted message");
            return;
        };

        if let Err(e) = self
            .memory
            .delete_message(&previous.ts, previous.thread_ts.as_deref(), &previous.text)
            .await
        {
            error!(channel = %message.channel, ts = %previous.ts, error = %e, "Failed to forget deleted message");
            self.events.publish(DomainEvent::ErrorOccurred {
                context: "deletion".into(),
                error_message: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    fn received(&self, message: &PlatformMessage) {
        self.events.publish(DomainEvent::MessageReceived {
            channel: message.channel.clone(),
            user: message.user.clone(),
            content_preview: message.text.chars().take(PREVIEW_CHARS).collect(),
            timestamp: Utc::now(),
        });
    }

    async fn report_failure(
        &self,
        context: &str,
        message: &PlatformMessage,
        thread: Option<&str>,
        e: &threadkeeper_core::Error,
    ) {
        error!(context, channel = %message.channel, error = %e, "Failed to handle message");
        self.events.publish(DomainEvent::ErrorOccurred {
            context: context.to_string(),
            error_message: e.to_string(),
            timestamp: Utc::now(),
        });

        if let Err(post_err) = self
            .transport
            .post_message(&message.channel, prompts::INTERNAL_ERROR_REPLY, thread)
            .await
        {
            warn!(channel = %message.channel, error = %post_err, "Could not post apology");
        }
    }
}
