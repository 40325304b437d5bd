//! End-to-end tests for threadkeeper.
//!
//! Each test drives a Slack event through the full pipeline: relevance
//! gate, orchestrator, tool dispatch, memory and the reply posted back.
//! The model and Slack are scripted; the vector store is the in-process one.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use threadkeeper_agent::{
    ContextBuilder, ConversationHandler, Dispatcher, Orchestrator, OrchestratorSettings, RelevanceGate,
};
use threadkeeper_channels::{EventEnvelope, SlackEvent, parse_envelope};
use threadkeeper_core::chat::{ChannelInfo, ChatTransport, PlatformMessage, ThreadReply};
use threadkeeper_core::error::{ChannelError, ProviderError};
use threadkeeper_core::event::EventBus;
use threadkeeper_core::memory::NewMemory;
use threadkeeper_core::message::{Message, MessageToolCall, Role};
use threadkeeper_core::provider::{
    EmbeddingRequest, EmbeddingResponse, FinishReason, Provider, ProviderRequest, ProviderResponse,
};
use threadkeeper_memory::{InMemoryVectorStore, MemorySettings, MemoryStore};
use threadkeeper_tools::ToolRegistry;

const DIM: usize = 256;
const INDEX: &str = "e2e";

// ── Mock Provider ────────────────────────────────────────────────────────

/// Returns scripted completions in sequence; embeds by hashing words.
struct ScriptedProvider {
    responses: Mutex<VecDeque<ProviderResponse>>,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<ProviderResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| ProviderError::ApiError {
                status_code: 500,
                message: "script exhausted".into(),
            })
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| embed_words(t)).collect(),
            model: request.model,
            usage: None,
        })
    }
}

fn embed_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }
    v
}

fn text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: FinishReason::Stop,
        usage: None,
        model: "mock-model".into(),
    }
}

fn tool_response(name: &str, args: serde_json::Value) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = vec![MessageToolCall {
        id: format!("call_{name}"),
        name: name.into(),
        arguments: args.to_string(),
    }];
    ProviderResponse {
        message,
        finish_reason: FinishReason::ToolCalls,
        usage: None,
        model: "mock-model".into(),
    }
}

// ── Mock Slack ───────────────────────────────────────────────────────────

#[derive(Default)]
struct FakeSlack {
    threads: HashMap<String, Vec<ThreadReply>>,
    posted: Mutex<Vec<(String, String, Option<String>)>>,
}

impl FakeSlack {
    fn with_thread(mut self, ts: &str, texts: &[&str]) -> Self {
        let replies = texts
            .iter()
            .enumerate()
            .map(|(i, t)| ThreadReply {
                text: t.to_string(),
                ts: format!("{ts}{i}"),
            })
            .collect();
        self.threads.insert(ts.to_string(), replies);
        self
    }

    fn posted(&self) -> Vec<(String, String, Option<String>)> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for FakeSlack {
    fn name(&self) -> &str {
        "fake-slack"
    }

    async fn fetch_thread_replies(&self, _channel: &str, ts: &str) -> Result<Vec<ThreadReply>, ChannelError> {
        Ok(self.threads.get(ts).cloned().unwrap_or_default())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChannelError> {
        Ok(Vec::new())
    }

    async fn fetch_channel_history(&self, _channel: &str, _limit: usize) -> Result<Vec<PlatformMessage>, ChannelError> {
        Ok(Vec::new())
    }

    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<(), ChannelError> {
        self.posted
            .lock()
            .unwrap()
            .push((channel.into(), text.into(), thread_ts.map(str::to_string)));
        Ok(())
    }
}

// ── Wiring ───────────────────────────────────────────────────────────────

struct App {
    provider: Arc<ScriptedProvider>,
    slack: Arc<FakeSlack>,
    store: Arc<InMemoryVectorStore>,
    memory: Arc<MemoryStore>,
    handler: ConversationHandler,
}

fn app(responses: Vec<ProviderResponse>, slack: FakeSlack) -> App {
    let provider = Arc::new(ScriptedProvider::new(responses));
    let slack = Arc::new(slack);
    let store = Arc::new(InMemoryVectorStore::new().with_index(INDEX));
    let events = Arc::new(EventBus::default());

    let settings = MemorySettings {
        index_name: INDEX.into(),
        dimension: DIM,
        ..MemorySettings::default()
    };
    let memory = Arc::new(MemoryStore::new(store.clone(), provider.clone(), settings).with_events(events.clone()));

    let orchestrator_settings = OrchestratorSettings::default();
    let dispatcher = Dispatcher::new(memory.clone(), slack.clone(), &orchestrator_settings.fallback_message);
    let gate = RelevanceGate::new(
        provider.clone(),
        &orchestrator_settings.model,
        0.0,
        ContextBuilder::new(&orchestrator_settings.system_prompt),
        ToolRegistry::builtin().for_relevance_gate(),
    );
    let orchestrator = Arc::new(
        Orchestrator::new(provider.clone(), memory.clone(), dispatcher, orchestrator_settings)
            .with_events(events.clone()),
    );
    let handler = ConversationHandler::new(orchestrator, gate, memory.clone(), slack.clone(), events);

    App {
        provider,
        slack,
        store,
        memory,
        handler,
    }
}

fn slack_event(json: serde_json::Value) -> (SlackEvent, Option<String>) {
    let body = serde_json::to_vec(&json).unwrap();
    match parse_envelope(&body).unwrap() {
        EventEnvelope::EventCallback(callback) => {
            let bot = callback.bot_user_id().map(str::to_string);
            (callback.event, bot)
        }
        other => panic!("expected an event callback, got {other:?}"),
    }
}

async fn deliver(app: &App, json: serde_json::Value) {
    let (event, bot) = slack_event(json);
    match event {
        SlackEvent::Message(message) => app.handler.on_message(&message, bot.as_deref()).await,
        SlackEvent::AppMention(message) => app.handler.on_mention(&message).await,
        SlackEvent::Other => panic!("unexpected event type"),
    }
}

// ── Scenarios ────────────────────────────────────────────────────────────

#[tokio::test]
async fn keyword_lookup_with_no_matches_phrases_not_found() {
    let app = app(
        vec![
            tool_response("answer_user_query", serde_json::json!({})),
            tool_response("get_thread_by_keyword", serde_json::json!({"keywords": "outage"})),
            text_response("I couldn't find any thread about the outage."),
        ],
        FakeSlack::default(),
    );

    deliver(
        &app,
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "message", "channel": "C1", "user": "U1", "ts": "200.1",
                "text": "find the thread about the outage"
            },
            "authorizations": [{"user_id": "UBOT"}]
        }),
    )
    .await;

    let requests = app.provider.requests();
    assert_eq!(requests.len(), 3);
    // Relevance check, then the answer request offering the keyword tool
    assert_eq!(requests[0].tools.len(), 1);
    assert_eq!(requests[1].tools[0].name, "get_thread_by_keyword");
    // The not-found phrasing carries no tools
    assert!(requests[2].tools.is_empty());
    assert!(requests[2].tool_choice.is_none());

    let records = app.store.records(INDEX).await;
    let tool_records: Vec<_> = records.iter().filter(|r| r.metadata.role == Role::Tool).collect();
    assert_eq!(tool_records.len(), 1);
    let answer = tool_records[0].metadata.content.joined();
    assert!(!answer.is_empty());
    assert_eq!(answer, "I couldn't find any thread about the outage.");

    let posted = app.slack.posted();
    assert_eq!(posted.len(), 2, "processing notice, then the answer");
    assert_eq!(posted[1].1, answer);
    assert!(records.iter().any(|r| r.metadata.role == Role::User && r.metadata.message_ts == "200.1"));
}

#[tokio::test]
async fn thread_summary_is_remembered_under_the_thread() {
    let app = app(
        vec![
            tool_response("get_thread_by_ts", serde_json::json!({})),
            text_response("The team agreed to ship on Friday after fixing the login bug."),
        ],
        FakeSlack::default().with_thread(
            "100.1",
            &["shall we ship friday?", "only after the login bug is fixed", "agreed, fix first"],
        ),
    );

    deliver(
        &app,
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "app_mention", "channel": "C1", "user": "U1", "ts": "100.9",
                "thread_ts": "100.1", "text": "<@UBOT> summarize this thread"
            }
        }),
    )
    .await;

    let requests = app.provider.requests();
    assert_eq!(requests.len(), 2);
    let offered: Vec<_> = requests[0].tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(offered, vec!["get_thread_by_ts"]);
    assert!(requests[1].tools.is_empty());
    let material: String = requests[1].messages.iter().map(|m| m.content.as_str()).collect();
    assert!(material.contains("only after the login bug is fixed"));

    let records = app.store.records(INDEX).await;
    let tool_record = records
        .iter()
        .find(|r| r.metadata.role == Role::Tool)
        .expect("tool result is remembered");
    assert_eq!(tool_record.metadata.parent_message_ts, "100.1");

    let posted = app.slack.posted();
    assert_eq!(posted.len(), 1);
    assert_eq!(posted[0].2.as_deref(), Some("100.1"));
}

#[tokio::test]
async fn deleting_a_message_removes_its_best_match_only() {
    let app = app(vec![], FakeSlack::default());
    let kept = app
        .memory
        .upsert(
            NewMemory::new(Role::User, "lunch is at noon on thursdays")
                .with_channel("C1")
                .with_message_ts("300.2"),
        )
        .await
        .unwrap();
    let doomed = app
        .memory
        .upsert(
            NewMemory::new(Role::User, "the deploy key lives in the vault")
                .with_channel("C1")
                .with_message_ts("300.1"),
        )
        .await
        .unwrap();

    deliver(
        &app,
        serde_json::json!({
            "type": "event_callback",
            "event": {
                "type": "message", "subtype": "message_deleted", "channel": "C1", "hidden": true,
                "deleted_ts": "300.1", "ts": "301.0",
                "previous_message": {"type": "message", "text": "the deploy key lives in the vault", "ts": "300.1"}
            }
        }),
    )
    .await;

    assert_eq!(app.store.deleted_ids(), vec![doomed]);
    let remaining: Vec<_> = app.store.records(INDEX).await.into_iter().map(|r| r.id).collect();
    assert_eq!(remaining, vec![kept]);
    assert!(app.provider.requests().is_empty());
    assert!(app.slack.posted().is_empty());
}

#[tokio::test]
async fn irrelevant_chatter_is_ignored() {
    let app = app(vec![text_response("no")], FakeSlack::default());

    deliver(
        &app,
        serde_json::json!({
            "type": "event_callback",
            "event": {"type": "message", "channel": "C1", "user": "U2", "ts": "400.1", "text": "brb coffee"}
        }),
    )
    .await;

    assert_eq!(app.provider.requests().len(), 1);
    assert!(app.slack.posted().is_empty());
    assert_eq!(app.store.count(INDEX).await, 0);
}
