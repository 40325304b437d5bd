//! Shared test doubles for the agent crate.

use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, VecDeque};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use threadkeeper_core::chat::{ChannelInfo, ChatTransport, PlatformMessage, ThreadReply};
use threadkeeper_core::error::{ChannelError, ProviderError};
use threadkeeper_core::message::{Message, MessageToolCall};
use threadkeeper_core::provider::{
    EmbeddingRequest, EmbeddingResponse, FinishReason, Provider, ProviderRequest, ProviderResponse, Usage,
};
use threadkeeper_memory::{InMemoryVectorStore, MemorySettings, MemoryStore};

pub const DIM: usize = 512;
pub const INDEX: &str = "test";

/// Returns scripted completions in order and embeds by hashing words.
///
/// Panics if more completions are requested than were scripted.
pub struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
    requests: Mutex<Vec<ProviderRequest>>,
    embeddings_fail: bool,
}

impl ScriptedProvider {
    pub fn new(responses: Vec<ProviderResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    pub fn with_results(results: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
        Self {
            responses: Mutex::new(results.into()),
            requests: Mutex::new(Vec::new()),
            embeddings_fail: false,
        }
    }

    /// Every `embed` call fails with a network error.
    pub fn with_failing_embeddings(mut self) -> Self {
        self.embeddings_fail = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> ProviderRequest {
        self.requests.lock().unwrap().last().cloned().expect("no requests made")
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request);
            requests.len()
        };
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("ScriptedProvider: no response scripted for call #{call}"))
    }

    async fn embed(&self, request: EmbeddingRequest) -> Result<EmbeddingResponse, ProviderError> {
        if self.embeddings_fail {
            return Err(ProviderError::Network("embedding endpoint unreachable".into()));
        }
        Ok(EmbeddingResponse {
            embeddings: request.inputs.iter().map(|t| embed_words(t)).collect(),
            model: request.model,
            usage: None,
        })
    }
}

/// Bag-of-words vector: identical texts embed identically, unrelated
/// texts land near zero similarity.
pub fn embed_words(text: &str) -> Vec<f32> {
    let mut v = vec![0.0; DIM];
    for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
        let mut hasher = DefaultHasher::new();
        word.to_lowercase().hash(&mut hasher);
        v[(hasher.finish() % DIM as u64) as usize] += 1.0;
    }
    v
}

fn usage() -> Option<Usage> {
    Some(Usage {
        prompt_tokens: 10,
        completion_tokens: 5,
        total_tokens: 15,
    })
}

pub fn make_text_response(text: &str) -> ProviderResponse {
    ProviderResponse {
        message: Message::assistant(text),
        finish_reason: FinishReason::Stop,
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call_response(tool_calls: Vec<MessageToolCall>) -> ProviderResponse {
    let mut message = Message::assistant("");
    message.tool_calls = tool_calls;
    ProviderResponse {
        message,
        finish_reason: FinishReason::ToolCalls,
        usage: usage(),
        model: "mock-model".into(),
    }
}

pub fn make_tool_call(name: &str, args: serde_json::Value) -> MessageToolCall {
    MessageToolCall {
        id: format!("call_{name}"),
        name: name.to_string(),
        arguments: serde_json::to_string(&args).unwrap(),
    }
}

/// An in-memory index with a word-hashing embedder.
pub fn memory_store() -> (Arc<InMemoryVectorStore>, Arc<MemoryStore>) {
    memory_store_with(Arc::new(ScriptedProvider::new(vec![])))
}

pub fn memory_store_with(embedder: Arc<dyn Provider>) -> (Arc<InMemoryVectorStore>, Arc<MemoryStore>) {
    let store = Arc::new(InMemoryVectorStore::new().with_index(INDEX));
    let settings = MemorySettings {
        index_name: INDEX.into(),
        dimension: DIM,
        ..MemorySettings::default()
    };
    let memory = MemoryStore::new(store.clone(), embedder, settings);
    (store, Arc::new(memory))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posted {
    pub channel: String,
    pub text: String,
    pub thread_ts: Option<String>,
}

/// Serves canned thread replies and records posted messages.
#[derive(Default)]
pub struct MockTransport {
    replies: HashMap<String, Vec<ThreadReply>>,
    posted: Mutex<Vec<Posted>>,
}

impl MockTransport {
    pub fn with_replies(mut self, ts: &str, replies: Vec<ThreadReply>) -> Self {
        self.replies.insert(ts.to_string(), replies);
        self
    }

    pub fn posted(&self) -> Vec<Posted> {
        self.posted.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_thread_replies(&self, _channel: &str, ts: &str) -> Result<Vec<ThreadReply>, ChannelError> {
        Ok(self.replies.get(ts).cloned().unwrap_or_default())
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChannelError> {
        Ok(Vec::new())
    }

    async fn fetch_channel_history(&self, _channel: &str, _limit: usize) -> Result<Vec<PlatformMessage>, ChannelError> {
        Ok(Vec::new())
    }

    async fn post_message(&self, channel: &str, text: &str, thread_ts: Option<&str>) -> Result<(), ChannelError> {
        self.posted.lock().unwrap().push(Posted {
            channel: channel.to_string(),
            text: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        });
        Ok(())
    }
}
