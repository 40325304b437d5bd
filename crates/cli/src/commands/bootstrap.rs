//! Wiring shared by the commands: config in, a ready runtime out.

use async_trait::async_trait;
use std::sync::Arc;
use threadkeeper_agent::{ContextBuilder, ConversationHandler, Dispatcher, Orchestrator, OrchestratorSettings, RelevanceGate};
use threadkeeper_channels::SlackClient;
use threadkeeper_config::AppConfig;
use threadkeeper_core::chat::{ChannelInfo, ChatTransport, PlatformMessage, ThreadReply};
use threadkeeper_core::error::ChannelError;
use threadkeeper_core::{EventBus, Provider, VectorStore};
use threadkeeper_memory::{InMemoryVectorStore, MemorySettings, MemoryStore, PineconeStore};
use threadkeeper_tools::ToolRegistry;
use tracing::{info, warn};

pub type BoxError = Box<dyn std::error::Error>;

pub struct Runtime {
    pub config: AppConfig,
    pub provider: Arc<dyn Provider>,
    pub store: Arc<dyn VectorStore>,
    pub memory: Arc<MemoryStore>,
    pub transport: Arc<dyn ChatTransport>,
    /// Set when a Slack bot token is configured
    pub slack: Option<Arc<SlackClient>>,
    pub orchestrator: Arc<Orchestrator>,
    pub events: Arc<EventBus>,
}

impl Runtime {
    pub fn handler(&self) -> ConversationHandler {
        let gate = RelevanceGate::new(
            self.provider.clone(),
            &self.config.default_model,
            self.config.default_temperature,
            ContextBuilder::new(&self.config.assistant.system_prompt),
            ToolRegistry::builtin().for_relevance_gate(),
        );
        ConversationHandler::new(
            self.orchestrator.clone(),
            gate,
            self.memory.clone(),
            self.transport.clone(),
            self.events.clone(),
        )
    }
}

pub fn load_config(port_override: Option<u16>) -> Result<AppConfig, BoxError> {
    let mut config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    Ok(config)
}

pub fn build_provider(config: &AppConfig) -> Result<Arc<dyn Provider>, BoxError> {
    if !config.has_api_key() && config.providers.is_empty() {
        return Err("No API key configured; set OPENAI_API_KEY or api_key in config.toml".into());
    }
    threadkeeper_providers::router::build_from_config(config)
        .default()
        .ok_or_else(|| format!("Provider '{}' is not available", config.default_provider).into())
}

pub fn build_vector_store(config: &AppConfig) -> Result<Arc<dyn VectorStore>, BoxError> {
    match config.memory.backend.as_str() {
        "pinecone" => {
            let api_key = config
                .memory
                .pinecone_api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or("memory.backend is \"pinecone\" but PINECONE_API_KEY is not set")?;
            let mut store = PineconeStore::new(api_key).with_filtered_delete(config.memory.filtered_delete);
            if let Some(url) = &config.memory.pinecone_api_url {
                store = store.with_control_plane(url);
            }
            Ok(Arc::new(store))
        }
        "in_memory" => {
            warn!("Using the in-memory vector store; memories are lost on exit");
            Ok(Arc::new(InMemoryVectorStore::new()))
        }
        other => Err(format!("Unknown memory.backend '{other}'").into()),
    }
}

pub fn build_runtime(config: AppConfig) -> Result<Runtime, BoxError> {
    let provider = build_provider(&config)?;
    let store = build_vector_store(&config)?;
    let events = Arc::new(EventBus::default());

    let memory = Arc::new(
        MemoryStore::new(store.clone(), provider.clone(), MemorySettings::from_config(&config))
            .with_events(events.clone()),
    );

    let slack = match SlackClient::from_config(&config.slack) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            warn!(error = %e, "Slack is not configured");
            None
        }
    };
    let transport: Arc<dyn ChatTransport> = match &slack {
        Some(client) => client.clone(),
        None => Arc::new(DetachedTransport),
    };

    let settings = OrchestratorSettings::from_config(&config);
    let dispatcher = Dispatcher::new(memory.clone(), transport.clone(), &settings.fallback_message);
    let orchestrator = Arc::new(
        Orchestrator::new(provider.clone(), memory.clone(), dispatcher, settings).with_events(events.clone()),
    );

    info!(
        provider = provider.name(),
        store = store.name(),
        model = %config.default_model,
        "Runtime ready"
    );

    Ok(Runtime {
        config,
        provider,
        store,
        memory,
        transport,
        slack,
        orchestrator,
        events,
    })
}

/// Stands in for Slack when no bot token is configured. Every call fails
/// with [`ChannelError::NotConfigured`].
pub struct DetachedTransport;

impl DetachedTransport {
    fn unavailable<T>() -> Result<T, ChannelError> {
        Err(ChannelError::NotConfigured("slack.bot_token is not set".into()))
    }
}

#[async_trait]
impl ChatTransport for DetachedTransport {
    fn name(&self) -> &str {
        "detached"
    }

    async fn fetch_thread_replies(&self, _channel: &str, _ts: &str) -> Result<Vec<ThreadReply>, ChannelError> {
        Self::unavailable()
    }

    async fn list_channels(&self) -> Result<Vec<ChannelInfo>, ChannelError> {
        Self::unavailable()
    }

    async fn fetch_channel_history(&self, _channel: &str, _limit: usize) -> Result<Vec<PlatformMessage>, ChannelError> {
        Self::unavailable()
    }

    async fn post_message(&self, _channel: &str, _text: &str, _thread_ts: Option<&str>) -> Result<(), ChannelError> {
        Self::unavailable()
    }
}
