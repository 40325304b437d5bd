//! Provider selection: one OpenAI-compatible client per configured name.

use std::collections::HashMap;
use std::sync::Arc;
use threadkeeper_config::AppConfig;
use threadkeeper_core::provider::Provider;
use tracing::warn;
use crate::openai_compat::OpenAiCompatProvider;

/// Configured providers, looked up by name.
pub struct ProviderRouter {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_name: String,
}

impl ProviderRouter {
    /// The provider named by `default_provider`.
    pub fn default(&self) -> Option<Arc<dyn Provider>> {
        self.get(&self.default_name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Provider>> {
        self.providers.get(name).cloned()
    }
}

/// Build providers from configuration.
///
/// Every `[providers.<name>]` section becomes a client; the default provider
/// gets one from the top-level key even without a section. Names other than
/// the well-known hosts need an explicit `api_url` and are skipped without one.
pub fn build_from_config(config: &AppConfig) -> ProviderRouter {
    let mut providers: HashMap<String, Arc<dyn Provider>> = HashMap::new();

    for (name, section) in &config.providers {
        let api_key = section.api_key.as_deref().or(config.api_key.as_deref());
        if let Some(client) = client(name, section.api_url.as_deref(), api_key) {
            providers.insert(name.clone(), client);
        }
    }

    if !providers.contains_key(&config.default_provider) {
        if let Some(client) = client(&config.default_provider, None, config.api_key.as_deref()) {
            providers.insert(config.default_provider.clone(), client);
        }
    }

    ProviderRouter {
        providers,
        default_name: config.default_provider.clone(),
    }
}

fn client(name: &str, api_url: Option<&str>, api_key: Option<&str>) -> Option<Arc<dyn Provider>> {
    let Some(base_url) = api_url.or_else(|| known_base_url(name)) else {
        warn!(provider = name, "No api_url for provider, skipping it");
        return None;
    };
    Some(Arc::new(OpenAiCompatProvider::new(name, base_url, api_key.unwrap_or_default())))
}

fn known_base_url(name: &str) -> Option<&'static str> {
    match name {
        "openai" => Some("https://api.openai.com/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        "vllm" => Some("http://localhost:8000/v1"),
        _ => None,
    }
}
