//! Tool registry for threadkeeper.
//!
//! Declares the tools the model may choose instead of answering directly:
//! thread lookup by keyword, thread lookup by timestamp, and the answer gate
//! used only by the relevance check. Execution lives in the agent crate's
//! dispatcher; this crate only describes the tools and picks which of them
//! are offered in each context.

pub mod answer_gate;
pub mod keyword_lookup;
pub mod timestamp_lookup;

use std::collections::BTreeMap;
use threadkeeper_core::provider::ToolDefinition;

pub use keyword_lookup::KeywordArgs;
pub use timestamp_lookup::TimestampArgs;

/// The tools the model can select, by wire name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ToolName {
    /// `get_thread_by_keyword`
    KeywordLookup,
    /// `get_thread_by_ts`
    TimestampLookup,
    /// `answer_user_query`
    AnswerGate,
}

impl ToolName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolName::KeywordLookup => keyword_lookup::NAME,
            ToolName::TimestampLookup => timestamp_lookup::NAME,
            ToolName::AnswerGate => answer_gate::NAME,
        }
    }

    /// Parse a wire name. Anything unrecognized is `None`.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            keyword_lookup::NAME => Some(ToolName::KeywordLookup),
            timestamp_lookup::NAME => Some(ToolName::TimestampLookup),
            answer_gate::NAME => Some(ToolName::AnswerGate),
            _ => None,
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A declared tool: what the model sees when deciding whether to call it.
pub trait ToolSpec: Send + Sync {
    fn name(&self) -> ToolName;

    /// Natural-language description consumed by the model.
    fn description(&self) -> &str;

    /// JSON Schema of the arguments, or `None` for argument-less tools.
    fn parameters_schema(&self) -> Option<serde_json::Value>;

    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().as_str().to_string(),
            description: self.description().to_string(),
            parameters: self
                .parameters_schema()
                .unwrap_or_else(|| serde_json::json!({ "type": "object", "properties": {} })),
        }
    }
}

/// All declared tools, looked up by name.
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Box<dyn ToolSpec>>,
}

impl ToolRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// A registry with every built-in tool.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(keyword_lookup::KeywordLookupTool));
        registry.register(Box::new(timestamp_lookup::TimestampLookupTool));
        registry.register(Box::new(answer_gate::AnswerGateTool));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn ToolSpec>) {
        self.tools.insert(tool.name(), tool);
    }

    pub fn get(&self, name: ToolName) -> Option<&dyn ToolSpec> {
        self.tools.get(&name).map(|t| t.as_ref())
    }

    /// Definitions for the named tools, in the order given. Unregistered
    /// names are skipped.
    pub fn definitions(&self, names: &[ToolName]) -> Vec<ToolDefinition> {
        names
            .iter()
            .filter_map(|name| self.get(*name))
            .map(|tool| tool.to_definition())
            .collect()
    }

    /// Tools offered when answering an ordinary channel message.
    pub fn for_channel_message(&self) -> Vec<ToolDefinition> {
        self.definitions(&[ToolName::KeywordLookup])
    }

    /// Tools offered when the bot is mentioned. Timestamp lookup only makes
    /// sense inside a thread.
    pub fn for_mention(&self, in_thread: bool) -> Vec<ToolDefinition> {
        if in_thread {
            self.definitions(&[ToolName::TimestampLookup])
        } else {
            Vec::new()
        }
    }

    /// The single tool offered to the relevance gate.
    pub fn for_relevance_gate(&self) -> Vec<ToolDefinition> {
        self.definitions(&[ToolName::AnswerGate])
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_and_unknown_is_none() {
        for name in [ToolName::KeywordLookup, ToolName::TimestampLookup, ToolName::AnswerGate] {
            assert_eq!(ToolName::parse(name.as_str()), Some(name));
        }
        assert_eq!(ToolName::parse("shell"), None);
        assert_eq!(ToolName::KeywordLookup.to_string(), "get_thread_by_keyword");
    }

    #[test]
    fn builtin_registry_has_three_tools() {
        let registry = ToolRegistry::builtin();
        assert_eq!(registry.len(), 3);
        assert!(registry.get(ToolName::AnswerGate).is_some());
    }

    #[test]
    fn channel_message_offers_keyword_lookup_only() {
        let tools = ToolRegistry::builtin().for_channel_message();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_thread_by_keyword");
    }

    #[test]
    fn mention_offers_timestamp_lookup_only_in_thread() {
        let registry = ToolRegistry::builtin();
        assert!(registry.for_mention(false).is_empty());
        let tools = registry.for_mention(true);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "get_thread_by_ts");
    }

    #[test]
    fn gate_tool_has_empty_object_schema() {
        let tools = ToolRegistry::builtin().for_relevance_gate();
        assert_eq!(tools[0].name, "answer_user_query");
        assert_eq!(tools[0].parameters["type"], "object");
    }

    #[test]
    fn empty_registry_yields_no_definitions() {
        let registry = ToolRegistry::new();
        assert!(registry.is_empty());
        assert!(registry.for_channel_message().is_empty());
    }
}
