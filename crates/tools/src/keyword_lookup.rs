//! Keyword thread lookup: find stored messages about a topic.
//!
//! The dispatcher runs a similarity search over memory with the model's
//! keywords and summarizes whatever it finds.

use serde::{Deserialize, Serialize};
use crate::{ToolName, ToolSpec};

pub const NAME: &str = "get_thread_by_keyword";

/// Arguments the model supplies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordArgs {
    /// Phrase used to search memory
    pub keywords: String,
}

pub struct KeywordLookupTool;

impl ToolSpec for KeywordLookupTool {
    fn name(&self) -> ToolName {
        ToolName::KeywordLookup
    }

    fn description(&self) -> &str {
        "Fetch a single message or the replies from a thread on a given Slack channel using keyword(s). \
         Only call this if the word thread is present in the query."
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "keywords": {
                    "type": "string",
                    "description": "The phrase that will be used to search for the thread in the channel"
                }
            },
            "required": ["keywords"]
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_requires_keywords() {
        let def = KeywordLookupTool.to_definition();
        assert_eq!(def.name, NAME);
        assert_eq!(def.parameters["required"][0], "keywords");
        assert!(def.description.contains("thread"));
    }

    #[test]
    fn args_deserialize() {
        let args: KeywordArgs = serde_json::from_str(r#"{"keywords":"outage","ts":"1.0"}"#).unwrap();
        assert_eq!(args.keywords, "outage");
    }
}
