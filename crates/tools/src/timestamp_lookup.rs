//! Timestamp thread lookup: summarize the thread the user is writing in.
//!
//! Only offered when the inbound message is itself inside a thread. The
//! orchestrator overwrites `ts` with the enclosing thread's root, so the
//! model does not need to know it.

use serde::{Deserialize, Serialize};
use crate::{ToolName, ToolSpec};

pub const NAME: &str = "get_thread_by_ts";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestampArgs {
    /// Timestamp of the thread's root message
    pub ts: String,
}

pub struct TimestampLookupTool;

impl ToolSpec for TimestampLookupTool {
    fn name(&self) -> ToolName {
        ToolName::TimestampLookup
    }

    fn description(&self) -> &str {
        "Fetch every reply of the current Slack thread so it can be summarized. \
         Only call this if the user asks about the thread they are writing in."
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        Some(serde_json::json!({
            "type": "object",
            "properties": {
                "ts": {
                    "type": "string",
                    "description": "The timestamp of the thread's first message"
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ts_is_not_required_from_the_model() {
        let def = TimestampLookupTool.to_definition();
        assert_eq!(def.name, NAME);
        assert!(def.parameters.get("required").is_none());
    }

    #[test]
    fn missing_ts_fails_to_deserialize() {
        assert!(serde_json::from_str::<TimestampArgs>("{}").is_err());
    }
}
