//! Answer gate, the relevance check's yes/no signal.
//!
//! Never dispatched. The model calling it is the "yes".

use crate::{ToolName, ToolSpec};

pub const NAME: &str = "answer_user_query";

pub struct AnswerGateTool;

impl ToolSpec for AnswerGateTool {
    fn name(&self) -> ToolName {
        ToolName::AnswerGate
    }

    fn description(&self) -> &str {
        "Decide if a user query should be answered or not. Only call this if the AI assistant gets called directly."
    }

    fn parameters_schema(&self) -> Option<serde_json::Value> {
        None
    }
}
