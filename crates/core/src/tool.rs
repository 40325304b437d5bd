//! Tool invocation: the model's decision to call a tool instead of answering.
//!
//! An invocation is ephemeral: it is produced by interpreting a model
//! response and consumed immediately by the dispatcher. Nothing here is
//! persisted.

use serde::{Deserialize, Serialize};
use crate::error::ToolError;
use crate::message::MessageToolCall;

/// A parsed tool call ready for dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Name of the tool the model selected
    pub name: String,

    /// Parsed argument object
    pub arguments: serde_json::Map<String, serde_json::Value>,

    /// The user text that led to this call
    pub raw_query: String,
}

impl ToolInvocation {
    /// Parse a model tool call. Empty arguments count as `{}`; anything that
    /// is not a JSON object is an `ArgumentParse` error.
    pub fn from_call(
        call: &MessageToolCall,
        raw_query: impl Into<String>,
    ) -> std::result::Result<Self, ToolError> {
        let arguments = if call.arguments.trim().is_empty() {
            serde_json::Map::new()
        } else {
            let value: serde_json::Value =
                serde_json::from_str(&call.arguments).map_err(|e| ToolError::ArgumentParse {
                    tool_name: call.name.clone(),
                    reason: e.to_string(),
                })?;
            match value {
                serde_json::Value::Object(map) => map,
                other => {
                    return Err(ToolError::ArgumentParse {
                        tool_name: call.name.clone(),
                        reason: format!("expected a JSON object, got {other}"),
                    });
                }
            }
        };

        Ok(Self {
            name: call.name.clone(),
            arguments,
            raw_query: raw_query.into(),
        })
    }

    /// Set an argument, replacing whatever the model supplied.
    pub fn inject(&mut self, key: &str, value: impl Into<String>) {
        self.arguments
            .insert(key.to_string(), serde_json::Value::String(value.into()));
    }

    /// A string argument, if present and non-empty.
    pub fn str_arg(&self, key: &str) -> Option<&str> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// Deserialize the arguments into a typed struct. An absent required
    /// field is reported as [`ToolError::MissingArgument`].
    pub fn parse_args<T: serde::de::DeserializeOwned>(&self) -> std::result::Result<T, ToolError> {
        serde_json::from_value(serde_json::Value::Object(self.arguments.clone())).map_err(|e| {
            let reason = e.to_string();
            match missing_field(&reason) {
                Some(argument) => ToolError::MissingArgument {
                    tool_name: self.name.clone(),
                    argument: argument.to_string(),
                },
                None => ToolError::ArgumentParse {
                    tool_name: self.name.clone(),
                    reason,
                },
            }
        })
    }
}

/// The field name in serde's "missing field `name`" message.
fn missing_field(reason: &str) -> Option<&str> {
    reason.strip_prefix("missing field `")?.split('`').next()
}
