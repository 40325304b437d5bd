//! Error types for the threadkeeper domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all threadkeeper operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Chat platform errors ---
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Channel not configured: {0}")]
    NotConfigured(String),

    #[error("Slack API call {method} failed: {error}")]
    Api { method: String, error: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid event payload: {0}")]
    InvalidPayload(String),

    #[error("Request signature mismatch: {0}")]
    SignatureMismatch(String),
}

#[derive(Debug, Error)]
pub enum MemoryError {
    /// The embedding capability was unreachable or returned malformed output.
    #[error("Embedding generation failed: {0}")]
    EmbeddingFailed(String),

    #[error("Embedding has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The vector store could not be reached.
    #[error("Vector store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed vector store response: {0}")]
    MalformedResponse(String),

    #[error("No stored memory matched the deleted message: {0}")]
    NotFoundOnDelete(String),

    #[error("Operation not supported by the {backend} backend: {operation}")]
    Unsupported { backend: String, operation: String },

    #[error("Index not found: {0}")]
    IndexNotFound(String),
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// The model produced tool arguments that are not valid JSON.
    #[error("Invalid tool arguments for {tool_name}: {reason}")]
    ArgumentParse { tool_name: String, reason: String },

    #[error("Missing argument '{argument}' for {tool_name}")]
    MissingArgument { tool_name: String, argument: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn argument_parse_error_names_tool() {
        let err = Error::Tool(ToolError::ArgumentParse {
            tool_name: "get_thread_by_keyword".into(),
            reason: "expected value at line 1 column 1".into(),
        });
        assert!(err.to_string().contains("get_thread_by_keyword"));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn dimension_mismatch_reports_both_sizes() {
        let err = MemoryError::DimensionMismatch {
            expected: 1536,
            actual: 3,
        };
        let text = err.to_string();
        assert!(text.contains("1536"));
        assert!(text.contains('3'));
    }
}
