//! Fixed instructions and user-facing replies.

/// Supplementary system entry for the relevance gate.
pub const SHOULD_ANSWER_CONTEXT: &str = "Interpret the user's message, are they requesting an answer or just chatting? \
The purpose of this context is to determine if the assistant should answer the user or not. \
If the query includes words such as 'talk to me', 'AI', or anything that could mean it's calling this assistant, \
it means that the answer should be yes, for other inputs, make a decision based on your best judgment. \
If a question is being made, except if it is directed at another user, you should probably answer. \
If it has 'channel' or 'thread' in the message the answer should probably be yes, but verify anyway.";

/// User turn of a summarization request. The material itself travels in a
/// system entry built by [`summarization_prompt`].
pub const SUMMARIZATION_QUERY: &str = "Summarize the messages provided in the context.";

/// Posted before the answer of a channel message is computed.
pub const PROCESSING_NOTICE: &str = "Processing your request, please wait a moment...";

/// Posted when the model produced no answer.
pub const NO_ANSWER_REPLY: &str = "Sorry, I could not understand or process that.";

/// Posted when handling a message failed.
pub const INTERNAL_ERROR_REPLY: &str =
    "Sorry, something went wrong on my side while handling your message. Please try again later.";

/// System entry carrying the messages to summarize, numbered from 1.
pub fn summarization_prompt(messages: &[String]) -> String {
    let numbered = messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("{}. {}", i + 1, m))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nSummarize the following messages: \n\n{numbered}.\n\n\
         Also include information that is present in the messages that you consider worth mentioning.\n"
    )
}

/// User turn asking the model to phrase a "nothing found" reply.
pub fn not_found_query(query: &str) -> String {
    format!("come up with a nice error message for: {query}")
}
