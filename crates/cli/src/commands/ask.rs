//! `threadkeeper ask`: answer one question from memory and print it.
//!
//! Nothing is posted to Slack. The exchange is still remembered, the same
//! way a Slack conversation would be.

use super::bootstrap::{self, BoxError};
use threadkeeper_agent::AnswerRequest;
use threadkeeper_agent::prompts::NO_ANSWER_REPLY;
use threadkeeper_core::Role;
use threadkeeper_core::memory::NewMemory;
use threadkeeper_tools::{ToolName, ToolRegistry};

pub async fn run(channel: String, thread_ts: Option<String>, message: String) -> Result<(), BoxError> {
    let config = bootstrap::load_config(None)?;
    let runtime = bootstrap::build_runtime(config)?;
    runtime.memory.ensure_index().await?;

    let registry = ToolRegistry::builtin();
    let mut tools = vec![ToolName::KeywordLookup];
    if thread_ts.as_deref().is_some_and(|ts| !ts.is_empty()) {
        tools.push(ToolName::TimestampLookup);
    }

    let request = AnswerRequest::new(&channel, &message)
        .with_user("cli")
        .with_thread_ts(thread_ts.as_deref())
        .with_tools(registry.definitions(&tools));
    let answer = runtime.orchestrator.answer(request).await?;

    runtime
        .memory
        .upsert(NewMemory::new(Role::User, message.as_str()).with_user("cli").with_channel(&channel))
        .await?;

    match answer {
        Some(text) => {
            runtime
                .memory
                .upsert(NewMemory::new(Role::Assistant, text.as_str()).with_channel(&channel))
                .await?;
            println!("{text}");
        }
        None => println!("{NO_ANSWER_REPLY}"),
    }
    Ok(())
}
