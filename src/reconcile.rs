//! Tool-call obligation reconciliation.
//!
//! The agent protocol requires every tool call emitted by an `ai` message to be
//! answered by a `tool` message before the next human turn. When the user moves
//! on without the frontend answering a call, placeholder results are synthesized.

use agent_stream::{Message, Role, ToolCall};

use crate::config::SyntheticToolResults;
use crate::ids::synthetic_tool_result_id;

/// Returns the tool calls in `messages` that no later `tool` message answers,
/// in the order they were emitted.
///
/// A result that appears before its call does not answer it. Duplicate call ids
/// are tracked per occurrence: each result retires only the earliest matching
/// outstanding call.
#[must_use]
pub fn unanswered_tool_calls(messages: &[Message]) -> Vec<&ToolCall> {
    let mut outstanding: Vec<&ToolCall> = Vec::new();

    for message in messages {
        match message.role {
            Role::Ai => outstanding.extend(message.tool_calls.iter()),
            Role::Tool => {
                let Some(call_id) = message.tool_call_id.as_deref() else {
                    continue;
                };
                if let Some(index) = outstanding.iter().position(|call| call.call_id == call_id) {
                    outstanding.remove(index);
                }
            }
            Role::Human => {}
        }
    }

    outstanding
}

#[must_use]
pub fn has_unanswered_tool_calls(messages: &[Message]) -> bool {
    !unanswered_tool_calls(messages).is_empty()
}

/// Synthesizes one hidden placeholder `tool` message per unanswered tool call.
///
/// Appending the result to `messages` yields a sequence with no outstanding
/// obligations, so a second pass over that sequence returns nothing.
#[must_use]
pub fn synthesize_missing_tool_results(
    messages: &[Message],
    synthetic: &SyntheticToolResults,
) -> Vec<Message> {
    unanswered_tool_calls(messages)
        .into_iter()
        .map(|call| {
            Message::tool_result(
                synthetic_tool_result_id(&call.call_id, synthetic.ids),
                call.call_id.clone(),
                call.name.clone(),
                synthetic.content.clone(),
            )
        })
        .collect()
}
