//! Message id minting.

use agent_stream::{MessageId, HIDDEN_MESSAGE_ID_PREFIX};
use uuid::Uuid;

use crate::config::SyntheticIdStrategy;

/// Returns a fresh, never reused message id.
#[must_use]
pub fn new_message_id() -> MessageId {
    MessageId::new(Uuid::new_v4().to_string())
}

/// Returns the id of a synthesized tool result answering `call_id`.
///
/// Synthetic ids always carry the hidden prefix so renderers skip them.
#[must_use]
pub fn synthetic_tool_result_id(call_id: &str, strategy: SyntheticIdStrategy) -> MessageId {
    let suffix = match strategy {
        SyntheticIdStrategy::Random => Uuid::new_v4(),
        SyntheticIdStrategy::Derived => Uuid::new_v5(&Uuid::NAMESPACE_OID, call_id.as_bytes()),
    };
    MessageId::new(format!("{HIDDEN_MESSAGE_ID_PREFIX}{suffix}"))
}
