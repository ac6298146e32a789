use agent_stream::{ConversationSnapshot, UiPayload};

/// Returns the most recent UI payload named `marker`, if any.
#[must_use]
pub fn select_full_screen<'a>(
    snapshot: &'a ConversationSnapshot,
    marker: &str,
) -> Option<&'a UiPayload> {
    snapshot
        .ui
        .iter()
        .rev()
        .find(|payload| payload.name == marker)
}
