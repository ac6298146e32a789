//! Main-view mode state machine.
//!
//! The view is derived from pairs of consecutive snapshots plus the phase of the
//! session that produced the second one. Transitions are pure so hosts can
//! replay them in tests without a channel.

use agent_stream::{ConversationSnapshot, Role, UiPayload};

use crate::full_screen::select_full_screen;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewState {
    /// No conversation yet; hosts show the welcome layout.
    #[default]
    Empty,
    /// A turn was submitted and no agent output has arrived yet.
    AwaitingFirstToken,
    Conversation,
    /// A full-screen UI payload owns the main content area.
    FullScreen,
}

/// What produced the snapshot handed to [`ViewState::transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Optimistic projection returned by a dispatch.
    Submitted,
    /// The user asked to stop the in-flight turn.
    Cancelled,
    /// A confirmed snapshot from the channel.
    Streamed,
}

impl ViewState {
    #[must_use]
    pub fn transition(
        self,
        previous: &ConversationSnapshot,
        next: &ConversationSnapshot,
        phase: Phase,
        marker: &str,
    ) -> ViewState {
        if select_full_screen(next, marker).is_some() {
            return ViewState::FullScreen;
        }

        match (self, phase) {
            (ViewState::Empty | ViewState::Conversation, Phase::Submitted) => {
                ViewState::AwaitingFirstToken
            }
            (ViewState::AwaitingFirstToken, Phase::Cancelled) => settled(next),
            (ViewState::AwaitingFirstToken, Phase::Streamed) => {
                if first_token_arrived(previous, next) {
                    ViewState::Conversation
                } else if !next.is_loading {
                    settled(next)
                } else {
                    ViewState::AwaitingFirstToken
                }
            }
            (ViewState::AwaitingFirstToken, Phase::Submitted) => ViewState::AwaitingFirstToken,
            (ViewState::FullScreen, _) => settled(next),
            (ViewState::Empty | ViewState::Conversation, Phase::Streamed) => settled(next),
            (ViewState::Empty | ViewState::Conversation, Phase::Cancelled) => self,
        }
    }
}

/// True when the newest message is an `ai` message that was not already the
/// newest message of `previous`.
#[must_use]
pub fn first_token_arrived(previous: &ConversationSnapshot, next: &ConversationSnapshot) -> bool {
    let Some(last) = next.last_message() else {
        return false;
    };

    last.role == Role::Ai
        && previous
            .last_message()
            .map_or(true, |previous_last| previous_last.id != last.id)
}

/// Resting view for a snapshot with no pending first token.
#[must_use]
pub fn settled(snapshot: &ConversationSnapshot) -> ViewState {
    if snapshot.thread_id.is_none() && snapshot.messages.is_empty() {
        ViewState::Empty
    } else {
        ViewState::Conversation
    }
}

/// View state paired with the payload that owns the screen, if any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedView {
    pub state: ViewState,
    pub full_screen: Option<UiPayload>,
}

impl ResolvedView {
    #[must_use]
    pub fn resolve(state: ViewState, snapshot: &ConversationSnapshot, marker: &str) -> Self {
        let full_screen = match state {
            ViewState::FullScreen => select_full_screen(snapshot, marker).cloned(),
            _ => None,
        };
        Self { state, full_screen }
    }
}
