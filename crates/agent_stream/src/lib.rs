//! Channel-neutral contract between a chat controller and a streaming agent backend.
//!
//! This crate defines the conversation message model, the full-value snapshot
//! shape a channel yields, out-of-band UI payloads, and the dispatch envelope
//! used to start a turn. It excludes transport details, wire framing, and
//! backend agent execution.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message ids starting with this prefix are protocol bookkeeping and are not rendered.
pub const HIDDEN_MESSAGE_ID_PREFIX: &str = "do-not-render-";

/// Side-channel key/value state contributed by a rendered artifact.
pub type ArtifactContext = Map<String, Value>;

/// Unique, immutable identifier of one conversation message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for ids minted for protocol bookkeeping rather than display.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.0.starts_with(HIDDEN_MESSAGE_ID_PREFIX)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for MessageId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

/// Identifier of one conversation thread as assigned by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ThreadId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Human,
    Ai,
    Tool,
}

/// One ordered piece of message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Image {
        mime_type: String,
        data: String,
    },
    File {
        mime_type: String,
        data: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filename: Option<String>,
    },
}

impl ContentBlock {
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text { text } => Some(text),
            Self::Image { .. } | Self::File { .. } => None,
        }
    }
}

/// A tool invocation requested by an `ai` message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    #[must_use]
    pub fn new(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// A unit of conversation turn. Messages are never mutated once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Message {
    #[must_use]
    pub fn human(id: impl Into<MessageId>, content: Vec<ContentBlock>) -> Self {
        Self {
            id: id.into(),
            role: Role::Human,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }

    #[must_use]
    pub fn ai(id: impl Into<MessageId>, text: impl Into<String>) -> Self {
        Self::ai_with_tool_calls(id, text, Vec::new())
    }

    #[must_use]
    pub fn ai_with_tool_calls(
        id: impl Into<MessageId>,
        text: impl Into<String>,
        tool_calls: Vec<ToolCall>,
    ) -> Self {
        let text = text.into();
        let content = if text.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::Text { text }]
        };

        Self {
            id: id.into(),
            role: Role::Ai,
            content,
            tool_calls,
            tool_call_id: None,
            name: None,
        }
    }

    #[must_use]
    pub fn tool_result(
        id: impl Into<MessageId>,
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            role: Role::Tool,
            content: vec![ContentBlock::text(text)],
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
            name: Some(tool_name.into()),
        }
    }

    /// Concatenates every text block in order.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(ContentBlock::as_text)
            .collect::<Vec<_>>()
            .join("")
    }

    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.id.is_hidden()
    }
}

/// Stream-level failure reported by the channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl StreamError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: None,
        }
    }

    #[must_use]
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Named side-channel render instruction embedded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiPayload {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub props: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

impl UiPayload {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, props: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            props,
            message_id: None,
        }
    }

    #[must_use]
    pub fn for_message(mut self, message_id: impl Into<MessageId>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }
}

/// Incremental change to the UI payload list pushed by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiEvent {
    Upsert {
        payload: UiPayload,
        #[serde(default)]
        merge: bool,
    },
    Remove {
        id: String,
    },
}

/// Applies one UI event in place.
///
/// `Upsert` replaces the payload carrying the same id without moving it, or
/// appends when the id is new. With `merge`, object props are merged key by key
/// into the existing props instead of replacing them.
pub fn apply_ui_event(payloads: &mut Vec<UiPayload>, event: UiEvent) {
    match event {
        UiEvent::Upsert { payload, merge } => {
            let Some(existing) = payloads.iter_mut().find(|item| item.id == payload.id) else {
                payloads.push(payload);
                return;
            };

            let props = match (merge, &existing.props, payload.props) {
                (true, Value::Object(current), Value::Object(incoming)) => {
                    let mut merged = current.clone();
                    merged.extend(incoming);
                    Value::Object(merged)
                }
                (_, _, incoming) => incoming,
            };

            existing.name = payload.name;
            existing.props = props;
            existing.message_id = payload.message_id;
        }
        UiEvent::Remove { id } => payloads.retain(|item| item.id != id),
    }
}

/// Full-value state of a conversation at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<ThreadId>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default)]
    pub ui: Vec<UiPayload>,
    #[serde(default)]
    pub is_loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<StreamError>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: ArtifactContext,
}

impl ConversationSnapshot {
    #[must_use]
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Messages a renderer should show, skipping hidden bookkeeping entries.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|message| !message.is_hidden())
    }
}

/// Stream semantics requested from the channel for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamMode {
    /// Every emitted snapshot carries the full conversation value.
    #[default]
    Values,
    /// Only per-step deltas are emitted.
    Updates,
}

type ProjectionFn = dyn Fn(&ConversationSnapshot) -> ConversationSnapshot + Send + Sync;

/// Pure function the channel applies synchronously before any network round trip.
#[derive(Clone)]
pub struct OptimisticProjection(Arc<ProjectionFn>);

impl OptimisticProjection {
    pub fn new(
        projection: impl Fn(&ConversationSnapshot) -> ConversationSnapshot + Send + Sync + 'static,
    ) -> Self {
        Self(Arc::new(projection))
    }

    /// Projection that leaves the previous value untouched.
    #[must_use]
    pub fn identity() -> Self {
        Self::new(ConversationSnapshot::clone)
    }

    #[must_use]
    pub fn apply(&self, previous: &ConversationSnapshot) -> ConversationSnapshot {
        (self.0)(previous)
    }
}

impl fmt::Debug for OptimisticProjection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OptimisticProjection(..)")
    }
}

/// One turn handed to the channel.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Messages appended to the confirmed sequence by this turn.
    pub increment: Vec<Message>,
    /// Artifact context, present only when non-empty.
    pub context: Option<ArtifactContext>,
    pub stream_mode: StreamMode,
    pub optimistic: OptimisticProjection,
}

/// Failures a channel may report synchronously from `dispatch`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("channel already has a run in flight")]
    Busy,
    #[error("channel is closed")]
    Closed,
    #[error("channel rejected dispatch: {0}")]
    Rejected(String),
}

/// Duplex streaming channel collaborator.
///
/// Implementations deliver confirmed snapshots through a [`SnapshotQueue`] in
/// the order they were produced.
pub trait StreamChannel: Send {
    /// Starts a turn. The optimistic projection is applied to the channel's
    /// current value before returning, and the projected value is returned.
    ///
    /// The returned value and every snapshot of the turn should carry the
    /// thread id. Unstamped snapshots cannot be told apart from the active
    /// thread's and are only dropped when they contain a turn abandoned by a
    /// thread switch.
    fn dispatch(&mut self, request: DispatchRequest) -> Result<ConversationSnapshot, ChannelError>;

    /// Asks the channel to halt the in-progress turn. Settlement is reported
    /// through a later snapshot.
    fn stop(&mut self);

    /// Points the channel at another thread, abandoning any in-flight turn.
    ///
    /// `None` starts a fresh thread whose id is assigned on the next dispatch.
    /// An existing thread's stored value is published as the next snapshot.
    fn open_thread(&mut self, thread_id: Option<ThreadId>);

    /// Gives cooperative channels a chance to make progress on the caller's
    /// thread. Returns true when any work was done.
    fn poll(&mut self) -> bool {
        false
    }
}

impl<T: StreamChannel + ?Sized> StreamChannel for Box<T> {
    fn dispatch(&mut self, request: DispatchRequest) -> Result<ConversationSnapshot, ChannelError> {
        (**self).dispatch(request)
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn open_thread(&mut self, thread_id: Option<ThreadId>) {
        (**self).open_thread(thread_id);
    }

    fn poll(&mut self) -> bool {
        (**self).poll()
    }
}

/// Shared FIFO of snapshots produced by a channel and drained by the controller thread.
#[derive(Debug, Clone, Default)]
pub struct SnapshotQueue {
    pending: Arc<Mutex<VecDeque<ConversationSnapshot>>>,
}

impl SnapshotQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, snapshot: ConversationSnapshot) {
        self.lock().push_back(snapshot);
    }

    #[must_use]
    pub fn pop(&self) -> Option<ConversationSnapshot> {
        self.lock().pop_front()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ConversationSnapshot>> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn hidden_prefix_marks_bookkeeping_messages() {
        let hidden = Message::tool_result(
            format!("{HIDDEN_MESSAGE_ID_PREFIX}1"),
            "call-1",
            "draw",
            "done",
        );
        let shown = Message::ai("ai-1", "hello");
        let snapshot = ConversationSnapshot::with_messages(vec![shown.clone(), hidden.clone()]);

        assert!(hidden.is_hidden());
        assert!(!shown.is_hidden());
        assert_eq!(snapshot.visible_messages().collect::<Vec<_>>(), vec![&shown]);
    }

    #[test]
    fn message_text_joins_text_blocks_and_skips_attachments() {
        let message = Message::human(
            "h-1",
            vec![
                ContentBlock::text("look at "),
                ContentBlock::Image {
                    mime_type: "image/png".to_string(),
                    data: "aGVsbG8=".to_string(),
                },
                ContentBlock::text("this"),
            ],
        );

        assert_eq!(message.text(), "look at this");
    }

    #[test]
    fn ai_message_without_text_has_no_content_blocks() {
        let message = Message::ai_with_tool_calls(
            "ai-1",
            "",
            vec![ToolCall::new("c1", "draw", json!({ "subject": "cat" }))],
        );

        assert!(message.content.is_empty());
        assert_eq!(message.tool_calls.len(), 1);
    }

    #[test]
    fn tool_result_message_serializes_call_reference() {
        let message = Message::tool_result("t-1", "call-9", "search", "no results");

        assert_eq!(
            serde_json::to_value(&message).expect("message serializes"),
            json!({
                "id": "t-1",
                "role": "tool",
                "content": [{ "type": "text", "text": "no results" }],
                "tool_call_id": "call-9",
                "name": "search",
            })
        );
    }

    #[test]
    fn snapshot_deserializes_with_missing_optional_fields() {
        let snapshot: ConversationSnapshot = serde_json::from_value(json!({
            "messages": [{ "id": "h-1", "role": "human", "content": [] }],
        }))
        .expect("snapshot parses");

        assert_eq!(snapshot.thread_id, None);
        assert_eq!(snapshot.messages.len(), 1);
        assert!(snapshot.ui.is_empty());
        assert!(!snapshot.is_loading);
        assert!(snapshot.error.is_none());
    }

    #[test]
    fn upsert_replaces_in_place_and_appends_new_ids() {
        let mut payloads = vec![
            UiPayload::new("a", "card", json!({ "v": 1 })),
            UiPayload::new("b", "card", json!({ "v": 1 })),
        ];

        apply_ui_event(
            &mut payloads,
            UiEvent::Upsert {
                payload: UiPayload::new("a", "card", json!({ "v": 2 })),
                merge: false,
            },
        );
        apply_ui_event(
            &mut payloads,
            UiEvent::Upsert {
                payload: UiPayload::new("c", "full_screen", json!({})),
                merge: false,
            },
        );

        let ids: Vec<_> = payloads.iter().map(|payload| payload.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(payloads[0].props, json!({ "v": 2 }));
    }

    #[test]
    fn merge_upsert_extends_object_props() {
        let mut payloads = vec![UiPayload::new("a", "card", json!({ "title": "x", "v": 1 }))];

        apply_ui_event(
            &mut payloads,
            UiEvent::Upsert {
                payload: UiPayload::new("a", "card", json!({ "v": 2, "extra": true })),
                merge: true,
            },
        );

        assert_eq!(
            payloads[0].props,
            json!({ "title": "x", "v": 2, "extra": true })
        );
    }

    #[test]
    fn remove_event_drops_matching_payload_only() {
        let mut payloads = vec![
            UiPayload::new("a", "card", json!(null)),
            UiPayload::new("b", "card", json!(null)),
        ];

        apply_ui_event(&mut payloads, UiEvent::Remove { id: "a".to_string() });
        apply_ui_event(&mut payloads, UiEvent::Remove { id: "missing".to_string() });

        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].id, "b");
    }

    #[test]
    fn projection_applies_caller_function() {
        let projection = OptimisticProjection::new(|previous: &ConversationSnapshot| {
            let mut next = previous.clone();
            next.messages.push(Message::human("h-2", vec![ContentBlock::text("hi")]));
            next
        });
        let previous = ConversationSnapshot::with_messages(vec![Message::ai("ai-1", "hello")]);

        let projected = projection.apply(&previous);

        assert_eq!(projected.messages.len(), 2);
        assert_eq!(previous.messages.len(), 1);
        assert_eq!(OptimisticProjection::identity().apply(&previous), previous);
    }

    #[test]
    fn snapshot_queue_is_fifo_across_clones() {
        let producer = SnapshotQueue::new();
        let consumer = producer.clone();

        producer.push(ConversationSnapshot::with_messages(vec![Message::ai("1", "a")]));
        producer.push(ConversationSnapshot::with_messages(vec![Message::ai("2", "b")]));

        assert_eq!(consumer.len(), 2);
        let first = consumer.pop().expect("first snapshot");
        let second = consumer.pop().expect("second snapshot");
        assert_eq!(first.messages[0].id.as_str(), "1");
        assert_eq!(second.messages[0].id.as_str(), "2");
        assert!(consumer.is_empty());
    }

    #[test]
    fn channel_error_messages_are_descriptive() {
        assert_eq!(
            ChannelError::Rejected("bad thread".to_string()).to_string(),
            "channel rejected dispatch: bad thread"
        );
        assert_eq!(ChannelError::Busy.to_string(), "channel already has a run in flight");
    }
}
