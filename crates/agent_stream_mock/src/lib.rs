//! Deterministic in-memory implementation of the shared `agent_stream` contract.
//!
//! This crate contains no transport logic and is intended for local
//! development and contract-level integration testing. Each dispatched turn
//! plays back a scripted [`MockReply`] one step per [`MockChannel::advance`]
//! call, publishing a full-value snapshot after every step.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use agent_stream::{
    apply_ui_event, ArtifactContext, ChannelError, ConversationSnapshot, DispatchRequest, Message,
    Role, SnapshotQueue, StreamChannel, StreamError, StreamMode, ThreadId, ToolCall, UiEvent,
    UiPayload,
};
use serde_json::json;
use tracing::debug;

/// Stable channel identifier used for explicit startup selection.
pub const MOCK_CHANNEL_ID: &str = "mock";

/// One scripted backend action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    /// Appends a message to the confirmed value.
    Message(Message),
    /// Applies a UI payload event to the confirmed value.
    Ui(UiEvent),
    /// Fails the run; remaining steps are dropped.
    Fail(StreamError),
}

/// Scripted backend reply for one dispatched turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MockReply {
    steps: Vec<MockStep>,
}

impl MockReply {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn message(mut self, message: Message) -> Self {
        self.steps.push(MockStep::Message(message));
        self
    }

    #[must_use]
    pub fn ui(mut self, payload: UiPayload) -> Self {
        self.steps.push(MockStep::Ui(UiEvent::Upsert {
            payload,
            merge: false,
        }));
        self
    }

    #[must_use]
    pub fn ui_event(mut self, event: UiEvent) -> Self {
        self.steps.push(MockStep::Ui(event));
        self
    }

    #[must_use]
    pub fn fail(mut self, message: impl Into<String>) -> Self {
        self.steps.push(MockStep::Fail(StreamError::new(message)));
        self
    }

    #[must_use]
    pub fn steps(&self) -> &[MockStep] {
        &self.steps
    }
}

/// What the channel saw for one dispatched turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchRecord {
    pub increment: Vec<Message>,
    pub context: Option<ArtifactContext>,
    pub stream_mode: StreamMode,
    /// Value returned to the caller after applying the optimistic projection.
    pub projected: ConversationSnapshot,
}

type Responder = Box<dyn FnMut(&[Message]) -> MockReply + Send>;

/// Scripted channel used by `agent_chat` tests and local runs.
///
/// Replies are taken from the script queue first; when it is empty the
/// responder builds one from the confirmed messages.
pub struct MockChannel {
    thread_id: Option<ThreadId>,
    next_thread: usize,
    threads: HashMap<ThreadId, ConversationSnapshot>,
    values: ConversationSnapshot,
    script: VecDeque<MockReply>,
    responder: Option<Responder>,
    pending: VecDeque<MockStep>,
    in_flight: bool,
    dispatched: Vec<DispatchRecord>,
    stop_requests: usize,
    queue: SnapshotQueue,
}

impl MockChannel {
    /// Creates a channel publishing into `queue` with an empty script.
    #[must_use]
    pub fn new(queue: SnapshotQueue) -> Self {
        Self {
            thread_id: None,
            next_thread: 1,
            threads: HashMap::new(),
            values: ConversationSnapshot::default(),
            script: VecDeque::new(),
            responder: None,
            pending: VecDeque::new(),
            in_flight: false,
            dispatched: Vec::new(),
            stop_requests: 0,
            queue,
        }
    }

    /// Creates a channel whose replies are computed from the confirmed messages.
    #[must_use]
    pub fn with_responder(
        queue: SnapshotQueue,
        responder: impl FnMut(&[Message]) -> MockReply + Send + 'static,
    ) -> Self {
        let mut channel = Self::new(queue);
        channel.responder = Some(Box::new(responder));
        channel
    }

    /// Creates a channel with the built-in demo responder.
    #[must_use]
    pub fn demo(queue: SnapshotQueue) -> Self {
        let mut turn = 0usize;
        Self::with_responder(queue, move |messages| {
            turn += 1;
            demo_reply(turn, messages)
        })
    }

    /// Uses `thread_id` for the current thread instead of minting one on first dispatch.
    #[must_use]
    pub fn with_thread_id(mut self, thread_id: impl Into<ThreadId>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    /// Queues a scripted reply for a future dispatch.
    pub fn script(&mut self, reply: MockReply) {
        self.script.push_back(reply);
    }

    #[must_use]
    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread_id.as_ref()
    }

    /// Returns the channel's current authoritative value.
    #[must_use]
    pub fn values(&self) -> &ConversationSnapshot {
        &self.values
    }

    #[must_use]
    pub fn dispatched(&self) -> &[DispatchRecord] {
        &self.dispatched
    }

    #[must_use]
    pub fn stop_requests(&self) -> usize {
        self.stop_requests
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    #[must_use]
    pub fn queue(&self) -> &SnapshotQueue {
        &self.queue
    }

    /// Replaces the authoritative value and publishes it, as if the backend
    /// had pushed an out-of-band update.
    pub fn publish(&mut self, mut snapshot: ConversationSnapshot) {
        snapshot.thread_id = Some(self.current_thread_id());
        self.in_flight = snapshot.is_loading;
        if !self.in_flight {
            self.pending.clear();
        }
        self.values = snapshot;
        self.emit();
    }

    /// Plays back one scripted step and publishes the resulting value.
    ///
    /// The snapshot published for the last step is the settled one
    /// (`is_loading == false`). Returns false when no turn is in flight.
    pub fn advance(&mut self) -> bool {
        if !self.in_flight {
            return false;
        }

        match self.pending.pop_front() {
            Some(MockStep::Message(message)) => self.values.messages.push(message),
            Some(MockStep::Ui(event)) => apply_ui_event(&mut self.values.ui, event),
            Some(MockStep::Fail(error)) => {
                debug!(error = %error, "mock channel failing run");
                self.values.error = Some(error);
                self.pending.clear();
            }
            None => {}
        }

        if self.pending.is_empty() {
            self.settle();
        }

        self.emit();
        true
    }

    /// Advances until the current turn settles. Returns the number of snapshots published.
    pub fn run_to_completion(&mut self) -> usize {
        let mut published = 0;
        while self.advance() {
            published += 1;
        }
        published
    }

    fn next_reply(&mut self) -> MockReply {
        if let Some(reply) = self.script.pop_front() {
            return reply;
        }

        match self.responder.as_mut() {
            Some(responder) => responder(&self.values.messages),
            None => MockReply::default(),
        }
    }

    fn current_thread_id(&mut self) -> ThreadId {
        if let Some(thread_id) = &self.thread_id {
            return thread_id.clone();
        }

        let thread_id = ThreadId::new(format!("mock-thread-{}", self.next_thread));
        self.next_thread += 1;
        self.thread_id = Some(thread_id.clone());
        thread_id
    }

    fn settle(&mut self) {
        self.in_flight = false;
        self.values.is_loading = false;
    }

    fn emit(&self) {
        self.queue.push(self.values.clone());
    }
}

impl fmt::Debug for MockChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockChannel")
            .field("thread_id", &self.thread_id)
            .field("in_flight", &self.in_flight)
            .field("pending_steps", &self.pending.len())
            .field("dispatched", &self.dispatched.len())
            .field("stop_requests", &self.stop_requests)
            .finish()
    }
}

impl StreamChannel for MockChannel {
    fn dispatch(&mut self, request: DispatchRequest) -> Result<ConversationSnapshot, ChannelError> {
        if self.in_flight {
            return Err(ChannelError::Busy);
        }

        let thread_id = self.current_thread_id();
        self.values.thread_id = Some(thread_id.clone());
        self.values.error = None;

        let mut projected = request.optimistic.apply(&self.values);
        projected.thread_id = Some(thread_id);
        projected.is_loading = true;

        // The backend confirms from the increment, not from the projection.
        self.values.messages.extend(request.increment.iter().cloned());
        if let Some(context) = &request.context {
            self.values.context = context.clone();
        }
        self.values.is_loading = true;
        self.in_flight = true;

        let reply = self.next_reply();
        self.pending = reply.steps.into_iter().collect();

        debug!(
            increment = request.increment.len(),
            steps = self.pending.len(),
            "mock channel accepted dispatch"
        );

        self.dispatched.push(DispatchRecord {
            increment: request.increment,
            context: request.context,
            stream_mode: request.stream_mode,
            projected: projected.clone(),
        });

        Ok(projected)
    }

    fn stop(&mut self) {
        self.stop_requests += 1;
        if !self.in_flight {
            return;
        }

        self.pending.clear();
        self.settle();
        self.emit();
    }

    fn poll(&mut self) -> bool {
        self.advance()
    }

    fn open_thread(&mut self, thread_id: Option<ThreadId>) {
        if self.in_flight {
            debug!("mock channel abandoning in-flight turn");
            self.pending.clear();
            self.settle();
        }

        let previous = std::mem::take(&mut self.values);
        if let Some(previous_id) = self.thread_id.take() {
            self.threads.insert(previous_id, previous);
        }

        let Some(thread_id) = thread_id else {
            return;
        };

        self.values = self.threads.remove(&thread_id).unwrap_or_default();
        self.values.thread_id = Some(thread_id.clone());
        self.thread_id = Some(thread_id);
        self.emit();
    }
}

fn demo_reply(turn: usize, messages: &[Message]) -> MockReply {
    let prompt = messages
        .iter()
        .rev()
        .find(|message| message.role == Role::Human)
        .map(Message::text)
        .unwrap_or_default();
    let lowered = prompt.to_lowercase();

    if lowered.contains("fail") {
        return MockReply::new().fail("mock backend failure");
    }

    if lowered.contains("draw") {
        let call_id = format!("mock-call-{turn}");
        let ai_id = format!("mock-ai-{turn}");
        return MockReply::new()
            .message(Message::ai_with_tool_calls(
                ai_id.as_str(),
                "Opening the canvas.",
                vec![ToolCall::new(
                    call_id.as_str(),
                    "draw",
                    json!({ "prompt": prompt }),
                )],
            ))
            .ui(
                UiPayload::new(
                    format!("mock-ui-{turn}"),
                    "full_screen",
                    json!({ "title": "Canvas", "prompt": prompt }),
                )
                .for_message(ai_id.as_str()),
            );
    }

    MockReply::new().message(Message::ai(
        format!("mock-ai-{turn}"),
        format!("You said: {prompt}"),
    ))
}
