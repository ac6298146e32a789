use agent_stream::{
    ArtifactContext, ContentBlock, ConversationSnapshot, DispatchRequest, Message, MessageId,
    OptimisticProjection, StreamChannel, StreamMode, ThreadId,
};
use tracing::{debug, info, warn};

use crate::composer::Composer;
use crate::config::ControllerConfig;
use crate::error::{ControllerError, NotifyError};
use crate::error_dedup::{ErrorDeduplicator, Notification};
use crate::ids::new_message_id;
use crate::reconcile::synthesize_missing_tool_results;
use crate::view::{settled, Phase, ResolvedView, ViewState};

/// Outbound seam to the embedding UI.
pub trait ChatHost {
    /// Surfaces a stream error to the user, e.g. as a toast.
    fn notify_error(&mut self, message: &str) -> Result<(), NotifyError>;
    fn view_changed(&mut self, view: &ResolvedView);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No non-whitespace text and no attachments.
    EmptyInput,
    /// A previous submission has not settled yet.
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchSummary {
    pub human_id: MessageId,
    /// Placeholder tool results sent ahead of the human message.
    pub synthetic_tool_results: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Dispatched(DispatchSummary),
    Ignored(IgnoreReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotDisposition {
    Applied,
    /// The snapshot belongs to a thread that is no longer active and was dropped.
    Stale,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PendingSubmission {
    human_id: MessageId,
    /// Ids confirmed before this submission; the channel must keep them as a prefix.
    baseline: Vec<MessageId>,
    cancel_requested: bool,
}

/// Client-side owner of one active conversation.
///
/// All state changes go through `&mut self`; snapshots must be fed in the
/// order the channel produced them.
#[derive(Debug, Clone)]
pub struct ThreadController {
    config: ControllerConfig,
    thread_id: Option<ThreadId>,
    /// Thread left behind by a switch to a new conversation, until the new
    /// one's id is known. After that every other id is stale anyway.
    retired_thread: Option<ThreadId>,
    /// Human message of the last turn abandoned by a thread switch.
    abandoned_turn: Option<MessageId>,
    snapshot: ConversationSnapshot,
    pending: Option<PendingSubmission>,
    composer: Composer,
    artifact_context: ArtifactContext,
    errors: ErrorDeduplicator,
    view: ViewState,
}

impl Default for ThreadController {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl ThreadController {
    pub fn new(config: ControllerConfig) -> Self {
        Self {
            config,
            thread_id: None,
            retired_thread: None,
            abandoned_turn: None,
            snapshot: ConversationSnapshot::default(),
            pending: None,
            composer: Composer::new(),
            artifact_context: ArtifactContext::new(),
            errors: ErrorDeduplicator::new(),
            view: ViewState::Empty,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn thread_id(&self) -> Option<&ThreadId> {
        self.thread_id.as_ref()
    }

    /// Latest value shown to the user: the optimistic projection while a
    /// submission is in flight, the confirmed snapshot otherwise.
    pub fn snapshot(&self) -> &ConversationSnapshot {
        &self.snapshot
    }

    pub fn messages(&self) -> &[Message] {
        &self.snapshot.messages
    }

    /// True while our own submission is unsettled or the confirmed value is
    /// still loading, whoever started the run.
    pub fn is_in_flight(&self) -> bool {
        self.pending.is_some() || self.snapshot.is_loading
    }

    pub fn view(&self) -> ResolvedView {
        ResolvedView::resolve(self.view, &self.snapshot, &self.config.full_screen_marker)
    }

    pub fn view_state(&self) -> ViewState {
        self.view
    }

    pub fn last_reported_error(&self) -> Option<&str> {
        self.errors.last_reported()
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn composer_mut(&mut self) -> &mut Composer {
        &mut self.composer
    }

    pub fn artifact_context(&self) -> &ArtifactContext {
        &self.artifact_context
    }

    pub fn artifact_context_mut(&mut self) -> &mut ArtifactContext {
        &mut self.artifact_context
    }

    pub fn set_artifact_context(&mut self, context: ArtifactContext) {
        self.artifact_context = context;
    }

    /// Submits the composer buffer together with the current artifact context.
    pub fn submit_composer(
        &mut self,
        channel: &mut dyn StreamChannel,
        host: &mut dyn ChatHost,
    ) -> Result<SubmitOutcome, ControllerError> {
        let text = self.composer.text().to_string();
        let attachments = self.composer.attachments().to_vec();
        let context = self.artifact_context.clone();
        self.submit(&text, attachments, &context, channel, host)
    }

    /// Sends one human turn, preceded by placeholder results for any tool calls
    /// the previous agent turn left unanswered.
    ///
    /// The channel applies the optimistic projection before returning, so the
    /// new human message is visible immediately. On dispatch failure nothing is
    /// marked in flight and the composer keeps its content.
    pub fn submit(
        &mut self,
        text: &str,
        attachments: Vec<ContentBlock>,
        context: &ArtifactContext,
        channel: &mut dyn StreamChannel,
        host: &mut dyn ChatHost,
    ) -> Result<SubmitOutcome, ControllerError> {
        let has_text = !text.trim().is_empty();
        if !has_text && attachments.is_empty() {
            debug!("ignoring empty submission");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::EmptyInput));
        }

        if self.is_in_flight() {
            debug!("ignoring submission while a turn is in flight");
            return Ok(SubmitOutcome::Ignored(IgnoreReason::InFlight));
        }

        let mut content = Vec::with_capacity(attachments.len() + 1);
        if has_text {
            content.push(ContentBlock::text(text));
        }
        content.extend(attachments);

        let human = Message::human(new_message_id(), content);
        let human_id = human.id.clone();

        let mut increment =
            synthesize_missing_tool_results(&self.snapshot.messages, &self.config.synthetic);
        let synthetic_tool_results = increment.len();
        increment.push(human);

        let context = (!context.is_empty()).then(|| context.clone());
        let request = DispatchRequest {
            optimistic: append_projection(increment.clone(), context.clone()),
            increment,
            context,
            stream_mode: StreamMode::Values,
        };

        let projected = match channel.dispatch(request) {
            Ok(projected) => projected,
            Err(error) => {
                warn!(%error, "dispatch failed");
                return Err(ControllerError::Dispatch(error));
            }
        };

        info!(
            human_id = %human_id,
            synthetic_tool_results,
            "turn dispatched"
        );

        self.pending = Some(PendingSubmission {
            human_id: human_id.clone(),
            baseline: self.snapshot.messages.iter().map(|m| m.id.clone()).collect(),
            cancel_requested: false,
        });
        self.adopt_thread(projected.thread_id.as_ref());
        self.composer.clear();
        self.errors
            .observe(projected.error.as_ref(), &mut |text: &str| host.notify_error(text));

        let previous = std::mem::replace(&mut self.snapshot, projected);
        self.transition(&previous, Phase::Submitted, host);

        Ok(SubmitOutcome::Dispatched(DispatchSummary {
            human_id,
            synthetic_tool_results,
        }))
    }

    /// Asks the channel to stop the in-flight turn. Returns false when there is
    /// nothing to cancel or a cancel was already requested.
    pub fn request_cancel(
        &mut self,
        channel: &mut dyn StreamChannel,
        host: &mut dyn ChatHost,
    ) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            debug!("cancel requested with no turn in flight");
            return false;
        };

        if pending.cancel_requested {
            return false;
        }

        pending.cancel_requested = true;
        info!("cancelling in-flight turn");
        channel.stop();

        let current = self.snapshot.clone();
        self.transition(&current, Phase::Cancelled, host);
        true
    }

    /// Applies one confirmed snapshot from the channel.
    pub fn on_snapshot(
        &mut self,
        snapshot: ConversationSnapshot,
        host: &mut dyn ChatHost,
    ) -> SnapshotDisposition {
        if self.is_stale(&snapshot) {
            debug!(
                thread_id = ?snapshot.thread_id,
                active = ?self.thread_id,
                "dropping snapshot for inactive thread"
            );
            return SnapshotDisposition::Stale;
        }

        self.adopt_thread(snapshot.thread_id.as_ref());

        if let Some(pending) = &self.pending {
            let confirmed = snapshot.messages.iter().map(|message| &message.id);
            if !pending.baseline.iter().eq(confirmed.take(pending.baseline.len())) {
                warn!(
                    expected = pending.baseline.len(),
                    confirmed = snapshot.messages.len(),
                    "confirmed history diverged from the projected prefix"
                );
            }
        }

        if !snapshot.is_loading && self.pending.take().is_some() {
            debug!("turn settled");
        }

        let notification = self
            .errors
            .observe(snapshot.error.as_ref(), &mut |text: &str| host.notify_error(text));
        if notification == Notification::Reported {
            info!("stream error surfaced");
        }

        let previous = std::mem::replace(&mut self.snapshot, snapshot);
        self.transition(&previous, Phase::Streamed, host);
        SnapshotDisposition::Applied
    }

    /// Makes `thread_id` the active conversation (`None` for a new one).
    ///
    /// Resets the error cell, artifact context, composer, view and in-flight
    /// bookkeeping. Snapshots from the previous thread become stale.
    pub fn switch_thread(&mut self, thread_id: Option<ThreadId>, host: &mut dyn ChatHost) {
        if let Some(pending) = self.pending.take() {
            debug!(human_id = %pending.human_id, "abandoning in-flight turn");
            self.abandoned_turn = Some(pending.human_id);
        }
        let previous = self.thread_id.take();
        self.retired_thread = if thread_id.is_some() {
            None
        } else {
            previous.or(self.retired_thread.take())
        };

        info!(thread_id = ?thread_id, "switching thread");

        self.snapshot = ConversationSnapshot {
            thread_id: thread_id.clone(),
            ..ConversationSnapshot::default()
        };
        self.thread_id = thread_id;
        self.composer.clear();
        self.artifact_context.clear();
        self.errors.reset();
        self.view = settled(&self.snapshot);

        host.view_changed(&self.view());
    }

    fn is_stale(&self, snapshot: &ConversationSnapshot) -> bool {
        let Some(incoming) = &snapshot.thread_id else {
            return self.abandoned_turn.as_ref().is_some_and(|abandoned| {
                snapshot.messages.iter().any(|message| &message.id == abandoned)
            });
        };

        if self.retired_thread.as_ref() == Some(incoming) {
            return true;
        }

        self.thread_id
            .as_ref()
            .is_some_and(|active| active != incoming)
    }

    fn adopt_thread(&mut self, thread_id: Option<&ThreadId>) {
        if self.thread_id.is_some() {
            return;
        }
        if let Some(thread_id) = thread_id {
            info!(%thread_id, "thread assigned");
            self.thread_id = Some(thread_id.clone());
            self.retired_thread = None;
        }
    }

    fn transition(
        &mut self,
        previous: &ConversationSnapshot,
        phase: Phase,
        host: &mut dyn ChatHost,
    ) {
        let next = self.view.transition(
            previous,
            &self.snapshot,
            phase,
            &self.config.full_screen_marker,
        );
        if next != self.view {
            debug!(from = ?self.view, to = ?next, "view state changed");
        }
        self.view = next;
        host.view_changed(&self.view());
    }
}

fn append_projection(
    increment: Vec<Message>,
    context: Option<ArtifactContext>,
) -> OptimisticProjection {
    OptimisticProjection::new(move |previous: &ConversationSnapshot| {
        let mut next = previous.clone();
        next.messages.extend(increment.iter().cloned());
        if let Some(context) = &context {
            next.context = context.clone();
        }
        next
    })
}

#[cfg(test)]
mod tests {
    use agent_stream::{ChannelError, Role, ToolCall};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingHost {
        errors: Vec<String>,
        views: Vec<ResolvedView>,
    }

    impl ChatHost for RecordingHost {
        fn notify_error(&mut self, message: &str) -> Result<(), NotifyError> {
            self.errors.push(message.to_string());
            Ok(())
        }

        fn view_changed(&mut self, view: &ResolvedView) {
            self.views.push(view.clone());
        }
    }

    /// Channel that applies the projection and confirms nothing on its own.
    #[derive(Default)]
    struct EchoChannel {
        values: ConversationSnapshot,
        requests: Vec<DispatchRequest>,
        stops: usize,
        reject: Option<ChannelError>,
    }

    impl StreamChannel for EchoChannel {
        fn dispatch(
            &mut self,
            request: DispatchRequest,
        ) -> Result<ConversationSnapshot, ChannelError> {
            if let Some(error) = self.reject.clone() {
                return Err(error);
            }
            let mut projected = request.optimistic.apply(&self.values);
            projected.is_loading = true;
            self.values = projected.clone();
            self.requests.push(request);
            Ok(projected)
        }

        fn stop(&mut self) {
            self.stops += 1;
        }

        fn open_thread(&mut self, _thread_id: Option<ThreadId>) {
            self.values = ConversationSnapshot::default();
        }
    }

    fn confirmed(messages: Vec<Message>) -> ConversationSnapshot {
        ConversationSnapshot::with_messages(messages)
    }

    #[test]
    fn human_message_puts_text_before_attachments() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();
        let image = ContentBlock::Image {
            mime_type: "image/png".to_string(),
            data: "AAAA".to_string(),
        };

        controller
            .submit(
                "  caption  ",
                vec![image.clone()],
                &ArtifactContext::new(),
                &mut channel,
                &mut host,
            )
            .expect("dispatch succeeds");

        let human = controller.messages().last().expect("human message");
        assert_eq!(human.role, Role::Human);
        assert_eq!(human.content, vec![ContentBlock::text("  caption  "), image]);
    }

    #[test]
    fn submitted_text_keeps_indentation_and_newlines() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();
        let snippet = "    fn main() {\n        run();\n    }\n";

        controller
            .submit(snippet, Vec::new(), &ArtifactContext::new(), &mut channel, &mut host)
            .expect("dispatch succeeds");

        assert_eq!(channel.requests[0].increment[0].text(), snippet);
    }

    #[test]
    fn loading_snapshot_from_elsewhere_blocks_submission() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();
        let running = ConversationSnapshot {
            is_loading: true,
            ..confirmed(vec![Message::ai("a1", "still going")])
        };
        controller.on_snapshot(running, &mut host);

        let outcome = controller
            .submit("hi", Vec::new(), &ArtifactContext::new(), &mut channel, &mut host)
            .expect("guarded submit is not an error");

        assert_eq!(outcome, SubmitOutcome::Ignored(IgnoreReason::InFlight));
        assert!(channel.requests.is_empty());
    }

    #[test]
    fn unstamped_snapshot_of_abandoned_turn_is_dropped() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();
        controller
            .submit("old", Vec::new(), &ArtifactContext::new(), &mut channel, &mut host)
            .expect("dispatch succeeds");
        let late = ConversationSnapshot {
            is_loading: false,
            ..channel.values.clone()
        };

        controller.switch_thread(None, &mut host);

        assert_eq!(controller.on_snapshot(late, &mut host), SnapshotDisposition::Stale);
        assert!(controller.messages().is_empty());
    }

    #[test]
    fn retired_thread_is_forgotten_once_a_thread_is_known() {
        let mut controller = ThreadController::default();
        let mut host = RecordingHost::default();
        for id in ["t1", "t2"] {
            controller.switch_thread(Some(ThreadId::new(id)), &mut host);
            controller.switch_thread(None, &mut host);
        }
        controller.switch_thread(None, &mut host);
        assert_eq!(controller.retired_thread, Some(ThreadId::new("t2")));

        let fresh = ConversationSnapshot {
            thread_id: Some(ThreadId::new("t4")),
            ..ConversationSnapshot::default()
        };
        controller.on_snapshot(fresh, &mut host);
        let late = ConversationSnapshot {
            thread_id: Some(ThreadId::new("t2")),
            ..ConversationSnapshot::default()
        };

        assert_eq!(controller.retired_thread, None);
        assert_eq!(controller.on_snapshot(late, &mut host), SnapshotDisposition::Stale);
    }

    #[test]
    fn attachment_only_submission_is_dispatched() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();
        let file = ContentBlock::File {
            mime_type: "application/pdf".to_string(),
            data: "JVBERi0=".to_string(),
            filename: Some("brief.pdf".to_string()),
        };

        let outcome = controller
            .submit("", vec![file.clone()], &ArtifactContext::new(), &mut channel, &mut host)
            .expect("dispatch succeeds");

        assert!(matches!(outcome, SubmitOutcome::Dispatched(_)));
        assert_eq!(channel.requests[0].increment[0].content, vec![file]);
    }

    #[test]
    fn projection_appends_synthetic_results_then_human() {
        let mut controller = ThreadController::default();
        let mut host = RecordingHost::default();
        let history = vec![Message::ai_with_tool_calls(
            "a1",
            "",
            vec![ToolCall::new("c1", "draw", json!({}))],
        )];
        controller.on_snapshot(confirmed(history.clone()), &mut host);
        let mut channel = EchoChannel {
            values: confirmed(history),
            ..EchoChannel::default()
        };

        let outcome = controller
            .submit("next", Vec::new(), &ArtifactContext::new(), &mut channel, &mut host)
            .expect("dispatch succeeds");

        let SubmitOutcome::Dispatched(summary) = outcome else {
            panic!("expected dispatch, got {outcome:?}");
        };
        assert_eq!(summary.synthetic_tool_results, 1);
        let roles: Vec<Role> = controller.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::Ai, Role::Tool, Role::Human]);
        assert!(controller.messages()[1].is_hidden());
        assert_eq!(controller.messages()[2].id, summary.human_id);
    }

    #[test]
    fn repeated_cancel_stops_channel_once() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();
        controller
            .submit("hi", Vec::new(), &ArtifactContext::new(), &mut channel, &mut host)
            .expect("dispatch succeeds");

        assert!(controller.request_cancel(&mut channel, &mut host));
        assert!(!controller.request_cancel(&mut channel, &mut host));

        assert_eq!(channel.stops, 1);
        assert!(controller.is_in_flight());
        assert_eq!(controller.view_state(), ViewState::Conversation);
    }

    #[test]
    fn cancel_without_turn_in_flight_does_not_stop_channel() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel::default();
        let mut host = RecordingHost::default();

        assert!(!controller.request_cancel(&mut channel, &mut host));
        assert_eq!(channel.stops, 0);
    }

    #[test]
    fn dispatch_rejection_is_returned_and_composer_kept() {
        let mut controller = ThreadController::default();
        let mut channel = EchoChannel {
            reject: Some(ChannelError::Closed),
            ..EchoChannel::default()
        };
        let mut host = RecordingHost::default();
        controller.composer_mut().set_text("keep me");

        let error = controller
            .submit_composer(&mut channel, &mut host)
            .expect_err("dispatch fails");

        assert!(matches!(error, ControllerError::Dispatch(ChannelError::Closed)));
        assert!(!controller.is_in_flight());
        assert_eq!(controller.composer().text(), "keep me");
        assert!(controller.messages().is_empty());
        assert!(host.views.is_empty());
    }

    #[test]
    fn first_thread_id_is_adopted_and_others_are_stale() {
        let mut controller = ThreadController::default();
        let mut host = RecordingHost::default();

        let first = ConversationSnapshot {
            thread_id: Some(ThreadId::new("t1")),
            ..ConversationSnapshot::default()
        };
        let other = ConversationSnapshot {
            thread_id: Some(ThreadId::new("t2")),
            ..ConversationSnapshot::default()
        };

        assert_eq!(controller.on_snapshot(first, &mut host), SnapshotDisposition::Applied);
        assert_eq!(controller.thread_id(), Some(&ThreadId::new("t1")));
        assert_eq!(controller.on_snapshot(other, &mut host), SnapshotDisposition::Stale);
    }

    #[test]
    fn divergent_confirmation_still_wins() {
        let mut controller = ThreadController::default();
        let mut host = RecordingHost::default();
        controller.on_snapshot(confirmed(vec![Message::ai("a1", "hello")]), &mut host);
        let mut channel = EchoChannel {
            values: confirmed(vec![Message::ai("a1", "hello")]),
            ..EchoChannel::default()
        };
        controller
            .submit("hi", Vec::new(), &ArtifactContext::new(), &mut channel, &mut host)
            .expect("dispatch succeeds");

        let rewritten = confirmed(vec![Message::ai("a1-rewritten", "hello")]);
        controller.on_snapshot(rewritten.clone(), &mut host);

        assert_eq!(controller.snapshot(), &rewritten);
        assert!(!controller.is_in_flight());
    }
}
