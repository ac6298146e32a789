use agent_stream::{ContentBlock, SnapshotQueue, StreamChannel, ThreadId};
use tracing::{debug, trace};

use crate::controller::{ChatHost, SnapshotDisposition, SubmitOutcome, ThreadController};
use crate::error::ControllerError;

/// Drives a [`ThreadController`] against one channel.
///
/// Channels publish into a shared [`SnapshotQueue`], possibly from another
/// thread. The runtime drains it on the caller's thread, in arrival order.
/// Call [`SessionRuntime::pump`] after anything that may have produced
/// snapshots; the helpers below do so themselves.
pub struct SessionRuntime<C: StreamChannel> {
    controller: ThreadController,
    channel: C,
    queue: SnapshotQueue,
}

impl<C: StreamChannel> SessionRuntime<C> {
    pub fn new(controller: ThreadController, channel: C, queue: SnapshotQueue) -> Self {
        Self {
            controller,
            channel,
            queue,
        }
    }

    pub fn controller(&self) -> &ThreadController {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut ThreadController {
        &mut self.controller
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Applies every queued snapshot. Returns how many were applied (stale
    /// ones are dropped and not counted).
    pub fn pump(&mut self, host: &mut dyn ChatHost) -> usize {
        let mut applied = 0;
        while let Some(snapshot) = self.queue.pop() {
            match self.controller.on_snapshot(snapshot, host) {
                SnapshotDisposition::Applied => applied += 1,
                SnapshotDisposition::Stale => trace!("stale snapshot skipped"),
            }
        }
        applied
    }

    /// Lets the channel make progress, then drains what it produced.
    pub fn poll(&mut self, host: &mut dyn ChatHost) -> usize {
        let progressed = self.channel.poll();
        if progressed {
            trace!("channel made progress");
        }
        self.pump(host)
    }

    /// Polls until the channel reports no more work.
    pub fn run_until_idle(&mut self, host: &mut dyn ChatHost) -> usize {
        let mut applied = self.pump(host);
        while self.channel.poll() {
            applied += self.pump(host);
        }
        applied
    }

    pub fn submit(
        &mut self,
        text: &str,
        attachments: Vec<ContentBlock>,
        host: &mut dyn ChatHost,
    ) -> Result<SubmitOutcome, ControllerError> {
        self.pump(host);
        let context = self.controller.artifact_context().clone();
        let outcome =
            self.controller
                .submit(text, attachments, &context, &mut self.channel, host)?;
        self.pump(host);
        Ok(outcome)
    }

    pub fn submit_composer(
        &mut self,
        host: &mut dyn ChatHost,
    ) -> Result<SubmitOutcome, ControllerError> {
        self.pump(host);
        let outcome = self.controller.submit_composer(&mut self.channel, host)?;
        self.pump(host);
        Ok(outcome)
    }

    pub fn cancel(&mut self, host: &mut dyn ChatHost) -> bool {
        let requested = self.controller.request_cancel(&mut self.channel, host);
        self.pump(host);
        requested
    }

    /// Switches the controller and the channel to `thread_id` (`None` for a
    /// new conversation) and applies whatever the channel loads for it.
    pub fn switch_thread(&mut self, thread_id: Option<ThreadId>, host: &mut dyn ChatHost) {
        debug!(thread_id = ?thread_id, "session switching thread");
        self.controller.switch_thread(thread_id.clone(), host);
        self.channel.open_thread(thread_id);
        self.pump(host);
    }
}
