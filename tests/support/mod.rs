#![allow(dead_code)]

use agent_chat::{ChatHost, ControllerConfig, NotifyError, ResolvedView, SessionRuntime, ThreadController};
use agent_stream::{ContentBlock, Message, SnapshotQueue, ToolCall};
use agent_stream_mock::MockChannel;
use serde_json::json;

/// How the spy answers `notify_error`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NotifyBehavior {
    #[default]
    Accept,
    Fail,
    Panic,
}

/// Records everything the controller tells its host.
#[derive(Debug, Default)]
pub struct HostSpy {
    pub notifications: Vec<String>,
    pub views: Vec<ResolvedView>,
    pub behavior: NotifyBehavior,
}

impl HostSpy {
    pub fn failing() -> Self {
        Self {
            behavior: NotifyBehavior::Fail,
            ..Self::default()
        }
    }

    pub fn panicking() -> Self {
        Self {
            behavior: NotifyBehavior::Panic,
            ..Self::default()
        }
    }

    pub fn last_view(&self) -> &ResolvedView {
        self.views.last().expect("host saw at least one view")
    }
}

impl ChatHost for HostSpy {
    fn notify_error(&mut self, message: &str) -> Result<(), NotifyError> {
        self.notifications.push(message.to_string());
        match self.behavior {
            NotifyBehavior::Accept => Ok(()),
            NotifyBehavior::Fail => Err(NotifyError::new("notifier unavailable")),
            NotifyBehavior::Panic => panic!("notifier crashed"),
        }
    }

    fn view_changed(&mut self, view: &ResolvedView) {
        self.views.push(view.clone());
    }
}

pub fn mock_runtime() -> SessionRuntime<MockChannel> {
    mock_runtime_with(ControllerConfig::default())
}

pub fn mock_runtime_with(config: ControllerConfig) -> SessionRuntime<MockChannel> {
    let queue = SnapshotQueue::new();
    let channel = MockChannel::new(queue.clone());
    SessionRuntime::new(ThreadController::new(config), channel, queue)
}

pub fn human(id: &str, text: &str) -> Message {
    Message::human(id, vec![ContentBlock::text(text)])
}

pub fn ai_calling(id: &str, calls: &[(&str, &str)]) -> Message {
    Message::ai_with_tool_calls(
        id,
        "",
        calls
            .iter()
            .map(|(call_id, name)| ToolCall::new(*call_id, *name, json!({})))
            .collect(),
    )
}
