use agent_stream::{SnapshotQueue, StreamChannel};
use agent_stream_mock::{MockChannel, MOCK_CHANNEL_ID};
use tracing::info;

pub const DEFAULT_CHANNEL_ID: &str = MOCK_CHANNEL_ID;
pub const CHANNEL_ENV_VAR: &str = "AGENT_CHAT_CHANNEL";

/// Channel id named by `AGENT_CHAT_CHANNEL`, lowercased. Unset or blank
/// selects the default.
pub fn selected_channel_id() -> String {
    std::env::var(CHANNEL_ENV_VAR)
        .ok()
        .map(|value| value.trim().to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_CHANNEL_ID.to_string())
}

pub fn channel_from_env(queue: SnapshotQueue) -> Result<Box<dyn StreamChannel>, String> {
    let channel_id = selected_channel_id();
    let channel = channel_for_id(&channel_id, queue)?;
    info!(channel = %channel_id, "stream channel selected");
    Ok(channel)
}

/// Builds the channel publishing into `queue`. Every channel shares the
/// runtime's queue so snapshots are pumped in arrival order.
pub fn channel_for_id(
    channel_id: &str,
    queue: SnapshotQueue,
) -> Result<Box<dyn StreamChannel>, String> {
    match channel_id {
        MOCK_CHANNEL_ID => Ok(Box::new(MockChannel::demo(queue))),
        unknown => Err(format!(
            "Unsupported {CHANNEL_ENV_VAR} '{unknown}'. Available channels: {MOCK_CHANNEL_ID}"
        )),
    }
}
