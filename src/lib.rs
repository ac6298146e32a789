//! Client-side controller for a turn-based conversational agent session.
//!
//! The crate accepts user input, answers tool calls the previous agent turn
//! left open, dispatches a consistent message sequence to a streaming
//! [`StreamChannel`](agent_stream::StreamChannel), and reconciles the optimistic
//! local view with the snapshots the channel confirms.
//!
//! # Protocol invariant
//!
//! Every tool call an `ai` message emits must be answered by exactly one
//! `tool` message before the next `human` message. [`ThreadController::submit`]
//! enforces this by prefixing the turn with placeholder results from
//! [`reconcile::synthesize_missing_tool_results`]. Placeholders carry ids with
//! the `do-not-render-` prefix so renderers can skip them.
//!
//! # Configuration
//!
//! [`ControllerConfig::from_env`] reads:
//!
//! - `AGENT_CHAT_FULL_SCREEN_MARKER`: UI payload name that takes over the main
//!   view (default `full_screen`).
//! - `AGENT_CHAT_SYNTHETIC_TOOL_CONTENT`: text of placeholder tool results
//!   (default `Successfully handled tool call.`).
//! - `AGENT_CHAT_SYNTHETIC_IDS`: `random` (default) or `derived`.
//!
//! Blank values fall back to the defaults. Unknown id strategies are rejected.

pub mod composer;
pub mod config;
pub mod controller;
pub mod error;
pub mod error_dedup;
pub mod full_screen;
pub mod ids;
pub mod reconcile;
pub mod runtime;
pub mod view;

pub use crate::composer::Composer;
pub use crate::config::{ControllerConfig, SyntheticIdStrategy, SyntheticToolResults};
pub use crate::controller::{
    ChatHost, DispatchSummary, IgnoreReason, SnapshotDisposition, SubmitOutcome, ThreadController,
};
pub use crate::error::{ConfigError, ControllerError, NotifyError};
pub use crate::error_dedup::{ErrorDeduplicator, Notification};
pub use crate::full_screen::select_full_screen;
pub use crate::runtime::SessionRuntime;
pub use crate::view::{Phase, ResolvedView, ViewState};
