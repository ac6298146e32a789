//! Line-oriented terminal front end for `agent_chat`.
//!
//! ## Channel bootstrap
//!
//! Select the streaming channel with `AGENT_CHAT_CHANNEL`. Only `mock` is
//! available; it is also the default. The mock demo backend echoes prompts,
//! fails turns whose prompt mentions "fail", and answers "draw" prompts with a
//! tool call plus a full-screen payload.
//!
//! Controller settings come from the `AGENT_CHAT_*` variables documented on
//! [`agent_chat::ControllerConfig::from_env`]. Logs go to stderr, filtered by
//! `RUST_LOG` (default `warn`).

pub mod channels;
pub mod commands;
pub mod logging;
pub mod repl;
