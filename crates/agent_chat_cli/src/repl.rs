use std::collections::HashSet;
use std::io::{self, Write};

use agent_chat::{
    ChatHost, IgnoreReason, NotifyError, ResolvedView, SessionRuntime, SubmitOutcome, ViewState,
};
use agent_stream::{MessageId, Role, StreamChannel};
use tracing::warn;

use crate::commands::{parse_slash_command, SlashCommand, HELP_TEXT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Quit,
}

/// Line-oriented [`ChatHost`] writing notices to `out`.
#[derive(Debug)]
pub struct TerminalHost<W: Write> {
    out: W,
    shown: Option<ResolvedView>,
}

impl<W: Write> TerminalHost<W> {
    pub fn new(out: W) -> Self {
        Self { out, shown: None }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    fn write_view(&mut self, view: &ResolvedView) -> io::Result<()> {
        match (view.state, &view.full_screen) {
            (ViewState::AwaitingFirstToken, _) => writeln!(self.out, "... thinking"),
            (ViewState::FullScreen, Some(payload)) => {
                writeln!(self.out, "[{}] {}", payload.name, payload.props)
            }
            (ViewState::Empty, _) => writeln!(self.out, "(new conversation)"),
            (ViewState::Conversation | ViewState::FullScreen, _) => Ok(()),
        }
    }
}

impl<W: Write> ChatHost for TerminalHost<W> {
    fn notify_error(&mut self, message: &str) -> Result<(), NotifyError> {
        writeln!(self.out, "! {message}").map_err(|error| NotifyError::new(error.to_string()))
    }

    fn view_changed(&mut self, view: &ResolvedView) {
        if self.shown.as_ref() == Some(view) {
            return;
        }
        if let Err(error) = self.write_view(view) {
            warn!(%error, "failed to render view change");
        }
        self.shown = Some(view.clone());
    }
}

/// Terminal front end: one input line at a time, transcript on `out`.
pub struct Repl<C: StreamChannel, W: Write> {
    runtime: SessionRuntime<C>,
    host: TerminalHost<W>,
    printed: HashSet<MessageId>,
}

impl<C: StreamChannel, W: Write> Repl<C, W> {
    pub fn new(runtime: SessionRuntime<C>, out: W) -> Self {
        Self {
            runtime,
            host: TerminalHost::new(out),
            printed: HashSet::new(),
        }
    }

    pub fn runtime(&self) -> &SessionRuntime<C> {
        &self.runtime
    }

    pub fn output(&self) -> &W {
        self.host.output()
    }

    pub fn print_banner(&mut self) -> io::Result<()> {
        writeln!(self.host.out, "agent-chat. {HELP_TEXT}")
    }

    pub fn handle_line(&mut self, line: &str) -> io::Result<LineOutcome> {
        if let Some(command) = parse_slash_command(line) {
            match command {
                SlashCommand::Help => writeln!(self.host.out, "{HELP_TEXT}")?,
                SlashCommand::New => {
                    self.runtime.switch_thread(None, &mut self.host);
                    self.printed.clear();
                }
                SlashCommand::Stop => {
                    if !self.runtime.cancel(&mut self.host) {
                        writeln!(self.host.out, "No active turn")?;
                    }
                }
                SlashCommand::Quit => return Ok(LineOutcome::Quit),
                SlashCommand::Unknown(command) => {
                    writeln!(self.host.out, "Unknown command: {command}")?;
                }
            }

            self.render_new_messages()?;
            return Ok(LineOutcome::Continue);
        }

        self.runtime.controller_mut().composer_mut().set_text(line);
        match self.runtime.submit_composer(&mut self.host) {
            Ok(SubmitOutcome::Dispatched(_)) | Ok(SubmitOutcome::Ignored(IgnoreReason::EmptyInput)) => {}
            Ok(SubmitOutcome::Ignored(IgnoreReason::InFlight)) => {
                writeln!(
                    self.host.out,
                    "A turn is already running. Use /stop to stop it."
                )?;
            }
            Err(error) => writeln!(self.host.out, "Failed to send: {error}")?,
        }

        self.render_new_messages()?;
        Ok(LineOutcome::Continue)
    }

    /// Lets the channel progress and prints anything new. Returns true when a
    /// snapshot was applied.
    pub fn tick(&mut self) -> io::Result<bool> {
        let applied = self.runtime.poll(&mut self.host);
        self.render_new_messages()?;
        Ok(applied > 0)
    }

    pub fn is_busy(&self) -> bool {
        self.runtime.controller().is_in_flight()
    }

    fn render_new_messages(&mut self) -> io::Result<()> {
        let snapshot = self.runtime.controller().snapshot();
        for message in snapshot.visible_messages() {
            if message.role != Role::Ai || !self.printed.insert(message.id.clone()) {
                continue;
            }

            let text = message.text();
            if !text.is_empty() {
                writeln!(self.host.out, "agent> {text}")?;
            }
            for call in &message.tool_calls {
                writeln!(self.host.out, "  tool {}({})", call.name, call.arguments)?;
            }
        }
        Ok(())
    }
}
