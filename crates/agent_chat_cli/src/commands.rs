#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlashCommand {
    Help,
    /// Start a fresh thread.
    New,
    /// Stop the in-flight turn.
    Stop,
    Quit,
    Unknown(String),
}

pub const HELP_TEXT: &str = "Commands: /help, /new, /stop, /quit";

pub fn parse_slash_command(input: &str) -> Option<SlashCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let command = trimmed.split_whitespace().next().unwrap_or(trimmed);

    let parsed = match command {
        "/help" => SlashCommand::Help,
        "/new" => SlashCommand::New,
        "/stop" | "/cancel" => SlashCommand::Stop,
        "/quit" | "/exit" => SlashCommand::Quit,
        _ => SlashCommand::Unknown(command.to_string()),
    };

    Some(parsed)
}
