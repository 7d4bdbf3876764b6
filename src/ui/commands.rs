/// What a line typed into the chat shell asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Send(String),
    LoadOlder,
    Help,
    Quit,
    /// Blank line; nothing to do.
    Nothing,
    Unknown(String),
}

pub const HELP_LINES: [&str; 4] = [
    "Type a message and press Enter to send it.",
    "/more  load older messages",
    "/help  show this help",
    "/quit  leave the conversation (also /q or Ctrl-D)",
];

pub fn parse_command(line: &str) -> ChatCommand {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ChatCommand::Nothing;
    }

    // A doubled slash sends the rest literally.
    if let Some(literal) = trimmed.strip_prefix("//") {
        return ChatCommand::Send(format!("/{literal}"));
    }

    let Some(name) = trimmed.strip_prefix('/') else {
        return ChatCommand::Send(line.trim_end_matches(['\r', '\n']).to_owned());
    };

    match name.to_ascii_lowercase().as_str() {
        "more" | "m" => ChatCommand::LoadOlder,
        "help" | "h" | "?" => ChatCommand::Help,
        "quit" | "q" | "exit" => ChatCommand::Quit,
        _ => ChatCommand::Unknown(trimmed.to_owned()),
    }
}
