//! Command actions and their console text.

use serde::{Deserialize, Serialize};

/// Target selector that addresses every online player.
pub const ALL_PLAYERS: &str = "@a";

/// Something a caller wants the server to do, before it is turned into
/// console command text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CmdAction {
    /// A literal command line, sent as is.
    Raw { command: String },
    /// A command name followed by space-separated arguments.
    Command { name: String, args: Vec<String> },
    /// A `tellraw` message to one target.
    SendMessage { target: String, message: String },
    /// A `tellraw` message to every player.
    Broadcast { message: String },
}

impl CmdAction {
    /// Creates a raw command action.
    pub fn raw(command: impl Into<String>) -> Self {
        CmdAction::Raw {
            command: command.into(),
        }
    }

    /// Creates a command action from a name and arguments.
    pub fn command<I, S>(name: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CmdAction::Command {
            name: name.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    /// Creates a message action for one target.
    pub fn send_message(target: impl Into<String>, message: impl Into<String>) -> Self {
        CmdAction::SendMessage {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a message action for all players.
    pub fn broadcast(message: impl Into<String>) -> Self {
        CmdAction::Broadcast {
            message: message.into(),
        }
    }

    /// Returns the command name (first word) this action produces.
    pub fn name(&self) -> &str {
        match self {
            CmdAction::Raw { command } => command.split(' ').next().unwrap_or_default(),
            CmdAction::Command { name, .. } => name,
            CmdAction::SendMessage { .. } | CmdAction::Broadcast { .. } => "tellraw",
        }
    }

    /// Renders the console command line, without trailing newline.
    pub fn to_command_line(&self) -> String {
        match self {
            CmdAction::Raw { command } => command.clone(),
            CmdAction::Command { name, args } if args.is_empty() => name.clone(),
            CmdAction::Command { name, args } => format!("{} {}", name, args.join(" ")),
            CmdAction::SendMessage { target, message } => tellraw(target, message),
            CmdAction::Broadcast { message } => tellraw(ALL_PLAYERS, message),
        }
    }
}

/// `tellraw` takes a JSON text component; a plain JSON string is the
/// simplest one.
fn tellraw(target: &str, message: &str) -> String {
    let component = serde_json::Value::String(message.to_string()).to_string();
    format!("tellraw {} {}", target, component)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_command_is_verbatim() {
        let action = CmdAction::raw("say hello world");
        assert_eq!(action.to_command_line(), "say hello world");
        assert_eq!(action.name(), "say");
    }

    #[test]
    fn test_command_joins_args() {
        let action = CmdAction::command("whitelist", ["add", "Steve"]);
        assert_eq!(action.to_command_line(), "whitelist add Steve");

        let bare = CmdAction::command("list", Vec::<String>::new());
        assert_eq!(bare.to_command_line(), "list");
    }

    #[test]
    fn test_send_message_uses_tellraw() {
        let action = CmdAction::send_message("Steve", "hi there");
        assert_eq!(action.to_command_line(), r#"tellraw Steve "hi there""#);
        assert_eq!(action.name(), "tellraw");
    }

    #[test]
    fn test_broadcast_targets_all_players() {
        let action = CmdAction::broadcast("restart in 5");
        assert_eq!(action.to_command_line(), r#"tellraw @a "restart in 5""#);
    }

    #[test]
    fn test_message_quotes_are_escaped() {
        let action = CmdAction::broadcast(r#"say "hi""#);
        assert_eq!(action.to_command_line(), r#"tellraw @a "say \"hi\"""#);
    }
}
