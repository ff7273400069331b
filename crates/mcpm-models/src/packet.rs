//! Packets exchanged with a managed server.

use serde::{Deserialize, Serialize};

use crate::action::CmdAction;
use crate::ids::{PacketId, ServerId};

/// One line of server output, tagged with the server it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InPacket {
    pub id: PacketId,
    pub server_id: ServerId,
    /// Decoded line with the trailing newline removed.
    pub line: String,
}

impl InPacket {
    /// Creates a new inbound packet.
    pub fn new(server_id: ServerId, line: impl Into<String>) -> Self {
        Self {
            id: PacketId::new(),
            server_id,
            line: line.into(),
        }
    }
}

/// A command to send to a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPacket {
    pub id: PacketId,
    /// Console command line, without trailing newline.
    pub command: String,
}

impl OutPacket {
    /// Creates a packet for a literal command line.
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            id: PacketId::new(),
            command: command.into(),
        }
    }

    /// Creates a packet from a command action.
    pub fn from_action(action: &CmdAction) -> Self {
        Self::new(action.to_command_line())
    }
}

impl From<CmdAction> for OutPacket {
    fn from(action: CmdAction) -> Self {
        Self::from_action(&action)
    }
}

/// The response to an [`OutPacket`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EchoPacket {
    /// Id of the packet this echoes.
    pub id: PacketId,
    /// The command that was sent.
    pub command: String,
    /// Response text, empty when the server gave none.
    pub content: String,
    /// True when the command channel has no way to return a response.
    pub no_echo: bool,
}

impl EchoPacket {
    /// Creates an echo carrying a response.
    pub fn response(packet: &OutPacket, content: impl Into<String>) -> Self {
        Self {
            id: packet.id.clone(),
            command: packet.command.clone(),
            content: content.into(),
            no_echo: false,
        }
    }

    /// Creates an echo for a channel without responses.
    pub fn no_echo(packet: &OutPacket) -> Self {
        Self {
            id: packet.id.clone(),
            command: packet.command.clone(),
            content: String::new(),
            no_echo: true,
        }
    }

    /// Returns the response text, or `None` if it is empty.
    pub fn result(&self) -> Option<&str> {
        if self.content.is_empty() {
            None
        } else {
            Some(&self.content)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_packet_from_action() {
        let packet = OutPacket::from(CmdAction::command("time", ["set", "day"]));
        assert_eq!(packet.command, "time set day");
    }

    #[test]
    fn test_echo_keeps_packet_id() {
        let packet = OutPacket::new("list");
        let echo = EchoPacket::response(&packet, "There are 0 of a max of 20 players online");
        assert_eq!(echo.id, packet.id);
        assert_eq!(echo.command, "list");
        assert!(!echo.no_echo);
        assert_eq!(echo.result(), Some("There are 0 of a max of 20 players online"));
    }

    #[test]
    fn test_no_echo_has_no_result() {
        let packet = OutPacket::new("save-all");
        let echo = EchoPacket::no_echo(&packet);
        assert!(echo.no_echo);
        assert_eq!(echo.result(), None);
    }

    #[test]
    fn test_empty_response_has_no_result() {
        let packet = OutPacket::new("say hi");
        let echo = EchoPacket::response(&packet, "");
        assert_eq!(echo.result(), None);
    }
}
