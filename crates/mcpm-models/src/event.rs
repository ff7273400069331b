//! Classified server events.
//!
//! Every line a managed server prints becomes exactly one [`ClassifiedEvent`].
//! The envelope carries what all kinds share (server, raw text, log header,
//! routing scope); [`EventKind`] carries what is specific to each kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{EventId, ServerId};

/// Wall-clock time printed at the start of a server log line.
///
/// Lines that do not follow the log-line shape get [`LogTime::UNKNOWN`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogTime {
    pub hour: i32,
    pub min: i32,
    pub sec: i32,
}

impl LogTime {
    /// Placeholder for lines without a timestamp.
    pub const UNKNOWN: LogTime = LogTime {
        hour: -1,
        min: -1,
        sec: -1,
    };

    /// Creates a log time.
    pub fn new(hour: i32, min: i32, sec: i32) -> Self {
        Self { hour, min, sec }
    }

    /// Returns true if the time was parsed from the line.
    pub fn is_known(&self) -> bool {
        *self != Self::UNKNOWN
    }
}

impl fmt::Display for LogTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.min, self.sec)
    }
}

/// The parsed `[HH:MM:SS] [thread/LEVEL]: content` header of a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogHeader {
    pub time: LogTime,
    pub thread: String,
    pub level: String,
    /// Trimmed content after the header.
    pub content: String,
}

/// Whether a player joined or left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayerOperation {
    Joined,
    Left,
}

impl PlayerOperation {
    /// Returns `"joined"` or `"left"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlayerOperation::Joined => "joined",
            PlayerOperation::Left => "left",
        }
    }
}

impl fmt::Display for PlayerOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-specific payload of a classified event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Any line that is not one of the kinds below.
    Log,
    /// A chat message sent by a player.
    Message {
        player: String,
        message: String,
        /// The line carried the `[Not Secure]` marker.
        insecure: bool,
    },
    /// A player joined or left the server.
    PlayerJoinLeft {
        player: String,
        operation: PlayerOperation,
    },
    /// The server finished loading.
    ServerReady {
        /// Startup duration the server reported, in seconds.
        startup_secs: Option<f64>,
    },
    /// The server's RCON listener is up.
    RconReady {
        /// The `host:port` the server announced.
        address: Option<String>,
    },
}

impl EventKind {
    /// Returns the tag of this kind.
    pub fn tag(&self) -> EventKindTag {
        match self {
            EventKind::Log => EventKindTag::Log,
            EventKind::Message { .. } => EventKindTag::Message,
            EventKind::PlayerJoinLeft { .. } => EventKindTag::PlayerJoinLeft,
            EventKind::ServerReady { .. } => EventKindTag::ServerReady,
            EventKind::RconReady { .. } => EventKindTag::RconReady,
        }
    }

    /// Returns the player this kind is about, if any.
    pub fn player_name(&self) -> Option<&str> {
        match self {
            EventKind::Message { player, .. } | EventKind::PlayerJoinLeft { player, .. } => {
                Some(player)
            }
            _ => None,
        }
    }
}

/// Payload-free discriminant of [`EventKind`], used for filtering and hooks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKindTag {
    Log,
    Message,
    PlayerJoinLeft,
    ServerReady,
    RconReady,
}

/// Routing context of an event: the server, and the player for
/// player-scoped kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub server_id: ServerId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<String>,
}

impl Scope {
    /// Scope of a server-wide event.
    pub fn server(server_id: ServerId) -> Self {
        Self {
            server_id,
            player: None,
        }
    }

    /// Scope of a player-scoped event.
    pub fn player(server_id: ServerId, player: impl Into<String>) -> Self {
        Self {
            server_id,
            player: Some(player.into()),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.player {
            Some(player) => write!(f, "({}, {})", self.server_id, player),
            None => write!(f, "({},)", self.server_id),
        }
    }
}

/// One classified line of server output.
///
/// Fields are private so the scope, which is derived at construction, can
/// never drift from the kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEvent {
    id: EventId,
    server_id: ServerId,
    text: String,
    time: LogTime,
    thread: String,
    level: String,
    content: String,
    #[serde(flatten)]
    kind: EventKind,
    scope: Scope,
    received_at: DateTime<Utc>,
}

impl ClassifiedEvent {
    /// Creates an event for a line that matched the log-line shape.
    pub fn from_header(
        server_id: ServerId,
        text: impl Into<String>,
        header: LogHeader,
        kind: EventKind,
    ) -> Self {
        let scope = match kind.player_name() {
            Some(player) => Scope::player(server_id.clone(), player),
            None => Scope::server(server_id.clone()),
        };
        Self {
            id: EventId::new(),
            server_id,
            text: text.into(),
            time: header.time,
            thread: header.thread,
            level: header.level,
            content: header.content,
            kind,
            scope,
            received_at: Utc::now(),
        }
    }

    /// Creates a generic log event for a line without a log header.
    pub fn unstructured(server_id: ServerId, text: impl Into<String>) -> Self {
        let text = text.into();
        let content = text.trim().to_string();
        Self {
            id: EventId::new(),
            scope: Scope::server(server_id.clone()),
            server_id,
            text,
            time: LogTime::UNKNOWN,
            thread: String::new(),
            level: String::new(),
            content,
            kind: EventKind::Log,
            received_at: Utc::now(),
        }
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// The line as it was read, trailing newline removed.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn time(&self) -> LogTime {
        self.time
    }

    /// Logging thread name, empty for unstructured lines.
    pub fn thread(&self) -> &str {
        &self.thread
    }

    /// Logging level (`INFO`, `WARN`, ...), empty for unstructured lines.
    pub fn level(&self) -> &str {
        &self.level
    }

    /// Trimmed content after the log header, or the trimmed line.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    pub fn kind_tag(&self) -> EventKindTag {
        self.kind.tag()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn player_name(&self) -> Option<&str> {
        self.kind.player_name()
    }

    pub fn is_from_server(&self, server_id: &str) -> bool {
        self.server_id.as_str() == server_id
    }

    pub fn is_from_player(&self, player: &str) -> bool {
        self.player_name() == Some(player)
    }

    pub fn is_joined(&self) -> bool {
        matches!(
            self.kind,
            EventKind::PlayerJoinLeft {
                operation: PlayerOperation::Joined,
                ..
            }
        )
    }

    pub fn is_left(&self) -> bool {
        matches!(
            self.kind,
            EventKind::PlayerJoinLeft {
                operation: PlayerOperation::Left,
                ..
            }
        )
    }

    /// Human readable text of the event, as a chat bot would present it.
    pub fn summary(&self) -> String {
        match &self.kind {
            EventKind::Log => self.content.clone(),
            EventKind::Message { message, .. } => message.clone(),
            EventKind::PlayerJoinLeft { player, operation } => {
                format!("{} {} the server named {}", player, operation, self.server_id)
            }
            EventKind::ServerReady { .. } => format!("Server {} has loaded.", self.server_id),
            EventKind::RconReady { .. } => {
                format!("Server {} has started RCON.", self.server_id)
            }
        }
    }
}

impl fmt::Display for ClassifiedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {:?} {}", self.server_id, self.kind_tag(), self.summary())
    }
}
