//! Event filtering.

use mcpm_models::{ClassifiedEvent, EventKindTag, Scope, ServerId};

/// Filter criteria for classified events. Unset fields match anything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// Filter by originating server.
    pub server_id: Option<ServerId>,
    /// Filter by the player the event is about.
    pub player: Option<String>,
    /// Filter by event kind.
    pub kind: Option<EventKindTag>,
    /// Filter by exact routing scope.
    pub scope: Option<Scope>,
    /// Filter by logging level, compared case-insensitively.
    pub level: Option<String>,
}

impl EventFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_id(mut self, server_id: ServerId) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    pub fn with_kind(mut self, kind: EventKindTag) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    /// Returns true if the event matches this filter.
    pub fn matches(&self, event: &ClassifiedEvent) -> bool {
        if let Some(ref server_id) = self.server_id {
            if event.server_id() != server_id {
                return false;
            }
        }

        if let Some(ref player) = self.player {
            if !event.is_from_player(player) {
                return false;
            }
        }

        if let Some(kind) = self.kind {
            if event.kind_tag() != kind {
                return false;
            }
        }

        if let Some(ref scope) = self.scope {
            if event.scope() != scope {
                return false;
            }
        }

        if let Some(ref level) = self.level {
            if !event.level().eq_ignore_ascii_case(level) {
                return false;
            }
        }

        true
    }
}
