//! Recognizers for Minecraft server log lines.

use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::error::{PatternError, Result};

/// Outer shape of a log line: `[HH:MM:SS] [thread/LEVEL]: content`.
pub const LINE: &str = r"\[(?P<hour>[0-9]+):(?P<min>[0-9]+):(?P<sec>[0-9]+)\] \[(?P<thread>[^\]]+)/(?P<logging>[^\]/]+)\]: (?P<content>.*)";
/// A chat message, optionally marked as not secure.
pub const MESSAGE: &str = r"(?P<insecure>\[Not Secure\] )?<(?P<name>[^>]+)> (?P<message>.*)";
/// A valid player name.
pub const PLAYER_NAME: &str = r"[a-zA-Z0-9_]{3,16}";
pub const PLAYER_JOINED: &str =
    r"(?P<name>[^\[]+)\[(.*?)\] logged in with entity id \d+ at \(.+\)";
pub const PLAYER_LEFT: &str = r"(?P<name>[^ ]+) left the game";
pub const SERVER_READY: &str =
    r#"Done \((?P<secs>[0-9.]+)s\)! For help, type "help"( or "\?")?"#;
pub const RCON_READY: &str = r"RCON running on (?P<address>[\w.]+:\d+)";

/// A compiled pattern.
///
/// Each pattern is compiled twice: once as written for searching, and once
/// anchored at both ends for full matches.
#[derive(Debug, Clone)]
pub struct Pattern {
    /// Human-readable name for this pattern.
    pub name: &'static str,
    source: String,
    search: Regex,
    full: Regex,
}

impl Pattern {
    /// Compiles a new pattern.
    pub fn new(name: &'static str, pattern: &str) -> Result<Self> {
        let compile = |re: &str| {
            Regex::new(re).map_err(|source| PatternError::Regex {
                name: name.to_string(),
                source,
            })
        };
        Ok(Self {
            name,
            source: pattern.to_string(),
            search: compile(pattern)?,
            full: compile(&format!(r"\A(?:{})\z", pattern))?,
        })
    }

    /// The pattern as written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Checks if the pattern occurs anywhere in the text.
    pub fn matches(&self, text: &str) -> bool {
        self.search.is_match(text)
    }

    /// Checks if the pattern matches the whole text.
    pub fn is_full_match(&self, text: &str) -> bool {
        self.full.is_match(text)
    }

    /// Captures of the first occurrence in the text.
    pub fn search<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.search.captures(text)
    }

    /// Captures of a match spanning the whole text.
    pub fn full_match<'t>(&self, text: &'t str) -> Option<Captures<'t>> {
        self.full.captures(text)
    }

    fn require_groups(self, groups: &[&'static str]) -> Result<Self> {
        let names: Vec<&str> = self.search.capture_names().flatten().collect();
        match groups.iter().copied().find(|group| !names.contains(group)) {
            Some(group) => Err(PatternError::MissingGroup {
                pattern: self.name.to_string(),
                group,
            }),
            None => Ok(self),
        }
    }
}

/// The recognizers used to classify one server's output.
#[derive(Debug, Clone)]
pub struct PatternSet {
    pub(crate) line: Pattern,
    pub(crate) messages: Vec<Pattern>,
    pub(crate) player_name: Pattern,
    pub(crate) player_joined: Pattern,
    pub(crate) player_left: Pattern,
    pub(crate) server_ready: Pattern,
    pub(crate) rcon_ready: Pattern,
}

impl PatternSet {
    /// Starts a builder seeded with the vanilla server patterns.
    pub fn builder() -> PatternSetBuilder {
        PatternSetBuilder::default()
    }

    /// The vanilla server patterns, compiled once per process.
    pub fn shared() -> &'static PatternSet {
        static PATTERNS: OnceLock<PatternSet> = OnceLock::new();
        PATTERNS.get_or_init(|| {
            PatternSet::builder()
                .build()
                .expect("built-in patterns are valid")
        })
    }

    pub fn line(&self) -> &Pattern {
        &self.line
    }

    /// Chat patterns, tried in order.
    pub fn messages(&self) -> &[Pattern] {
        &self.messages
    }

    /// Returns true if `name` is a valid player name.
    pub fn is_valid_player_name(&self, name: &str) -> bool {
        self.player_name.is_full_match(name)
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::shared().clone()
    }
}

/// Builder for [`PatternSet`] overrides.
#[derive(Debug, Clone)]
pub struct PatternSetBuilder {
    line: String,
    messages: Vec<String>,
    player_name: String,
    player_joined: String,
    player_left: String,
    server_ready: String,
    rcon_ready: String,
}

impl Default for PatternSetBuilder {
    fn default() -> Self {
        Self {
            line: LINE.to_string(),
            messages: vec![MESSAGE.to_string()],
            player_name: PLAYER_NAME.to_string(),
            player_joined: PLAYER_JOINED.to_string(),
            player_left: PLAYER_LEFT.to_string(),
            server_ready: SERVER_READY.to_string(),
            rcon_ready: RCON_READY.to_string(),
        }
    }
}

impl PatternSetBuilder {
    /// Replaces the log-line pattern. Needs groups `hour`, `min`, `sec`,
    /// `thread`, `logging` and `content`.
    pub fn line(mut self, pattern: impl Into<String>) -> Self {
        self.line = pattern.into();
        self
    }

    /// Replaces all chat patterns with one. Needs groups `name` and `message`.
    pub fn message(mut self, pattern: impl Into<String>) -> Self {
        self.messages = vec![pattern.into()];
        self
    }

    /// Adds a chat pattern, tried after the ones already set.
    pub fn add_message(mut self, pattern: impl Into<String>) -> Self {
        self.messages.push(pattern.into());
        self
    }

    pub fn player_name(mut self, pattern: impl Into<String>) -> Self {
        self.player_name = pattern.into();
        self
    }

    /// Needs group `name`.
    pub fn player_joined(mut self, pattern: impl Into<String>) -> Self {
        self.player_joined = pattern.into();
        self
    }

    /// Needs group `name`.
    pub fn player_left(mut self, pattern: impl Into<String>) -> Self {
        self.player_left = pattern.into();
        self
    }

    /// An optional `secs` group is read as the startup duration.
    pub fn server_ready(mut self, pattern: impl Into<String>) -> Self {
        self.server_ready = pattern.into();
        self
    }

    /// An optional `address` group is read as the RCON address.
    pub fn rcon_ready(mut self, pattern: impl Into<String>) -> Self {
        self.rcon_ready = pattern.into();
        self
    }

    /// Compiles every pattern and checks the groups the classifier reads.
    pub fn build(self) -> Result<PatternSet> {
        let messages = self
            .messages
            .iter()
            .map(|p| Pattern::new("message", p)?.require_groups(&["name", "message"]))
            .collect::<Result<Vec<_>>>()?;

        Ok(PatternSet {
            line: Pattern::new("line", &self.line)?.require_groups(&[
                "hour", "min", "sec", "thread", "logging", "content",
            ])?,
            messages,
            player_name: Pattern::new("player_name", &self.player_name)?,
            player_joined: Pattern::new("player_joined", &self.player_joined)?
                .require_groups(&["name"])?,
            player_left: Pattern::new("player_left", &self.player_left)?
                .require_groups(&["name"])?,
            server_ready: Pattern::new("server_ready", &self.server_ready)?,
            rcon_ready: Pattern::new("rcon_ready", &self.rcon_ready)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_match_is_anchored() {
        let pattern = Pattern::new("left", PLAYER_LEFT).unwrap();
        assert!(pattern.is_full_match("Steve left the game"));
        assert!(!pattern.is_full_match("Steve left the game again"));
        assert!(pattern.matches("Steve left the game again"));
    }

    #[test]
    fn test_alternation_is_anchored_as_a_whole() {
        let pattern = Pattern::new("alt", "a|b").unwrap();
        assert!(pattern.is_full_match("a"));
        assert!(!pattern.is_full_match("ab"));
    }

    #[test]
    fn test_line_pattern_captures_header() {
        let patterns = PatternSet::shared();
        let caps = patterns
            .line()
            .search("[10:15:00] [Server thread/INFO]: hello")
            .unwrap();
        assert_eq!(&caps["hour"], "10");
        assert_eq!(&caps["thread"], "Server thread");
        assert_eq!(&caps["logging"], "INFO");
        assert_eq!(&caps["content"], "hello");
    }

    #[test]
    fn test_player_name_rules() {
        let patterns = PatternSet::shared();
        assert!(patterns.is_valid_player_name("Steve"));
        assert!(patterns.is_valid_player_name("a_1"));
        assert!(!patterns.is_valid_player_name("ab"));
        assert!(!patterns.is_valid_player_name("Steve Jobs"));
        assert!(!patterns.is_valid_player_name("abcdefghijklmnopq"));
    }

    #[test]
    fn test_server_ready_with_optional_suffix() {
        let patterns = PatternSet::shared();
        assert!(patterns
            .server_ready
            .is_full_match(r#"Done (12.345s)! For help, type "help""#));
        assert!(patterns
            .server_ready
            .is_full_match(r#"Done (3.1s)! For help, type "help" or "?""#));
    }

    #[test]
    fn test_builder_rejects_invalid_regex() {
        let err = PatternSet::builder().player_left("(unclosed").build().unwrap_err();
        assert!(matches!(err, PatternError::Regex { ref name, .. } if name == "player_left"));
    }

    #[test]
    fn test_builder_rejects_missing_group() {
        let err = PatternSet::builder()
            .message(r"<(?P<who>\w+)> (?P<message>.*)")
            .build()
            .unwrap_err();
        assert!(matches!(err, PatternError::MissingGroup { group: "name", .. }));
    }

    #[test]
    fn test_add_message_keeps_default_first() {
        let patterns = PatternSet::builder()
            .add_message(r"\[(?P<name>\w+)\] (?P<message>.*)")
            .build()
            .unwrap();
        assert_eq!(patterns.messages().len(), 2);
        assert_eq!(patterns.messages()[0].as_str(), MESSAGE);
    }
}
