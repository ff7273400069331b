//! Line classification.

use std::sync::Arc;

use mcpm_models::{ClassifiedEvent, EventKind, LogHeader, LogTime, PlayerOperation, ServerId};

use crate::error::ClassifyError;
use crate::patterns::{Pattern, PatternSet};

/// Classifies one raw line of server output.
///
/// Lines that do not have the `[HH:MM:SS] [thread/LEVEL]: content` shape
/// become generic log events with unknown time. Otherwise the trimmed
/// content is tested in a fixed order and the first match wins: chat,
/// join, leave, server ready, RCON ready. Anything else is a log event.
///
/// Fails only when a chat or join/leave line names an invalid player.
pub fn classify(
    server_id: &ServerId,
    raw: &str,
    patterns: &PatternSet,
) -> Result<ClassifiedEvent, ClassifyError> {
    let text = raw.trim_matches(|c: char| c == '\n' || c == '\r');

    let Some(header) = parse_header(text, patterns) else {
        return Ok(ClassifiedEvent::unstructured(server_id.clone(), text));
    };

    let kind = classify_content(&header.content, patterns)?;
    Ok(ClassifiedEvent::from_header(
        server_id.clone(),
        text,
        header,
        kind,
    ))
}

fn parse_header(text: &str, patterns: &PatternSet) -> Option<LogHeader> {
    let caps = patterns.line.search(text)?;

    Some(LogHeader {
        time: LogTime::new(
            clock_field(&caps["hour"]),
            clock_field(&caps["min"]),
            clock_field(&caps["sec"]),
        ),
        thread: caps["thread"].trim().to_string(),
        level: caps["logging"].trim().to_string(),
        content: caps["content"].trim().to_string(),
    })
}

/// Reads a run of digits, saturating at `i32::MAX`. Non-ASCII digits a
/// custom line pattern may let through are ignored.
fn clock_field(digits: &str) -> i32 {
    digits
        .bytes()
        .filter(u8::is_ascii_digit)
        .fold(0i32, |acc, b| {
            acc.saturating_mul(10).saturating_add(i32::from(b - b'0'))
        })
}

fn classify_content(content: &str, patterns: &PatternSet) -> Result<EventKind, ClassifyError> {
    for pattern in &patterns.messages {
        if let Some(caps) = pattern.full_match(content) {
            let player = valid_player(&caps["name"], content, patterns)?;
            return Ok(EventKind::Message {
                player,
                message: caps["message"].to_string(),
                insecure: caps.name("insecure").is_some(),
            });
        }
    }

    if let Some(player) = join_left_player(&patterns.player_joined, content, patterns)? {
        return Ok(EventKind::PlayerJoinLeft {
            player,
            operation: PlayerOperation::Joined,
        });
    }
    if let Some(player) = join_left_player(&patterns.player_left, content, patterns)? {
        return Ok(EventKind::PlayerJoinLeft {
            player,
            operation: PlayerOperation::Left,
        });
    }

    if let Some(caps) = patterns.server_ready.full_match(content) {
        return Ok(EventKind::ServerReady {
            startup_secs: caps.name("secs").and_then(|m| m.as_str().parse().ok()),
        });
    }

    if let Some(caps) = patterns.rcon_ready.full_match(content) {
        return Ok(EventKind::RconReady {
            address: caps.name("address").map(|m| m.as_str().to_string()),
        });
    }

    Ok(EventKind::Log)
}

fn join_left_player(
    pattern: &Pattern,
    content: &str,
    patterns: &PatternSet,
) -> Result<Option<String>, ClassifyError> {
    match pattern.full_match(content) {
        Some(caps) => valid_player(&caps["name"], content, patterns).map(Some),
        None => Ok(None),
    }
}

fn valid_player(name: &str, content: &str, patterns: &PatternSet) -> Result<String, ClassifyError> {
    if patterns.is_valid_player_name(name) {
        Ok(name.to_string())
    } else {
        Err(ClassifyError::InvalidPlayerName {
            name: name.to_string(),
            content: content.to_string(),
        })
    }
}

/// A classifier bound to one server and pattern set.
#[derive(Debug, Clone)]
pub struct LineClassifier {
    server_id: ServerId,
    patterns: Arc<PatternSet>,
}

impl LineClassifier {
    /// Creates a classifier using the vanilla patterns.
    pub fn new(server_id: ServerId) -> Self {
        Self::with_patterns(server_id, Arc::new(PatternSet::default()))
    }

    /// Creates a classifier using custom patterns.
    pub fn with_patterns(server_id: ServerId, patterns: Arc<PatternSet>) -> Self {
        Self {
            server_id,
            patterns,
        }
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn classify(&self, raw: &str) -> Result<ClassifiedEvent, ClassifyError> {
        classify(&self.server_id, raw, &self.patterns)
    }
}
