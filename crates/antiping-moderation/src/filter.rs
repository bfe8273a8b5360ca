//! Room and member scoping.

use crate::config::Config;
use crate::error::{ModerationError, Result};
use crate::event::RoomMessage;
use glob::{MatchOptions, Pattern, PatternError};

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compile a shell-style wildcard pattern.
///
/// Runs of `*` collapse to one, so `!spam**` matches like `!spam*`.
pub fn compile_pattern(pattern: &str) -> std::result::Result<Pattern, PatternError> {
    let mut collapsed = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        if c == '*' && collapsed.ends_with('*') {
            continue;
        }
        collapsed.push(c);
    }
    Pattern::new(&collapsed)
}

/// A set of shell-style wildcard patterns. An empty set matches nothing.
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Compile `patterns`.
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                compile_pattern(p)
                    .map_err(|e| ModerationError::config(format!("invalid pattern {p:?}: {e}")))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Whether any pattern matches the whole of `candidate`.
    pub fn matches(&self, candidate: &str) -> bool {
        self.patterns
            .iter()
            .any(|p| p.matches_with(candidate, MATCH_OPTIONS))
    }
}

/// Why a message was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Skip {
    /// Room belongs to another homeserver
    ForeignRoom,
    /// Room not in the include list
    NotIncluded,
    /// Room in the exclude list
    ExcludedRoom,
    /// Log or moderation-bot room
    ControlRoom,
    /// Sender in the member exclude list
    ExcludedMember,
    /// Sent by the engine's own account
    OwnMessage,
}

/// Decides which messages are in scope for scoring.
#[derive(Debug, Clone)]
pub struct EventFilter {
    server_suffix: String,
    include_rooms: PatternSet,
    exclude_rooms: PatternSet,
    exclude_members: PatternSet,
    control_rooms: [String; 2],
    bot_user_id: String,
}

impl EventFilter {
    /// Build the filter from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            server_suffix: format!(":{}", config.server_name),
            include_rooms: PatternSet::new(&config.rooms.include)?,
            exclude_rooms: PatternSet::new(&config.rooms.exclude)?,
            exclude_members: PatternSet::new(&config.members.exclude)?,
            control_rooms: [config.log.room.clone(), config.mjolnir.room.clone()],
            bot_user_id: config.bot_user_id(),
        })
    }

    /// `Some(reason)` if `message` should not be scored.
    pub fn skip_reason(&self, message: &RoomMessage) -> Option<Skip> {
        let room = message.room_id.as_str();
        if !room.ends_with(&self.server_suffix) {
            return Some(Skip::ForeignRoom);
        }
        if !self.include_rooms.matches(room) {
            return Some(Skip::NotIncluded);
        }
        if self.exclude_rooms.matches(room) {
            return Some(Skip::ExcludedRoom);
        }
        if self.control_rooms.iter().any(|r| r == room) {
            return Some(Skip::ControlRoom);
        }
        if self.exclude_members.matches(&message.sender) {
            return Some(Skip::ExcludedMember);
        }
        if message.sender == self.bot_user_id {
            return Some(Skip::OwnMessage);
        }
        None
    }
}
