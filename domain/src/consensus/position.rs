//! Position classification for discussion contributions.
//!
//! A contribution ideally ends with an explicit tag such as
//! `[POSITION: SUPPORT] - reason`. When the tag is absent the content is
//! classified by signal phrases, English and German, checked in order of
//! decreasing severity. Unclassifiable content defaults to `Concern` so
//! that a vague answer can never produce consensus.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stance a participant takes on the current proposal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Position {
    Proposal,
    Support,
    SupportWithConditions,
    Concern,
    Objection,
}

impl Position {
    pub fn as_str(self) -> &'static str {
        match self {
            Position::Proposal => "PROPOSAL",
            Position::Support => "SUPPORT",
            Position::SupportWithConditions => "SUPPORT_WITH_CONDITIONS",
            Position::Concern => "CONCERN",
            Position::Objection => "OBJECTION",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_uppercase().as_str() {
            "PROPOSAL" => Some(Position::Proposal),
            "SUPPORT" => Some(Position::Support),
            "SUPPORT_WITH_CONDITIONS" => Some(Position::SupportWithConditions),
            "CONCERN" => Some(Position::Concern),
            "OBJECTION" => Some(Position::Objection),
            _ => None,
        }
    }

    /// Whether this position counts as approval of the proposal.
    pub fn is_supportive(self) -> bool {
        matches!(self, Position::Support | Position::SupportWithConditions)
    }

    /// Proposals themselves do not vote on the proposal.
    pub fn is_voting(self) -> bool {
        self != Position::Proposal
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reason attached when no position could be determined.
pub const POSITION_UNCLEAR: &str = "Position unclear from response";

const OBJECTION_PHRASES: &[&str] = &[
    "ich widerspreche",
    "einspruch",
    "kann ich nicht unterstützen",
    "lehne ich ab",
    "blockierend",
    "i object",
    "strong objection",
];

const CONCERN_PHRASES: &[&str] = &[
    "bedenken",
    "sorge",
    "problematisch",
    "zu bedenken",
    "concern",
    "worried",
];

const CONDITION_PHRASES: &[&str] = &[
    "unter der bedingung",
    "wenn wir",
    "sofern",
    "vorausgesetzt",
    "with the condition",
    "provided that",
];

const SUPPORT_PHRASES: &[&str] = &[
    "stimme zu",
    "unterstütze",
    "gute idee",
    "einverstanden",
    "agree",
    "support",
    "good approach",
];

/// Classify a contribution, returning the position and an optional reason.
pub fn extract_position(content: &str) -> (Position, Option<String>) {
    if let Some((position, reason)) = extract_tag(content) {
        return (position, reason);
    }

    let lower = content.to_lowercase();
    for (phrases, position) in [
        (OBJECTION_PHRASES, Position::Objection),
        (CONCERN_PHRASES, Position::Concern),
        (CONDITION_PHRASES, Position::SupportWithConditions),
        (SUPPORT_PHRASES, Position::Support),
    ] {
        if phrases.iter().any(|p| lower.contains(p)) {
            return (position, None);
        }
    }

    (Position::Concern, Some(POSITION_UNCLEAR.to_string()))
}

/// Look for an explicit `[POSITION: X]` tag, optionally followed by a
/// dash-separated reason on the same line.
fn extract_tag(content: &str) -> Option<(Position, Option<String>)> {
    const MARKER: &[u8] = b"[POSITION:";
    let bytes = content.as_bytes();
    let start = bytes
        .windows(MARKER.len())
        .position(|w| w.eq_ignore_ascii_case(MARKER))?;

    let after_marker = &content[start + MARKER.len()..];
    let close = after_marker.find(']')?;
    let position = Position::from_tag(&after_marker[..close])?;

    // Only a dash introduces a reason; trailing text without one is ignored.
    let rest = &after_marker[close + 1..];
    let line = rest.lines().next().unwrap_or("").trim_start();
    let reason = line
        .strip_prefix(['-', '–', '—'])
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string);
    Some((position, reason))
}
