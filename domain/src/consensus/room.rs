//! Discussion rooms: topic, participants, and lifecycle state.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::round::Contribution;
use crate::agent::Participant;
use crate::util::current_timestamp_ms;

/// Lifecycle of a discussion room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    /// Accepting contributions.
    Open,
    /// A round is being collected.
    Voting,
    /// Closed with agreement.
    Consensus,
    /// Closed after exhausting rounds without agreement.
    Deadlock,
    /// Closed by the caller.
    Closed,
}

impl RoomStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RoomStatus::Consensus | RoomStatus::Deadlock | RoomStatus::Closed
        )
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomStatus::Open => "open",
            RoomStatus::Voting => "voting",
            RoomStatus::Consensus => "consensus",
            RoomStatus::Deadlock => "deadlock",
            RoomStatus::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// A discussion in progress. The transcript accumulates every
/// contribution across rounds in submission order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscussionRoom {
    pub id: Uuid,
    pub topic: String,
    pub participants: Vec<Participant>,
    pub moderator: String,
    pub current_round: usize,
    pub max_rounds: usize,
    /// Fraction of voting participants that must be supportive. The
    /// current rule is unanimity; the field is kept for threshold-based
    /// voting outside the round flow.
    pub consensus_threshold: f64,
    pub transcript: Vec<Contribution>,
    pub status: RoomStatus,
    pub decision: Option<String>,
    pub created_at_ms: u64,
    pub closed_at_ms: Option<u64>,
}

impl DiscussionRoom {
    pub fn new(
        topic: impl Into<String>,
        participants: Vec<Participant>,
        moderator: impl Into<String>,
        max_rounds: usize,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            participants,
            moderator: moderator.into(),
            current_round: 0,
            max_rounds,
            consensus_threshold: 1.0,
            transcript: Vec::new(),
            status: RoomStatus::Open,
            decision: None,
            created_at_ms: current_timestamp_ms(),
            closed_at_ms: None,
        }
    }

    /// Participants that actually take part, in configured order.
    pub fn active_participants(&self) -> Vec<&Participant> {
        self.participants.iter().filter(|p| p.enabled).collect()
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Close the room with a final status and optional decision text.
    pub fn close(&mut self, status: RoomStatus, decision: Option<String>) {
        self.status = status;
        self.decision = decision;
        self.closed_at_ms = Some(current_timestamp_ms());
    }
}
