//! Discussion rounds and the consensus rule.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::extract::extract_conditions;
use super::position::Position;
use crate::util::current_timestamp_ms;

/// One agent's submission within a round.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    pub agent_id: String,
    pub agent_name: String,
    pub role: String,
    pub content: String,
    pub position: Position,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_reason: Option<String>,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    pub timestamp_ms: u64,
}

impl Contribution {
    pub fn new(
        agent_id: impl Into<String>,
        agent_name: impl Into<String>,
        role: impl Into<String>,
        content: impl Into<String>,
        position: Position,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_name: agent_name.into(),
            role: role.into(),
            content: content.into(),
            position,
            position_reason: None,
            duration_ms: 0,
            model: None,
            provider: None,
            timestamp_ms: current_timestamp_ms(),
        }
    }

    pub fn with_reason(mut self, reason: Option<String>) -> Self {
        self.position_reason = reason;
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    pub fn with_source(mut self, model: impl Into<String>, provider: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self.provider = Some(provider.into());
        self
    }
}

/// An evaluated round: contributions in submission order plus derived
/// tallies, objections, concerns, and conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Round {
    pub index: usize,
    pub contributions: Vec<Contribution>,
    pub position_counts: BTreeMap<Position, usize>,
    pub consensus_reached: bool,
    pub objections: Vec<String>,
    pub concerns: Vec<String>,
    pub conditions: Vec<String>,
}

/// Evaluate a completed round.
///
/// Consensus requires a non-empty set of voting contributions (everything
/// except the proposal itself), zero objections among them, and every
/// vote being supportive. A lone concern blocks consensus.
pub fn evaluate_round(index: usize, contributions: Vec<Contribution>) -> Round {
    let mut position_counts: BTreeMap<Position, usize> = BTreeMap::new();
    let mut objections = Vec::new();
    let mut concerns = Vec::new();
    let mut conditions = Vec::new();

    for contribution in &contributions {
        *position_counts.entry(contribution.position).or_insert(0) += 1;
        match contribution.position {
            Position::Objection => objections.push(format!(
                "{}: {}",
                contribution.agent_name,
                contribution
                    .position_reason
                    .as_deref()
                    .unwrap_or("No reason given")
            )),
            Position::Concern => concerns.push(format!(
                "{}: {}",
                contribution.agent_name,
                contribution
                    .position_reason
                    .as_deref()
                    .unwrap_or("Unspecified concern")
            )),
            Position::SupportWithConditions => {
                for condition in extract_conditions(&contribution.content) {
                    conditions.push(format!("{}: {}", contribution.agent_name, condition));
                }
                if let Some(reason) = &contribution.position_reason {
                    conditions.push(format!("{}: {}", contribution.agent_name, reason));
                }
            }
            _ => {}
        }
    }

    let voting: Vec<_> = contributions
        .iter()
        .filter(|c| c.position.is_voting())
        .collect();
    let consensus_reached = !voting.is_empty()
        && objections.is_empty()
        && voting.iter().all(|c| c.position.is_supportive());

    Round {
        index,
        contributions,
        position_counts,
        consensus_reached,
        objections,
        concerns,
        conditions,
    }
}

impl Round {
    /// Human-readable tally, e.g. `1 PROPOSAL, 2 SUPPORT, 1 CONCERN`.
    pub fn tally(&self) -> String {
        self.position_counts
            .iter()
            .map(|(position, count)| format!("{count} {position}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(name: &str, position: Position) -> Contribution {
        Contribution::new(name, name, "tester", "content", position)
    }

    #[test]
    fn unanimous_support_reaches_consensus() {
        let round = evaluate_round(
            0,
            vec![
                contribution("a", Position::Proposal),
                contribution("b", Position::Support),
                contribution("c", Position::SupportWithConditions),
            ],
        );
        assert!(round.consensus_reached);
        assert_eq!(round.position_counts[&Position::Support], 1);
    }

    #[test]
    fn single_objection_blocks_consensus() {
        let round = evaluate_round(
            0,
            vec![
                contribution("a", Position::Proposal),
                contribution("b", Position::Support),
                contribution("c", Position::Objection).with_reason(Some("too risky".into())),
            ],
        );
        assert!(!round.consensus_reached);
        assert_eq!(round.objections, vec!["c: too risky"]);
    }

    #[test]
    fn single_concern_blocks_consensus() {
        let round = evaluate_round(
            0,
            vec![
                contribution("a", Position::Proposal),
                contribution("b", Position::Support),
                contribution("c", Position::Concern),
            ],
        );
        assert!(!round.consensus_reached);
        assert_eq!(round.concerns, vec!["c: Unspecified concern"]);
    }

    #[test]
    fn proposal_alone_is_not_consensus() {
        let round = evaluate_round(0, vec![contribution("a", Position::Proposal)]);
        assert!(!round.consensus_reached);
    }

    #[test]
    fn empty_round_is_not_consensus() {
        assert!(!evaluate_round(0, Vec::new()).consensus_reached);
    }

    #[test]
    fn conditions_are_attributed() {
        let mut c = contribution("b", Position::SupportWithConditions);
        c.content = "Fine, provided that we add a rollback plan.".to_string();
        let round = evaluate_round(0, vec![contribution("a", Position::Proposal), c]);
        assert!(round.consensus_reached);
        assert_eq!(round.conditions, vec!["b: we add a rollback plan"]);
    }

    #[test]
    fn tally_lists_counts_in_position_order() {
        let round = evaluate_round(
            0,
            vec![
                contribution("a", Position::Proposal),
                contribution("b", Position::Support),
                contribution("c", Position::Support),
                contribution("d", Position::Concern),
            ],
        );
        assert_eq!(round.tally(), "1 PROPOSAL, 2 SUPPORT, 1 CONCERN");
    }
}
