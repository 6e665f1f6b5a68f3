//! Final discussion outcome and markdown rendering.

use serde::{Deserialize, Serialize};

use super::extract::{extract_action_items, ActionItem};
use super::round::Round;
use crate::agent::Participant;

/// Outcome of a full discussion, aggregated over all rounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub topic: String,
    pub rounds: Vec<Round>,
    pub consensus_reached: bool,
    pub final_summary: String,
    pub action_items: Vec<ActionItem>,
    pub all_conditions: Vec<String>,
    pub all_concerns: Vec<String>,
    pub participants: Vec<Participant>,
    pub duration_ms: u64,
}

impl ConsensusResult {
    /// Aggregate rounds into a result. Conditions and concerns are
    /// collected across rounds with duplicates removed in first-seen
    /// order; action items come from the final summary's checklist.
    pub fn from_rounds(
        topic: impl Into<String>,
        rounds: Vec<Round>,
        final_summary: String,
        participants: Vec<Participant>,
        duration_ms: u64,
    ) -> Self {
        let consensus_reached = rounds.last().is_some_and(|r| r.consensus_reached);
        let all_conditions = dedup(rounds.iter().flat_map(|r| r.conditions.iter()));
        let all_concerns = dedup(rounds.iter().flat_map(|r| r.concerns.iter()));
        let action_items = extract_action_items(&final_summary);

        Self {
            topic: topic.into(),
            rounds,
            consensus_reached,
            final_summary,
            action_items,
            all_conditions,
            all_concerns,
            participants,
            duration_ms,
        }
    }

    pub fn total_rounds(&self) -> usize {
        self.rounds.len()
    }

    /// Render the discussion as a markdown report. The output is
    /// deterministic for a given result.
    pub fn render_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# Discussion: {}\n\n", self.topic));

        let status = if self.consensus_reached {
            format!("Consensus reached after {} round(s)", self.total_rounds())
        } else {
            format!("No consensus after {} round(s)", self.total_rounds())
        };
        out.push_str(&format!("**Status:** {status}\n\n"));

        for round in &self.rounds {
            out.push_str(&format!("## Round {}\n\n", round.index + 1));
            out.push_str(&format!("Positions: {}\n\n", round.tally()));

            for contribution in &round.contributions {
                out.push_str(&format!(
                    "### {} ({}) — {}\n\n",
                    contribution.agent_name, contribution.role, contribution.position
                ));
                out.push_str(contribution.content.trim());
                out.push_str("\n\n");
            }

            if !round.objections.is_empty() {
                out.push_str("#### Objections\n\n");
                for objection in &round.objections {
                    out.push_str(&format!("- {objection}\n"));
                }
                out.push('\n');
            }

            if !round.concerns.is_empty() {
                out.push_str("#### Concerns\n\n");
                for concern in &round.concerns {
                    out.push_str(&format!("- {concern}\n"));
                }
                out.push('\n');
            }
        }

        if !self.all_conditions.is_empty() {
            out.push_str("## Conditions\n\n");
            for condition in &self.all_conditions {
                out.push_str(&format!("- {condition}\n"));
            }
            out.push('\n');
        }

        out.push_str("## Summary\n\n");
        out.push_str(self.final_summary.trim());
        out.push('\n');

        if !self.action_items.is_empty() {
            out.push_str("\n## Action Items\n\n");
            for item in &self.action_items {
                match &item.assignee {
                    Some(assignee) => {
                        out.push_str(&format!("- [ ] {} (assigned: {})\n", item.task, assignee))
                    }
                    None => out.push_str(&format!("- [ ] {}\n", item.task)),
                }
            }
        }

        out
    }
}

fn dedup<'a>(items: impl Iterator<Item = &'a String>) -> Vec<String> {
    let mut seen = Vec::new();
    for item in items {
        if !seen.contains(item) {
            seen.push(item.clone());
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::position::Position;
    use crate::consensus::round::{evaluate_round, Contribution};

    fn simple_round(index: usize, positions: &[(&str, Position)]) -> Round {
        evaluate_round(
            index,
            positions
                .iter()
                .map(|(name, p)| Contribution::new(*name, *name, "tester", "content", *p))
                .collect(),
        )
    }

    #[test]
    fn consensus_taken_from_final_round() {
        let rounds = vec![
            simple_round(0, &[("a", Position::Proposal), ("b", Position::Objection)]),
            simple_round(1, &[("a", Position::Proposal), ("b", Position::Support)]),
        ];
        let result =
            ConsensusResult::from_rounds("topic", rounds, "done".into(), Vec::new(), 10);
        assert!(result.consensus_reached);
        assert_eq!(result.total_rounds(), 2);
    }

    #[test]
    fn action_items_come_from_summary() {
        let summary = "We agreed.\n- [ ] migrate schema (assigned: coder)\n- [ ] notify ops";
        let result = ConsensusResult::from_rounds(
            "topic",
            vec![simple_round(0, &[("a", Position::Proposal), ("b", Position::Support)])],
            summary.into(),
            Vec::new(),
            10,
        );
        assert_eq!(result.action_items.len(), 2);
        assert_eq!(result.action_items[0].assignee.as_deref(), Some("coder"));
    }

    #[test]
    fn markdown_is_deterministic_and_ordered() {
        let rounds = vec![simple_round(
            0,
            &[
                ("alpha", Position::Proposal),
                ("beta", Position::Support),
                ("gamma", Position::Concern),
            ],
        )];
        let result = ConsensusResult::from_rounds(
            "Adopt feature flags",
            rounds,
            "Wrap-up.".into(),
            Vec::new(),
            10,
        );
        let md = result.render_markdown();
        let md_again = result.render_markdown();
        assert_eq!(md, md_again);

        assert!(md.starts_with("# Discussion: Adopt feature flags\n"));
        assert!(md.contains("No consensus after 1 round(s)"));
        assert!(md.contains("Positions: 1 PROPOSAL, 1 SUPPORT, 1 CONCERN"));
        // contributions stay in submission order
        let alpha = md.find("### alpha").unwrap();
        let beta = md.find("### beta").unwrap();
        let gamma = md.find("### gamma").unwrap();
        assert!(alpha < beta && beta < gamma);
        assert!(md.contains("#### Concerns"));
        assert!(!md.contains("#### Objections"));
    }

    #[test]
    fn duplicate_conditions_collapse() {
        let mut r1 = simple_round(0, &[("a", Position::Proposal)]);
        r1.conditions = vec!["b: add tests".into(), "b: add tests".into()];
        let result =
            ConsensusResult::from_rounds("t", vec![r1], String::new(), Vec::new(), 0);
        assert_eq!(result.all_conditions, vec!["b: add tests"]);
    }
}
