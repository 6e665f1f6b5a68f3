//! Prompt templates for discussion rounds.

use super::round::{Contribution, Round};
use crate::util::truncate_chars;

const PROPOSAL_PREVIEW_CHARS: usize = 500;

/// Prompt construction for proposers, responders, and the closing summary.
pub struct DiscussionPrompt;

impl DiscussionPrompt {
    /// Rules of engagement appended to every round prompt.
    pub fn consensus_protocol() -> &'static str {
        "End your response with exactly one position tag on its own line:\n\
         [POSITION: SUPPORT] - brief reason\n\
         [POSITION: SUPPORT_WITH_CONDITIONS] - list your conditions\n\
         [POSITION: CONCERN] - what worries you\n\
         [POSITION: OBJECTION] - why you cannot accept the proposal\n\
         Mark hard requirements as `[CONDITION]: ...` on their own line."
    }

    /// Prompt for the proposer. The first round asks for a fresh
    /// proposal; later rounds ask for a revision addressing the previous
    /// round's objections, concerns, and conditions.
    pub fn proposer(topic: &str, round_index: usize, previous: Option<&Round>, directive: &str) -> String {
        let mut parts = vec![format!("Routing: {directive}")];

        match previous {
            None => {
                parts.push(format!(
                    "You are the proposer in a team discussion.\n\
                     Topic: {topic}\n\n\
                     Present a concrete proposal the team can evaluate. Be specific\n\
                     about approach, scope, and trade-offs."
                ));
            }
            Some(round) => {
                parts.push(format!(
                    "You are the proposer in round {} of a team discussion.\n\
                     Topic: {topic}\n\n\
                     Your previous proposal did not reach consensus. Revise it to\n\
                     address the feedback below, keeping what was uncontested.",
                    round_index + 1
                ));
                if !round.objections.is_empty() {
                    parts.push(format!("Objections:\n{}", bullet_list(&round.objections)));
                }
                if !round.concerns.is_empty() {
                    parts.push(format!("Concerns:\n{}", bullet_list(&round.concerns)));
                }
                if !round.conditions.is_empty() {
                    parts.push(format!("Conditions:\n{}", bullet_list(&round.conditions)));
                }
                let previous_text: Vec<String> = round
                    .contributions
                    .iter()
                    .map(|c| {
                        format!(
                            "{} ({}): {}",
                            c.agent_name,
                            c.position,
                            truncate_chars(&c.content, PROPOSAL_PREVIEW_CHARS)
                        )
                    })
                    .collect();
                parts.push(format!("Previous round:\n{}", previous_text.join("\n\n")));
            }
        }

        parts.push(format!(
            "Start your response with a clear proposal, then end with\n\
             [POSITION: PROPOSAL] - one-line summary."
        ));
        parts.join("\n\n")
    }

    /// Prompt for a responder. Sees the full text of every contribution
    /// already made in the current round.
    pub fn responder(
        topic: &str,
        round_index: usize,
        proposal: &Contribution,
        earlier: &[Contribution],
        role: &str,
        directive: &str,
    ) -> String {
        let mut parts = vec![format!("Routing: {directive}")];

        parts.push(format!(
            "You are the {role} in round {} of a team discussion.\n\
             Topic: {topic}\n\n\
             Proposal from {}:\n{}",
            round_index + 1,
            proposal.agent_name,
            proposal.content
        ));

        if !earlier.is_empty() {
            let responses: Vec<String> = earlier
                .iter()
                .map(|c| format!("{} ({}): {}", c.agent_name, c.position, c.content))
                .collect();
            parts.push(format!(
                "Responses so far this round:\n{}",
                responses.join("\n\n")
            ));
        }

        parts.push(format!(
            "Evaluate the proposal from your perspective as {role}.\n\n{}",
            Self::consensus_protocol()
        ));
        parts.join("\n\n")
    }

    /// Prompt for the closing summary after the final round.
    pub fn summary(topic: &str, final_round: &Round, consensus_reached: bool) -> String {
        let outcome = if consensus_reached {
            "The team reached consensus."
        } else {
            "The team did not reach consensus."
        };
        let contributions: Vec<String> = final_round
            .contributions
            .iter()
            .map(|c| {
                format!(
                    "{} ({}): {}",
                    c.agent_name,
                    c.position,
                    truncate_chars(&c.content, PROPOSAL_PREVIEW_CHARS)
                )
            })
            .collect();
        format!(
            "Summarize the discussion below.\n\
             Topic: {topic}\n\
             {outcome}\n\n\
             Final round:\n{}\n\n\
             Write a short summary of the decision (or the blocking points),\n\
             then list concrete next steps as `- [ ] task (assigned: name)`\n\
             checklist lines.",
            contributions.join("\n\n")
        )
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {item}"))
        .collect::<Vec<_>>()
        .join("\n")
}
