//! Progress notification port
//!
//! Defines the interface for reporting progress during a discussion.

use concord_domain::{Contribution, Participant, Round};

/// Callback for progress updates while a discussion runs
///
/// Implementations live in the presentation layer and can display
/// progress in various ways (console, web UI, etc.)
pub trait DiscussionProgress: Send + Sync {
    /// Called when a round starts collecting contributions.
    fn on_round_start(&self, round_index: usize, total_participants: usize);

    /// Called when a participant's contribution (or failure placeholder)
    /// has been recorded.
    fn on_contribution(&self, participant: &Participant, contribution: &Contribution);

    /// Called once a round has been evaluated.
    fn on_round_complete(&self, round: &Round);
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl DiscussionProgress for NoProgress {
    fn on_round_start(&self, _round_index: usize, _total_participants: usize) {}
    fn on_contribution(&self, _participant: &Participant, _contribution: &Contribution) {}
    fn on_round_complete(&self, _round: &Round) {}
}
