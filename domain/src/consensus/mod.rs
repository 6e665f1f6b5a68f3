//! Round-based discussion and consensus evaluation.

pub mod extract;
pub mod position;
pub mod prompt;
pub mod result;
pub mod room;
pub mod round;

pub use extract::{extract_action_items, extract_conditions, ActionItem};
pub use position::{extract_position, Position, POSITION_UNCLEAR};
pub use prompt::DiscussionPrompt;
pub use result::ConsensusResult;
pub use room::{DiscussionRoom, RoomStatus};
pub use round::{evaluate_round, Contribution, Round};
