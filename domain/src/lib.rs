//! Domain layer for the concord multi-agent discussion system.
//!
//! Pure types and logic with no I/O: the AICP wire protocol, the
//! shorthand notation and dictionary compressor, and the round-based
//! consensus model. Async orchestration lives in `concord-application`,
//! adapters in `concord-infrastructure`.

pub mod agent;
pub mod consensus;
pub mod protocol;
pub mod util;

pub use agent::Participant;
pub use consensus::{
    evaluate_round, extract_position, ConsensusResult, Contribution, DiscussionPrompt,
    DiscussionRoom, Position, RoomStatus, Round,
};
pub use protocol::{
    DictionaryCompressor, Message, MessageFlags, MessageHeader, MessageType, Priority,
    ProtocolError, ShorthandMessage,
};
