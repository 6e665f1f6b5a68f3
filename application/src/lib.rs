//! Application layer for the concord multi-agent discussion system.
//!
//! Holds the ports (interfaces to the outside world), the message
//! router, the resilience machinery, and the discussion use case.
//! Depends only on `concord-domain`; adapters implementing the ports
//! live in `concord-infrastructure`.

pub mod ports;
pub mod resilience;
pub mod router;
pub mod use_cases;

pub use ports::{AgentExecutor, AgentReply, DiscussionProgress, ExecutionError, NoProgress};
pub use resilience::{
    calculate_backoff, classify_error, classify_into_error, execute_with_retry,
    execute_with_retry_notify, ErrorKind, FailedQuestion, FailedQuestionTracker, RateLimitConfig,
    RateLimiter,
};
pub use router::{
    MessageFilter, MessageRouter, MessageStatus, ReceiveOptions, RoutedMessage, RouterStats,
    SendOptions, BROADCAST,
};
pub use use_cases::{DiscussionEngine, DiscussionError, DiscussionInput};
