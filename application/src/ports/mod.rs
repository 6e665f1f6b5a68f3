//! Ports: interfaces the application layer depends on.

pub mod agent_executor;
pub mod progress;

pub use agent_executor::{AgentExecutor, AgentReply, ExecutionError};
pub use progress::{DiscussionProgress, NoProgress};
