//! Use cases: the orchestration entry points of the application layer.

pub mod run_discussion;

pub use run_discussion::{DiscussionEngine, DiscussionError, DiscussionInput};
