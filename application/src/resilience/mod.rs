//! Resilience: rate limiting, retry with backoff, and failure tracking.

pub mod failed;
pub mod rate_limit;
pub mod retry;

pub use failed::{FailedQuestion, FailedQuestionTracker, DEFAULT_MAX_FAILED};
pub use rate_limit::{RateLimitConfig, RateLimiter, RateLimiterStats};
pub use retry::{
    calculate_backoff, classify_error, classify_into_error, execute_with_retry,
    execute_with_retry_notify, ErrorKind,
};
