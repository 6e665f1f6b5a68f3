//! Configuration: raw TOML types and the multi-source loader.

pub mod file_config;
pub mod loader;

pub use file_config::{
    ConfigValidationError, FileAgentConfig, FileConfig, FileDiscussionConfig, FileRateLimitConfig,
};
pub use loader::ConfigLoader;
