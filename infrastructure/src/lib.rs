//! Infrastructure layer for the concord multi-agent discussion system.
//!
//! Adapters behind the application ports: provider subprocess/mock
//! adapters, the resilient executor, configuration loading, and the
//! wiring that assembles an engine from a config file.

pub mod bootstrap;
pub mod config;
pub mod providers;

pub use bootstrap::{engine_from_config, executor_from_config};
pub use config::{ConfigLoader, FileConfig};
pub use providers::{
    CliProviderAdapter, MockProviderAdapter, ProviderAdapter, ProviderKind, ResilientExecutor,
};
