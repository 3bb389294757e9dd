//! Configuration management for stressrig
//!
//! A stress configuration is a JSON document (comments allowed) that maps
//! logical image names to cluster resources, declares named test suites as
//! ordered lists of action option bags, and tunes the polling, log matching
//! and logging behaviour of a run.

pub mod error;
pub mod jsonc;
pub mod loader;
pub mod options;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;
pub use options::{ActionOptions, OptionError};

// Re-export domain configurations
pub use domains::{
    cluster::ClusterConfig,
    logging::{LogFormat, LogLevel, LoggingConfig},
    run::RunOptions,
    StressConfig,
};

// Re-export utilities
pub use domains::utils::serde_duration;
