//! Logging infrastructure for stressrig
//!
//! This crate provides:
//! - Global `tracing` subscriber initialisation from configuration
//! - [`TracingEventSink`], which renders run events as structured tracing events
//! - [`RecordingSink`], which keeps events in memory for inspection

pub mod init;
pub mod sink;

// Re-export main types for convenience
pub use init::{init_logging, init_simple_tracing};
pub use sink::{RecordingSink, TracingEventSink};
