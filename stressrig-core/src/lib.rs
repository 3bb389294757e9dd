//! Core domain types for stressrig
//!
//! This crate contains the leaf building blocks shared by every other
//! stressrig crate: whitespace field splitting for tabular status output,
//! substring filters over raw log lines, the match counters aggregated per
//! resource, and the structured event stream the engine reports through.

pub mod event;
pub mod filter;
pub mod split;
pub mod status;
pub mod types;

// Re-export commonly used types at the crate root
pub use event::{EventSink, NullSink, RunEvent};
pub use filter::{slurp, SubstringFilter};
pub use split::{fields, split_fields};
pub use status::{MatchBatch, MatchStatus, MonitorState};
pub use types::{ResourceId, ResourceMap};
