//! Stressrig Execution Engine
//!
//! This crate runs stress test suites against a cluster: the scale and pause
//! actions, convergence checks on the status listing, one log monitor per
//! running resource, and the aggregator that owns the match totals. Cluster
//! access goes through the [`ClusterOps`] trait; [`OcCli`] drives the `oc`
//! command line.

pub mod action;
pub mod aggregate;
pub mod cluster;
pub mod error;
pub mod monitor;
pub mod oc;
pub mod runner;
pub mod status;
pub mod suite;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export main types
pub use action::{Action, ActionContext, PauseAction, ScaleAction};
pub use aggregate::{Aggregator, AggregatorHandles, ResourceReport};
pub use cluster::{ClusterOps, LogStream};
pub use error::{ActionError, BuildError, ClusterError, StreamError};
pub use monitor::{LogMonitor, MonitorConfig, MonitorOutcome, MonitorUpdate};
pub use oc::OcCli;
pub use runner::{ActionReport, RunReport, SuiteReport, TestRunner};
pub use status::{parse_listing, verify_scale, MalformedRow, StatusRow};
pub use suite::{build_suites, resource_map, TestSuite};
