//! Error types for stress test execution

use stressrig_config::OptionError;
use stressrig_core::ResourceId;
use stressrig_resilience::PollError;
use thiserror::Error;

/// Failures of the external cluster operations
#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("cannot start {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} failed with {status}: {output:?}")]
    Exit {
        command: String,
        status: String,
        output: String,
    },

    #[error("I/O error running {command}: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("resource {0} is not known to the cluster")]
    UnknownResource(ResourceId),
}

/// Suite construction errors. Any of these prevents the run from starting.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("invalid action without 'Action' key: {0}")]
    MissingActionKind(OptionError),

    #[error("invalid action type {0}")]
    UnknownAction(String),

    #[error("invalid '{option}' option in '{action}' action: {source}")]
    InvalidOption {
        action: &'static str,
        option: &'static str,
        #[source]
        source: OptionError,
    },

    #[error("invalid 'Pod' option in 'scale' action: image {name} not defined in Images section")]
    UnresolvedResource { name: String },

    #[error("error in test {suite:?}, action {index}: {source}")]
    InSuite {
        suite: String,
        index: usize,
        #[source]
        source: Box<BuildError>,
    },

    #[error("test {0:?} is not defined")]
    UnknownSuite(String),
}

impl BuildError {
    pub(crate) fn in_suite(self, suite: &str, index: usize) -> Self {
        BuildError::InSuite {
            suite: suite.to_string(),
            index,
            source: Box::new(self),
        }
    }

    /// The innermost error, without suite context
    pub fn root(&self) -> &BuildError {
        match self {
            BuildError::InSuite { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Run-time action failures. These are reported and the suite continues.
#[derive(Error, Debug)]
pub enum ActionError {
    #[error("cannot run scale step for {resource}: {source}")]
    Scale {
        resource: ResourceId,
        #[source]
        source: ClusterError,
    },

    #[error("could not satisfy scaling change to {resource}: {source}")]
    Convergence {
        resource: ResourceId,
        #[source]
        source: PollError,
    },
}

impl ActionError {
    /// Short classification used in run reports
    pub fn kind(&self) -> &'static str {
        match self {
            ActionError::Scale { .. } => "scale_failed",
            ActionError::Convergence {
                source: PollError::Exhausted { .. },
                ..
            } => "convergence_retry_exhausted",
            ActionError::Convergence {
                source: PollError::HardFailure { .. },
                ..
            } => "convergence_hard_failure",
            ActionError::Convergence {
                source: PollError::Fetch { .. },
                ..
            } => "status_query_failed",
        }
    }
}

/// Log stream failures, reported through the error channel
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("cannot start log stream on {resource}: {source}")]
    Launch {
        resource: ResourceId,
        #[source]
        source: ClusterError,
    },

    #[error("error reading log stream of {resource}: {source}")]
    Read {
        resource: ResourceId,
        #[source]
        source: std::io::Error,
    },

    #[error("error running log stream on {resource}: {source}")]
    Exit {
        resource: ResourceId,
        #[source]
        source: ClusterError,
    },
}

impl StreamError {
    pub fn resource(&self) -> &ResourceId {
        match self {
            StreamError::Launch { resource, .. }
            | StreamError::Read { resource, .. }
            | StreamError::Exit { resource, .. } => resource,
        }
    }
}
