//! Domain-specific configuration modules

pub mod cluster;
pub mod logging;
pub mod run;
pub mod utils;

use crate::error::ConfigResult;
use crate::options::ActionOptions;
use crate::validation::{validate_required_string, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A complete stress test document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct StressConfig {
    /// Logical image name to cluster resource identifier
    pub images: BTreeMap<String, String>,

    /// Named suites, each an ordered list of action option bags.
    /// Suites run in ascending name order.
    pub tests: BTreeMap<String, Vec<ActionOptions>>,

    /// Polling and log matching options
    pub options: run::RunOptions,

    /// Cluster CLI configuration
    pub cluster: cluster::ClusterConfig,

    /// Logging configuration
    pub logging: logging::LoggingConfig,
}

impl StressConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.validate()?;
        self.options.validate()?;
        self.cluster.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

impl Validatable for StressConfig {
    fn validate(&self) -> ConfigResult<()> {
        for (name, id) in &self.images {
            validate_required_string(name, "image name", self.domain_name())?;
            validate_required_string(id, &format!("image {:?}", name), self.domain_name())?;
        }

        for (name, actions) in &self.tests {
            validate_required_string(name, "test name", self.domain_name())?;
            if actions.is_empty() {
                return Err(self.validation_error(format!("test {:?} has no actions", name)));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "document"
    }
}
