//! Cluster command line configuration

use serde::{Deserialize, Serialize};
use crate::validation::{Validatable, validate_required_string};
use crate::error::ConfigResult;

/// How the cluster CLI is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
pub struct ClusterConfig {
    /// Cluster CLI binary
    pub binary: String,

    /// Arguments added to every invocation (e.g. `["-n", "stress"]`)
    pub args: Vec<String>,

    /// Resource kind prefix used to address resources (`dc/<id>`)
    pub kind: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            binary: "oc".to_string(),
            args: Vec::new(),
            kind: "dc".to_string(),
        }
    }
}

impl Validatable for ClusterConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_required_string(&self.binary, "Binary", self.domain_name())?;
        validate_required_string(&self.kind, "Kind", self.domain_name())?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "cluster"
    }
}
