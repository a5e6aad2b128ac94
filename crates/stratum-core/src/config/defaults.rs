//! Context defaults applied when the command line does not specify them.

use serde::{Deserialize, Serialize};

use crate::context::ComplianceFramework;

/// Default values for [`crate::ComponentContext`] fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefaultsConfig {
    #[serde(default = "default_environment")]
    pub environment: String,

    #[serde(default)]
    pub compliance_framework: ComplianceFramework,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default = "default_account")]
    pub account: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            compliance_framework: ComplianceFramework::default(),
            region: default_region(),
            account: default_account(),
        }
    }
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_account() -> String {
    "000000000000".to_string()
}
