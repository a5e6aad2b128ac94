//! The environment-scoped context a resolution run executes in.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Deployment compliance tier. Selects a static configuration overlay.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ComplianceFramework {
    #[default]
    Commercial,
    FedrampModerate,
    FedrampHigh,
}

impl ComplianceFramework {
    pub const ALL: [ComplianceFramework; 3] = [
        ComplianceFramework::Commercial,
        ComplianceFramework::FedrampModerate,
        ComplianceFramework::FedrampHigh,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComplianceFramework::Commercial => "commercial",
            ComplianceFramework::FedrampModerate => "fedramp-moderate",
            ComplianceFramework::FedrampHigh => "fedramp-high",
        }
    }

    pub fn is_fedramp(&self) -> bool {
        !matches!(self, ComplianceFramework::Commercial)
    }
}

impl fmt::Display for ComplianceFramework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComplianceFramework {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|framework| framework.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown compliance framework '{}' (expected one of: commercial, fedramp-moderate, fedramp-high)",
                    s
                )
            })
    }
}

/// Read-only execution context shared by every stage of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentContext {
    pub service_name: String,
    pub environment: String,
    pub compliance_framework: ComplianceFramework,
    pub region: String,
    pub account: String,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl ComponentContext {
    pub fn new(service_name: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            environment: environment.into(),
            compliance_framework: ComplianceFramework::default(),
            region: "us-east-1".to_string(),
            account: "000000000000".to_string(),
            tags: BTreeMap::new(),
        }
    }

    pub fn with_framework(mut self, framework: ComplianceFramework) -> Self {
        self.compliance_framework = framework;
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    pub fn with_account(mut self, account: impl Into<String>) -> Self {
        self.account = account.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framework_round_trips_through_strings() {
        for framework in ComplianceFramework::ALL {
            assert_eq!(framework.as_str().parse::<ComplianceFramework>(), Ok(framework));
        }
        assert!("fedramp".parse::<ComplianceFramework>().is_err());
    }

    #[test]
    fn framework_serializes_kebab_case() {
        let json = serde_json::to_string(&ComplianceFramework::FedrampModerate).unwrap();
        assert_eq!(json, "\"fedramp-moderate\"");
    }
}
