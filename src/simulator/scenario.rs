//! Declarative simulator setup loaded from JSON.

use super::method;
use crate::api::{CapabilitySet, Feature};
use crate::error::{CloudError, ErrorKind, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// An error to inject for one simulated method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectedError {
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

/// JSON description of a [`ResourceSimulator`](super::ResourceSimulator).
///
/// # Example JSON
///
/// ```json
/// {
///   "region": "eu-west-1",
///   "supported_services": ["compute", "storage"],
///   "errors": { "CreateVM": { "kind": "RATE_LIMIT_EXCEEDED", "message": "slow down" } },
///   "delays_ms": { "ListVMs": 250 },
///   "buckets": { "assets": { "logo.txt": "hello" } }
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorScenario {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Defaults to every service when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supported_services: Option<CapabilitySet>,
    pub features: Vec<Feature>,
    pub errors: BTreeMap<String, InjectedError>,
    pub delays_ms: BTreeMap<String, u64>,
    /// Pre-existing buckets: bucket name to object key to UTF-8 content.
    pub buckets: BTreeMap<String, BTreeMap<String, String>>,
}

impl SimulatorScenario {
    /// Validate that every referenced method exists and that the declared
    /// capability set is non-empty.
    pub fn validate(&self) -> Result<()> {
        let unknown = self
            .errors
            .keys()
            .chain(self.delays_ms.keys())
            .find(|m| !method::ALL.contains(&m.as_str()));
        if let Some(name) = unknown {
            return Err(scenario_error(&format!("unknown simulated method '{name}'"))
                .with_suggestions([format!("Known methods: {}", method::ALL.join(", "))]));
        }
        if self.supported_services.as_ref().is_some_and(|s| s.is_empty()) {
            return Err(scenario_error("supported_services must not be empty"));
        }
        Ok(())
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let scenario: Self = serde_json::from_str(s)
            .map_err(|e| scenario_error(&format!("invalid JSON: {e}")))?;
        scenario.validate()?;
        Ok(scenario)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            scenario_error(&format!("failed to read '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&contents)
    }
}

fn scenario_error(reason: &str) -> CloudError {
    CloudError::invalid_config("mock", "", "scenario", reason)
}
