//! Public value types shared by providers, the simulator, and callers:
//! service identifiers, capability sets, resource configs and records, and
//! the retry policy.

use crate::error::{CloudError, Result};
use crate::reliability::Backoff;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// A top-level cloud service family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceType {
    /// Virtual machines.
    Compute,
    /// Buckets and objects.
    Storage,
    /// Managed database instances.
    Database,
}

impl ServiceType {
    pub const ALL: [ServiceType; 3] = [Self::Compute, Self::Storage, Self::Database];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compute => "compute",
            Self::Storage => "storage",
            Self::Database => "database",
        }
    }
}

impl std::fmt::Display for ServiceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional sub-capabilities nested under a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// Resource tagging on compute resources.
    Tagging,
}

impl Feature {
    /// The service this feature hangs off.
    pub fn service(&self) -> ServiceType {
        match self {
            Self::Tagging => ServiceType::Compute,
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tagging => write!(f, "tagging"),
        }
    }
}

/// Ordered, duplicate-free set of services a provider declares.
///
/// Insertion order is preserved so listings and error messages are stable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ServiceType>", into = "Vec<ServiceType>")]
pub struct CapabilitySet {
    services: Vec<ServiceType>,
}

impl CapabilitySet {
    pub fn new(services: impl IntoIterator<Item = ServiceType>) -> Self {
        services.into_iter().collect()
    }

    /// Every service family.
    pub fn all() -> Self {
        Self::new(ServiceType::ALL)
    }

    pub fn insert(&mut self, service: ServiceType) -> bool {
        if self.contains(service) {
            return false;
        }
        self.services.push(service);
        true
    }

    pub fn contains(&self, service: ServiceType) -> bool {
        self.services.contains(&service)
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = ServiceType> + '_ {
        self.services.iter().copied()
    }
}

impl FromIterator<ServiceType> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = ServiceType>>(iter: I) -> Self {
        let mut set = Self::default();
        for service in iter {
            set.insert(service);
        }
        set
    }
}

impl From<Vec<ServiceType>> for CapabilitySet {
    fn from(services: Vec<ServiceType>) -> Self {
        services.into_iter().collect()
    }
}

impl From<CapabilitySet> for Vec<ServiceType> {
    fn from(set: CapabilitySet) -> Self {
        set.services
    }
}

impl std::fmt::Display for CapabilitySet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, service) in self.services.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{service}")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Compute
// ---------------------------------------------------------------------------

/// Parameters for creating a virtual machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmConfig {
    pub name: String,
    pub image_id: String,
    pub instance_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_groups: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// Lifecycle state of a virtual machine.
///
/// `Pending -> Running <-> Stopped -> Terminated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmState {
    Pending,
    Running,
    Stopped,
    Terminated,
}

impl std::fmt::Display for VmState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Terminated => write!(f, "terminated"),
        }
    }
}

/// A virtual machine as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vm {
    pub id: String,
    pub name: String,
    pub state: VmState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_ip: Option<String>,
    pub launch_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// One tag on one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTag {
    pub resource_id: String,
    pub resource_type: String,
    pub key: String,
    pub value: String,
}

/// Filter for [`TaggingService::list_tags`](crate::traits::TaggingService::list_tags).
/// Empty lists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    #[serde(default)]
    pub resource_ids: Vec<String>,
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub values: Vec<String>,
}

impl TagFilter {
    pub fn matches(&self, tag: &ResourceTag) -> bool {
        (self.resource_ids.is_empty() || self.resource_ids.contains(&tag.resource_id))
            && (self.keys.is_empty() || self.keys.contains(&tag.key))
            && (self.values.is_empty() || self.values.contains(&tag.value))
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Parameters for creating a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default)]
    pub versioning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<String>,
}

/// Metadata for one stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
    pub etag: String,
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// Parameters for creating a managed database instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbConfig {
    pub name: String,
    pub engine: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine_version: Option<String>,
    pub instance_class: String,
    pub allocated_storage_gb: u32,
    pub master_username: String,
    #[serde(default, skip_serializing)]
    pub master_password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vpc_security_groups: Vec<String>,
}

/// Status of a managed database instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DbStatus {
    Creating,
    Available,
    Deleting,
}

impl std::fmt::Display for DbStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Available => write!(f, "available"),
            Self::Deleting => write!(f, "deleting"),
        }
    }
}

/// A managed database instance as reported by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbInstance {
    pub id: String,
    pub name: String,
    pub engine: String,
    pub engine_version: String,
    pub status: DbStatus,
    pub endpoint: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Retry policy
// ---------------------------------------------------------------------------

/// Exponential-backoff parameters for [`RetryExecutor`](crate::reliability::RetryExecutor).
///
/// # Example JSON
///
/// ```json
/// { "max_attempts": 5, "initial_delay_ms": 50, "max_delay_ms": 2000, "backoff_factor": 2.0 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first call. At least 1.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay, in milliseconds.
    pub max_delay_ms: u64,
    /// Multiplier applied to the delay after each retryable failure. At least 1.0.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 100,
            max_delay_ms: 5_000,
            backoff_factor: 2.0,
        }
    }
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Delays slept before attempts 2, 3, ... in order.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(self.initial_delay(), self.max_delay(), self.backoff_factor)
    }

    /// Validate invariants: `max_attempts >= 1`, finite `backoff_factor >= 1`,
    /// and `initial_delay_ms <= max_delay_ms`.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(policy_error("max_attempts", "must be at least 1"));
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(policy_error(
                "backoff_factor",
                &format!("must be a finite number >= 1.0, got {}", self.backoff_factor),
            ));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(policy_error(
                "initial_delay_ms",
                &format!(
                    "{}ms exceeds max_delay_ms {}ms",
                    self.initial_delay_ms, self.max_delay_ms
                ),
            ));
        }
        Ok(())
    }

    /// Parse a `RetryPolicy` from a JSON value. Missing fields take defaults.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        let policy: Self = serde_json::from_value(value)
            .map_err(|e| policy_error("retry_policy", &format!("invalid JSON: {e}")))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Parse a `RetryPolicy` from a JSON string.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let policy: Self = serde_json::from_str(s)
            .map_err(|e| policy_error("retry_policy", &format!("invalid JSON: {e}")))?;
        policy.validate()?;
        Ok(policy)
    }

    /// Read and parse a `RetryPolicy` from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            policy_error(
                "retry_policy",
                &format!("failed to read '{}': {e}", path.display()),
            )
        })?;
        Self::from_json_str(&contents)
    }
}

fn policy_error(field: &str, reason: &str) -> CloudError {
    CloudError::invalid_config("", "", field, reason)
}
