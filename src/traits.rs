//! Core traits that every provider binding (and the simulator) must satisfy.

use crate::api::{
    BucketConfig, CapabilitySet, DbConfig, DbInstance, Feature, ObjectInfo, ResourceTag,
    ServiceType, TagFilter, Vm, VmConfig,
};
use crate::error::{CloudError, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A cloud provider: identity, declared capabilities, and service accessors.
///
/// Accessors for services missing from [`supported_services`](Self::supported_services)
/// return [`ErrorKind::ServiceNotSupported`](crate::error::ErrorKind::ServiceNotSupported).
/// Callers should go through [`CloudClient`](crate::client::CloudClient), which
/// checks the capability set before delegating.
pub trait CloudProvider: Send + Sync {
    /// Provider name (e.g. `"aws"`, `"mock"`).
    fn name(&self) -> &str;

    /// Configured region.
    fn region(&self) -> &str;

    /// Services this provider offers. Non-empty for any usable provider.
    fn supported_services(&self) -> CapabilitySet;

    /// Optional sub-capabilities. Empty by default.
    fn supported_features(&self) -> Vec<Feature> {
        Vec::new()
    }

    /// Compute service handle. `ServiceNotSupported` unless overridden.
    fn compute(&self) -> Result<Arc<dyn ComputeService>> {
        Err(CloudError::service_not_supported(
            self.name(),
            ServiceType::Compute,
        ))
    }

    /// Storage service handle. `ServiceNotSupported` unless overridden.
    fn storage(&self) -> Result<Arc<dyn StorageService>> {
        Err(CloudError::service_not_supported(
            self.name(),
            ServiceType::Storage,
        ))
    }

    /// Database service handle. `ServiceNotSupported` unless overridden.
    fn database(&self) -> Result<Arc<dyn DatabaseService>> {
        Err(CloudError::service_not_supported(
            self.name(),
            ServiceType::Database,
        ))
    }
}

/// Virtual machine lifecycle.
#[async_trait]
pub trait ComputeService: Send + Sync {
    /// Launch a VM. The returned record carries a provider-assigned id.
    ///
    /// Fails with `ResourceConflict` when a VM with the same name exists.
    async fn create_vm(&self, config: &VmConfig) -> Result<Vm>;

    /// All VMs in the provider's region, in no particular order.
    async fn list_vms(&self) -> Result<Vec<Vm>>;

    /// Look up one VM. `ResourceNotFound` for unknown ids.
    async fn get_vm(&self, id: &str) -> Result<Vm>;

    /// Start a stopped VM. Starting a running VM is an error.
    async fn start_vm(&self, id: &str) -> Result<()>;

    /// Stop a running VM. Stopping a stopped VM is an error.
    async fn stop_vm(&self, id: &str) -> Result<()>;

    /// Remove the VM entirely.
    async fn delete_vm(&self, id: &str) -> Result<()>;

    /// Tagging sub-service, when the provider declares [`Feature::Tagging`].
    fn tagging(&self) -> Option<Arc<dyn TaggingService>> {
        None
    }
}

/// Buckets and objects.
#[async_trait]
pub trait StorageService: Send + Sync {
    /// Create a bucket. Names are unique per provider; a duplicate is a
    /// `ResourceConflict`.
    async fn create_bucket(&self, config: &BucketConfig) -> Result<()>;

    /// Bucket names owned by this account.
    async fn list_buckets(&self) -> Result<Vec<String>>;

    /// Delete an empty bucket.
    async fn delete_bucket(&self, name: &str) -> Result<()>;

    /// Write `body` under `key`, replacing any existing object.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Full object body. `ResourceNotFound` when the bucket or key is missing.
    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Object metadata for every key in `bucket`.
    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>>;
}

/// Managed database instances.
#[async_trait]
pub trait DatabaseService: Send + Sync {
    /// Provision an instance. A second instance with the same name is a
    /// `ResourceConflict`.
    async fn create_db(&self, config: &DbConfig) -> Result<DbInstance>;

    async fn list_dbs(&self) -> Result<Vec<DbInstance>>;

    /// Look up one instance. `ResourceNotFound` for unknown ids.
    async fn get_db(&self, id: &str) -> Result<DbInstance>;

    /// Tear down the instance.
    async fn delete_db(&self, id: &str) -> Result<()>;
}

/// Key/value tags on compute resources.
#[async_trait]
pub trait TaggingService: Send + Sync {
    /// Set `tags` on every resource in `resource_ids`, overwriting existing
    /// values for the same keys.
    async fn create_tags(
        &self,
        resource_ids: &[String],
        tags: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Remove `keys` from every listed resource. Missing keys are ignored and
    /// an empty `keys` clears all tags.
    async fn delete_tags(&self, resource_ids: &[String], keys: &[String]) -> Result<()>;

    /// Tags matching `filter`, one entry per resource/key pair.
    async fn list_tags(&self, filter: &TagFilter) -> Result<Vec<ResourceTag>>;
}
