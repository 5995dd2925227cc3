//! Capability-checked access to a provider's services.

use crate::api::{Feature, ServiceType};
use crate::error::{CloudError, Result};
use crate::traits::{CloudProvider, ComputeService, DatabaseService, StorageService, TaggingService};
use std::sync::Arc;

/// Front door for callers: every service accessor first checks the provider's
/// declared capabilities and returns `ServiceNotSupported` instead of
/// delegating when the service is missing.
///
/// The check runs on every call; nothing is cached.
#[derive(Clone)]
pub struct CloudClient {
    provider: Arc<dyn CloudProvider>,
}

impl CloudClient {
    /// Wrap an owned provider.
    pub fn new(provider: impl CloudProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    /// Wrap a provider that is already shared, such as a simulator handle
    /// also held by the test.
    pub fn from_arc(provider: Arc<dyn CloudProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn CloudProvider> {
        &self.provider
    }

    /// Whether the provider declares `service`.
    pub fn supports(&self, service: ServiceType) -> bool {
        self.provider.supported_services().contains(service)
    }

    /// Whether `feature` is declared along with the service it belongs to.
    pub fn supports_feature(&self, feature: Feature) -> bool {
        self.supports(feature.service()) && self.provider.supported_features().contains(&feature)
    }

    /// `Ok(())` when `service` is declared, `ServiceNotSupported` otherwise.
    pub fn ensure_supported(&self, service: ServiceType) -> Result<()> {
        let supported = self.provider.supported_services();
        if supported.contains(service) {
            return Ok(());
        }
        tracing::warn!(
            provider = %self.provider.name(),
            service = %service,
            supported = %supported,
            "Rejected call to unsupported service"
        );
        let hint = if supported.is_empty() {
            format!("Provider '{}' declares no services", self.provider.name())
        } else {
            format!(
                "Supported services for '{}': {}",
                self.provider.name(),
                supported
            )
        };
        Err(CloudError::service_not_supported(self.provider.name(), service).with_suggestions([hint]))
    }

    /// Compute service, after the capability check.
    pub fn compute(&self) -> Result<Arc<dyn ComputeService>> {
        self.ensure_supported(ServiceType::Compute)?;
        self.provider.compute()
    }

    /// Storage service, after the capability check.
    pub fn storage(&self) -> Result<Arc<dyn StorageService>> {
        self.ensure_supported(ServiceType::Storage)?;
        self.provider.storage()
    }

    /// Database service, after the capability check.
    pub fn database(&self) -> Result<Arc<dyn DatabaseService>> {
        self.ensure_supported(ServiceType::Database)?;
        self.provider.database()
    }

    /// Tagging hangs off compute and is guarded the same way: compute must be
    /// declared and [`Feature::Tagging`] must be listed.
    ///
    /// A missing feature is `OperationNotSupported`, not `ServiceNotSupported`.
    pub fn tagging(&self) -> Result<Arc<dyn TaggingService>> {
        let compute = self.compute()?;
        let not_supported = || {
            CloudError::operation_not_supported(
                self.provider.name(),
                ServiceType::Compute.as_str(),
                Feature::Tagging.to_string(),
            )
        };
        if !self.provider.supported_features().contains(&Feature::Tagging) {
            return Err(not_supported());
        }
        compute.tagging().ok_or_else(not_supported)
    }
}

impl std::fmt::Debug for CloudClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudClient")
            .field("provider", &self.provider.name())
            .field("region", &self.provider.region())
            .finish()
    }
}
