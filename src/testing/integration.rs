//! Helpers for integration tests that create real (or simulated) resources.
//!
//! [`IntegrationHarness`] creates resources from [`fixtures`](super::fixtures),
//! remembers what it created, and tears everything down in
//! [`cleanup`](IntegrationHarness::cleanup). It also polls for lifecycle
//! transitions and fans operations out concurrently.
//!
//! ```rust
//! use std::sync::Arc;
//! use uni_cloud::simulator::ResourceSimulator;
//! use uni_cloud::testing::IntegrationHarness;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let harness = IntegrationHarness::new(Arc::new(ResourceSimulator::new("us-east-1")));
//! let vm = harness.create_vm("integration-vm").await?;
//! harness.create_bucket("integration-bucket").await?;
//!
//! let failures = harness.cleanup().await;
//! assert!(failures.is_empty());
//! # let _ = vm;
//! # Ok(())
//! # }
//! ```

use super::fixtures;
use crate::api::{DbInstance, DbStatus, Vm, VmState};
use crate::client::CloudClient;
use crate::error::{CloudError, ErrorOrigin, Result};
use crate::traits::CloudProvider;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Ids and names of everything the harness created and has not cleaned up yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackedResources {
    pub vms: Vec<String>,
    pub buckets: Vec<String>,
    pub dbs: Vec<String>,
}

impl TrackedResources {
    pub fn is_empty(&self) -> bool {
        self.vms.is_empty() && self.buckets.is_empty() && self.dbs.is_empty()
    }
}

/// Resource factory with tracked cleanup, state polling, and timing helpers.
pub struct IntegrationHarness {
    client: CloudClient,
    timeout: Duration,
    poll_interval: Duration,
    cleanup: bool,
    tracked: Mutex<TrackedResources>,
}

impl IntegrationHarness {
    /// Harness with cleanup enabled, a five minute wait bound, and a ten second
    /// polling interval.
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            client: CloudClient::from_arc(provider),
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
            cleanup: true,
            tracked: Mutex::new(TrackedResources::default()),
        }
    }

    /// When disabled, [`cleanup`](Self::cleanup) leaves resources in place.
    pub fn with_cleanup(mut self, cleanup: bool) -> Self {
        self.cleanup = cleanup;
        self
    }

    /// Upper bound for the `wait_for_*` helpers.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn client(&self) -> &CloudClient {
        &self.client
    }

    /// Snapshot of what is currently tracked for cleanup.
    pub fn tracked(&self) -> TrackedResources {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TrackedResources> {
        self.tracked.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn origin(&self, service: &str, operation: &str) -> ErrorOrigin {
        ErrorOrigin::new(self.client.provider().name(), service, operation)
    }

    /// Create a VM from [`fixtures::vm_config`] and track it.
    pub async fn create_vm(&self, name: &str) -> Result<Vm> {
        let vm = self
            .client
            .compute()?
            .create_vm(&fixtures::vm_config(name))
            .await?;
        self.lock().vms.push(vm.id.clone());
        Ok(vm)
    }

    /// Create a bucket from [`fixtures::bucket_config`] and track it.
    pub async fn create_bucket(&self, name: &str) -> Result<()> {
        self.client
            .storage()?
            .create_bucket(&fixtures::bucket_config(name))
            .await?;
        self.lock().buckets.push(name.to_string());
        Ok(())
    }

    /// Create a database from [`fixtures::db_config`] and track it.
    pub async fn create_db(&self, name: &str) -> Result<DbInstance> {
        let db = self
            .client
            .database()?
            .create_db(&fixtures::db_config(name))
            .await?;
        self.lock().dbs.push(db.id.clone());
        Ok(db)
    }

    /// Poll `get_vm` until the VM reports `expected`.
    ///
    /// Lookup errors while polling are logged and polling continues. Gives up
    /// with a timed-out `NetworkTimeout` after the harness timeout.
    pub async fn wait_for_vm_state(&self, id: &str, expected: VmState) -> Result<Vm> {
        let compute = self.client.compute()?;
        let polling = async {
            loop {
                match compute.get_vm(id).await {
                    Ok(vm) if vm.state == expected => return vm,
                    Ok(vm) => {
                        tracing::debug!(vm = id, current = %vm.state, wanted = %expected, "Waiting for VM state");
                    }
                    Err(err) => tracing::debug!(vm = id, error = %err, "VM lookup failed while polling"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        tokio::time::timeout(self.timeout, polling)
            .await
            .map_err(|_| self.timed_out("compute", "WaitForVMState", id, &expected.to_string()))
    }

    /// Poll `get_db` until the instance reports `expected`.
    pub async fn wait_for_db_status(&self, id: &str, expected: DbStatus) -> Result<DbInstance> {
        let database = self.client.database()?;
        let polling = async {
            loop {
                match database.get_db(id).await {
                    Ok(db) if db.status == expected => return db,
                    Ok(db) => {
                        tracing::debug!(db = id, current = %db.status, wanted = %expected, "Waiting for database status");
                    }
                    Err(err) => tracing::debug!(db = id, error = %err, "Database lookup failed while polling"),
                }
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        tokio::time::timeout(self.timeout, polling)
            .await
            .map_err(|_| self.timed_out("database", "WaitForDBState", id, &expected.to_string()))
    }

    fn timed_out(&self, service: &str, operation: &str, id: &str, expected: &str) -> CloudError {
        CloudError::timed_out(self.origin(service, operation))
            .with_metadata("resource_id", id)
            .with_metadata("expected_state", expected)
            .with_suggestions([format!(
                "'{id}' did not reach '{expected}' within {:?}",
                self.timeout
            )])
    }

    /// Delete every tracked resource: VMs, then buckets (emptied first), then
    /// databases.
    ///
    /// Failures do not stop the sweep; they are logged and returned. Tracking
    /// is cleared either way. Returns nothing when cleanup is disabled.
    pub async fn cleanup(&self) -> Vec<CloudError> {
        if !self.cleanup {
            tracing::info!("Cleanup disabled, leaving resources in place");
            return Vec::new();
        }
        let tracked = std::mem::take(&mut *self.lock());
        let mut failures = Vec::new();

        if !tracked.vms.is_empty() {
            match self.client.compute() {
                Ok(compute) => {
                    for id in &tracked.vms {
                        if let Err(err) = compute.delete_vm(id).await {
                            failures.push(err);
                        }
                    }
                }
                Err(err) => failures.push(err),
            }
        }

        if !tracked.buckets.is_empty() {
            match self.client.storage() {
                Ok(storage) => {
                    for bucket in &tracked.buckets {
                        if let Ok(objects) = storage.list_objects(bucket).await {
                            for object in objects {
                                if let Err(err) = storage.delete_object(bucket, &object.key).await {
                                    failures.push(err);
                                }
                            }
                        }
                        if let Err(err) = storage.delete_bucket(bucket).await {
                            failures.push(err);
                        }
                    }
                }
                Err(err) => failures.push(err),
            }
        }

        if !tracked.dbs.is_empty() {
            match self.client.database() {
                Ok(database) => {
                    for id in &tracked.dbs {
                        if let Err(err) = database.delete_db(id).await {
                            failures.push(err);
                        }
                    }
                }
                Err(err) => failures.push(err),
            }
        }

        for err in &failures {
            tracing::warn!(error = %err, "Cleanup step failed");
        }
        tracing::info!(
            vms = tracked.vms.len(),
            buckets = tracked.buckets.len(),
            dbs = tracked.dbs.len(),
            failures = failures.len(),
            "Integration cleanup finished"
        );
        failures
    }
}

impl std::fmt::Debug for IntegrationHarness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationHarness")
            .field("provider", &self.client.provider().name())
            .field("timeout", &self.timeout)
            .field("cleanup", &self.cleanup)
            .finish_non_exhaustive()
    }
}

/// Await `fut` and report how long it took.
pub async fn measure_latency<T>(
    name: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<(T, Duration)> {
    let start = Instant::now();
    let value = fut.await?;
    let elapsed = start.elapsed();
    tracing::info!(operation = name, elapsed_ms = elapsed.as_millis() as u64, "Operation completed");
    Ok((value, elapsed))
}

/// Run `op(0..concurrency)` as concurrent tasks and return the results in id order.
///
/// A panicking task is re-raised on the caller.
pub async fn run_concurrent<T, F, Fut>(concurrency: usize, op: F) -> Vec<Result<T>>
where
    T: Send + 'static,
    F: Fn(usize) -> Fut,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    let mut set = JoinSet::new();
    for id in 0..concurrency {
        let fut = op(id);
        set.spawn(async move { (id, fut.await) });
    }

    let mut results: Vec<(usize, Result<T>)> = Vec::with_capacity(concurrency);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(pair) => results.push(pair),
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(err) => tracing::warn!(error = %err, "Concurrent task was cancelled"),
        }
    }
    results.sort_by_key(|(id, _)| *id);
    results.into_iter().map(|(_, res)| res).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulator::ResourceSimulator;

    #[tokio::test]
    async fn tracking_follows_creates_and_cleanup() {
        let harness = IntegrationHarness::new(Arc::new(ResourceSimulator::new("us-east-1")));
        let vm = harness.create_vm("a").await.unwrap();
        harness.create_bucket("b").await.unwrap();
        let db = harness.create_db("c").await.unwrap();

        let tracked = harness.tracked();
        assert_eq!(tracked.vms, [vm.id]);
        assert_eq!(tracked.buckets, ["b"]);
        assert_eq!(tracked.dbs, [db.id]);

        assert!(harness.cleanup().await.is_empty());
        assert!(harness.tracked().is_empty());
    }

    #[tokio::test]
    async fn concurrent_results_keep_id_order() {
        let results = run_concurrent(8, |id| async move { Ok(id * 2) }).await;
        let values: Vec<usize> = results.into_iter().map(|r| r.unwrap()).collect();
        assert_eq!(values, [0, 2, 4, 6, 8, 10, 12, 14]);
    }
}
