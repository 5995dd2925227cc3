//! In-memory provider for tests and local development.
//!
//! [`ResourceSimulator`] implements [`CloudProvider`] and all service traits
//! over owned resource tables. Every call goes through the same pipeline:
//!
//! 1. sleep for the configured per-method delay, if any
//! 2. return the injected error for the method, if one is configured
//! 3. otherwise run the resource logic
//! 4. record the call, its arguments and its outcome
//!
//! Steps 2-4 run under one write lock, so concurrent callers never observe a
//! state change without its matching record.

pub mod recorder;
pub mod scenario;
mod store;

pub use recorder::{Operation, OperationRecorder};
pub use scenario::{InjectedError, SimulatorScenario};

use crate::api::{
    BucketConfig, CapabilitySet, DbConfig, DbInstance, Feature, ObjectInfo, ResourceTag,
    ServiceType, TagFilter, Vm, VmConfig,
};
use crate::error::{CloudError, Result};
use crate::traits::{
    CloudProvider, ComputeService, DatabaseService, StorageService, TaggingService,
};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use store::Store;

/// Provider name reported by the simulator unless overridden.
pub const DEFAULT_NAME: &str = "mock";

/// Region used by [`ResourceSimulator::from_scenario`] when the scenario names none.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Method names used for error injection, delays and the call log.
pub mod method {
    use crate::api::ServiceType;

    pub const CREATE_VM: &str = "CreateVM";
    pub const LIST_VMS: &str = "ListVMs";
    pub const GET_VM: &str = "GetVM";
    pub const START_VM: &str = "StartVM";
    pub const STOP_VM: &str = "StopVM";
    pub const DELETE_VM: &str = "DeleteVM";
    pub const CREATE_TAGS: &str = "CreateTags";
    pub const DELETE_TAGS: &str = "DeleteTags";
    pub const LIST_TAGS: &str = "ListTags";
    pub const CREATE_BUCKET: &str = "CreateBucket";
    pub const LIST_BUCKETS: &str = "ListBuckets";
    pub const DELETE_BUCKET: &str = "DeleteBucket";
    pub const PUT_OBJECT: &str = "PutObject";
    pub const GET_OBJECT: &str = "GetObject";
    pub const DELETE_OBJECT: &str = "DeleteObject";
    pub const LIST_OBJECTS: &str = "ListObjects";
    pub const CREATE_DB: &str = "CreateDB";
    pub const LIST_DBS: &str = "ListDBs";
    pub const GET_DB: &str = "GetDB";
    pub const DELETE_DB: &str = "DeleteDB";

    pub const ALL: [&str; 20] = [
        CREATE_VM,
        LIST_VMS,
        GET_VM,
        START_VM,
        STOP_VM,
        DELETE_VM,
        CREATE_TAGS,
        DELETE_TAGS,
        LIST_TAGS,
        CREATE_BUCKET,
        LIST_BUCKETS,
        DELETE_BUCKET,
        PUT_OBJECT,
        GET_OBJECT,
        DELETE_OBJECT,
        LIST_OBJECTS,
        CREATE_DB,
        LIST_DBS,
        GET_DB,
        DELETE_DB,
    ];

    /// Service a method belongs to. Tagging methods belong to compute.
    pub fn service_of(method: &str) -> Option<ServiceType> {
        match method {
            CREATE_VM | LIST_VMS | GET_VM | START_VM | STOP_VM | DELETE_VM | CREATE_TAGS
            | DELETE_TAGS | LIST_TAGS => Some(ServiceType::Compute),
            CREATE_BUCKET | LIST_BUCKETS | DELETE_BUCKET | PUT_OBJECT | GET_OBJECT
            | DELETE_OBJECT | LIST_OBJECTS => Some(ServiceType::Storage),
            CREATE_DB | LIST_DBS | GET_DB | DELETE_DB => Some(ServiceType::Database),
            _ => None,
        }
    }
}

#[derive(Debug)]
struct SimulatorConfig {
    name: String,
    region: String,
    services: CapabilitySet,
    features: Vec<Feature>,
    errors: HashMap<String, CloudError>,
    delays: HashMap<String, Duration>,
    vm_responses: HashMap<String, Vm>,
    db_responses: HashMap<String, DbInstance>,
}

#[derive(Debug)]
struct SimulatorState {
    store: Store,
    recorder: OperationRecorder,
}

/// Configurable in-memory cloud provider.
///
/// Clones share configuration, resources and the call log.
///
/// ```
/// use uni_cloud::error::{CloudError, ErrorKind};
/// use uni_cloud::simulator::{method, ResourceSimulator};
/// use std::time::Duration;
///
/// let sim = ResourceSimulator::builder("us-west-2")
///     .with_delay(method::LIST_VMS, Duration::from_millis(50))
///     .with_error(
///         method::CREATE_BUCKET,
///         CloudError::new(ErrorKind::RateLimited, "slow down", "mock", "storage", "CreateBucket"),
///     )
///     .build();
/// assert_eq!(sim.call_count(method::CREATE_BUCKET), 0);
/// ```
#[derive(Clone)]
pub struct ResourceSimulator {
    config: Arc<SimulatorConfig>,
    state: Arc<RwLock<SimulatorState>>,
}

impl ResourceSimulator {
    /// A simulator offering every service, with no injected behavior.
    pub fn new(region: impl Into<String>) -> Self {
        Self::builder(region).build()
    }

    pub fn builder(region: impl Into<String>) -> SimulatorBuilder {
        SimulatorBuilder::new(region)
    }

    /// Build a simulator from a validated [`SimulatorScenario`].
    pub fn from_scenario(scenario: &SimulatorScenario) -> Result<Self> {
        Ok(Self::builder(DEFAULT_REGION)
            .with_scenario(scenario)?
            .build())
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.read_state().recorder.call_count(method)
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.read_state().recorder.was_called(method)
    }

    /// Arguments of the most recent call to `method`.
    pub fn last_args(&self, method: &str) -> Option<Vec<Value>> {
        self.read_state().recorder.last_args(method)
    }

    /// Snapshot of the call log, oldest first.
    pub fn all_operations(&self) -> Vec<Operation> {
        self.read_state().recorder.all_operations()
    }

    pub fn operations_for(&self, method: &str) -> Vec<Operation> {
        self.read_state().recorder.operations_for(method)
    }

    /// Drop all resources and the call log. Injected errors, delays and canned
    /// responses stay configured; seeded buckets are gone.
    pub fn reset(&self) {
        let mut state = self.write_state();
        state.store.clear();
        state.recorder.clear();
        tracing::debug!(provider = %self.config.name, "Simulator reset");
    }

    fn read_state(&self) -> RwLockReadGuard<'_, SimulatorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, SimulatorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    async fn invoke<T, F>(&self, method: &'static str, args: Vec<Value>, op: F) -> Result<T>
    where
        T: Serialize,
        F: FnOnce(&mut Store) -> Result<T>,
    {
        self.invoke_summarized(method, args, op, to_record::<T>).await
    }

    /// Like `invoke`, but `summarize` decides what the call log keeps of a success.
    async fn invoke_summarized<T, F, S>(
        &self,
        method: &'static str,
        args: Vec<Value>,
        op: F,
        summarize: S,
    ) -> Result<T>
    where
        F: FnOnce(&mut Store) -> Result<T>,
        S: FnOnce(&T) -> Option<Value>,
    {
        if let Some(delay) = self.config.delays.get(method) {
            tracing::debug!(method, delay_ms = delay.as_millis() as u64, "Simulating latency");
            tokio::time::sleep(*delay).await;
        }

        let mut state = self.write_state();
        let outcome = match self.config.errors.get(method) {
            Some(err) => {
                tracing::debug!(method, error = %err, "Returning injected error");
                Err(err.clone())
            }
            None => op(&mut state.store),
        };
        let (result, error) = match &outcome {
            Ok(value) => (summarize(value), None),
            Err(err) => (None, Some(err.clone())),
        };
        state.recorder.record(method, args, result, error);
        outcome
    }
}

impl std::fmt::Debug for ResourceSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceSimulator")
            .field("name", &self.config.name)
            .field("region", &self.config.region)
            .field("services", &self.config.services)
            .finish_non_exhaustive()
    }
}

fn arg(value: impl Serialize) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

fn to_record<T: Serialize>(value: &T) -> Option<Value> {
    match serde_json::to_value(value) {
        Ok(Value::Null) | Err(_) => None,
        Ok(v) => Some(v),
    }
}

/// Builder for [`ResourceSimulator`].
#[derive(Debug)]
pub struct SimulatorBuilder {
    config: SimulatorConfig,
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
}

impl SimulatorBuilder {
    fn new(region: impl Into<String>) -> Self {
        Self {
            config: SimulatorConfig {
                name: DEFAULT_NAME.to_string(),
                region: region.into(),
                services: CapabilitySet::all(),
                features: Vec::new(),
                errors: HashMap::new(),
                delays: HashMap::new(),
                vm_responses: HashMap::new(),
                db_responses: HashMap::new(),
            },
            buckets: BTreeMap::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Restrict the declared capability set.
    pub fn with_supported_services(
        mut self,
        services: impl IntoIterator<Item = ServiceType>,
    ) -> Self {
        self.config.services = services.into_iter().collect();
        self
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        for feature in features {
            if !self.config.features.contains(&feature) {
                self.config.features.push(feature);
            }
        }
        self
    }

    /// Return `vm` verbatim from `CreateVM` when the config's name matches.
    pub fn with_vm_response(mut self, name: impl Into<String>, vm: Vm) -> Self {
        self.config.vm_responses.insert(name.into(), vm);
        self
    }

    /// Return `db` verbatim from `CreateDB` when the config's name matches.
    pub fn with_db_response(mut self, name: impl Into<String>, db: DbInstance) -> Self {
        self.config.db_responses.insert(name.into(), db);
        self
    }

    /// Pre-create an empty bucket.
    pub fn with_bucket(mut self, name: impl Into<String>) -> Self {
        self.buckets.entry(name.into()).or_default();
        self
    }

    /// Pre-store an object, creating its bucket if needed.
    pub fn with_object(
        mut self,
        bucket: impl Into<String>,
        key: impl Into<String>,
        data: impl Into<Vec<u8>>,
    ) -> Self {
        self.buckets
            .entry(bucket.into())
            .or_default()
            .insert(key.into(), data.into());
        self
    }

    /// Fail every call to `method` with `error`.
    pub fn with_error(mut self, method: impl Into<String>, error: CloudError) -> Self {
        self.config.errors.insert(method.into(), error);
        self
    }

    /// Sleep for `delay` before handling every call to `method`.
    pub fn with_delay(mut self, method: impl Into<String>, delay: Duration) -> Self {
        self.config.delays.insert(method.into(), delay);
        self
    }

    /// Layer a scenario over the current configuration.
    pub fn with_scenario(mut self, scenario: &SimulatorScenario) -> Result<Self> {
        scenario.validate()?;
        if let Some(region) = &scenario.region {
            self.config.region = region.clone();
        }
        if let Some(services) = &scenario.supported_services {
            self.config.services = services.clone();
        }
        self = self.with_features(scenario.features.iter().copied());
        for (name, injected) in &scenario.errors {
            let service = method::service_of(name)
                .map(|s| s.as_str())
                .unwrap_or_default();
            let error = CloudError::new(
                injected.kind,
                &injected.message,
                &self.config.name,
                service,
                name,
            )
            .with_suggestions(injected.suggestions.iter().cloned());
            self.config.errors.insert(name.clone(), error);
        }
        for (name, ms) in &scenario.delays_ms {
            self.config
                .delays
                .insert(name.clone(), Duration::from_millis(*ms));
        }
        for (bucket, objects) in &scenario.buckets {
            self = self.with_bucket(bucket);
            for (key, content) in objects {
                self = self.with_object(bucket, key, content.as_bytes());
            }
        }
        Ok(self)
    }

    pub fn build(self) -> ResourceSimulator {
        let mut store = Store::new(&self.config.name, &self.config.region);
        for (bucket, objects) in self.buckets {
            store.seed_bucket(&bucket);
            for (key, data) in objects {
                store.seed_object(&bucket, &key, data);
            }
        }
        tracing::debug!(
            provider = %self.config.name,
            region = %self.config.region,
            services = %self.config.services,
            "Built resource simulator"
        );
        ResourceSimulator {
            config: Arc::new(self.config),
            state: Arc::new(RwLock::new(SimulatorState {
                store,
                recorder: OperationRecorder::new(),
            })),
        }
    }
}

impl CloudProvider for ResourceSimulator {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn region(&self) -> &str {
        &self.config.region
    }

    fn supported_services(&self) -> CapabilitySet {
        self.config.services.clone()
    }

    fn supported_features(&self) -> Vec<Feature> {
        self.config.features.clone()
    }

    fn compute(&self) -> Result<Arc<dyn ComputeService>> {
        self.offers(ServiceType::Compute)?;
        Ok(Arc::new(SimulatedCompute { sim: self.clone() }))
    }

    fn storage(&self) -> Result<Arc<dyn StorageService>> {
        self.offers(ServiceType::Storage)?;
        Ok(Arc::new(SimulatedStorage { sim: self.clone() }))
    }

    fn database(&self) -> Result<Arc<dyn DatabaseService>> {
        self.offers(ServiceType::Database)?;
        Ok(Arc::new(SimulatedDatabase { sim: self.clone() }))
    }
}

impl ResourceSimulator {
    fn offers(&self, service: ServiceType) -> Result<()> {
        if self.config.services.contains(service) {
            Ok(())
        } else {
            Err(CloudError::service_not_supported(&self.config.name, service))
        }
    }
}

struct SimulatedCompute {
    sim: ResourceSimulator,
}

#[async_trait]
impl ComputeService for SimulatedCompute {
    async fn create_vm(&self, config: &VmConfig) -> Result<Vm> {
        let seeded = self.sim.config.vm_responses.get(&config.name);
        self.sim
            .invoke(method::CREATE_VM, vec![arg(config)], |s| {
                s.create_vm(config, seeded)
            })
            .await
    }

    async fn list_vms(&self) -> Result<Vec<Vm>> {
        self.sim
            .invoke(method::LIST_VMS, Vec::new(), |s| Ok(s.list_vms()))
            .await
    }

    async fn get_vm(&self, id: &str) -> Result<Vm> {
        self.sim
            .invoke(method::GET_VM, vec![arg(id)], |s| s.get_vm(id))
            .await
    }

    async fn start_vm(&self, id: &str) -> Result<()> {
        self.sim
            .invoke(method::START_VM, vec![arg(id)], |s| s.start_vm(id))
            .await
    }

    async fn stop_vm(&self, id: &str) -> Result<()> {
        self.sim
            .invoke(method::STOP_VM, vec![arg(id)], |s| s.stop_vm(id))
            .await
    }

    async fn delete_vm(&self, id: &str) -> Result<()> {
        self.sim
            .invoke(method::DELETE_VM, vec![arg(id)], |s| s.delete_vm(id))
            .await
    }

    fn tagging(&self) -> Option<Arc<dyn TaggingService>> {
        if self.sim.config.features.contains(&Feature::Tagging) {
            Some(Arc::new(SimulatedTagging {
                sim: self.sim.clone(),
            }))
        } else {
            None
        }
    }
}

struct SimulatedTagging {
    sim: ResourceSimulator,
}

#[async_trait]
impl TaggingService for SimulatedTagging {
    async fn create_tags(
        &self,
        resource_ids: &[String],
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.sim
            .invoke(
                method::CREATE_TAGS,
                vec![arg(resource_ids), arg(tags)],
                |s| s.create_tags(resource_ids, tags),
            )
            .await
    }

    async fn delete_tags(&self, resource_ids: &[String], keys: &[String]) -> Result<()> {
        self.sim
            .invoke(
                method::DELETE_TAGS,
                vec![arg(resource_ids), arg(keys)],
                |s| s.delete_tags(resource_ids, keys),
            )
            .await
    }

    async fn list_tags(&self, filter: &TagFilter) -> Result<Vec<ResourceTag>> {
        self.sim
            .invoke(method::LIST_TAGS, vec![arg(filter)], |s| {
                Ok(s.list_tags(filter))
            })
            .await
    }
}

struct SimulatedStorage {
    sim: ResourceSimulator,
}

#[async_trait]
impl StorageService for SimulatedStorage {
    async fn create_bucket(&self, config: &BucketConfig) -> Result<()> {
        self.sim
            .invoke(method::CREATE_BUCKET, vec![arg(config)], |s| {
                s.create_bucket(config)
            })
            .await
    }

    async fn list_buckets(&self) -> Result<Vec<String>> {
        self.sim
            .invoke(method::LIST_BUCKETS, Vec::new(), |s| Ok(s.list_buckets()))
            .await
    }

    async fn delete_bucket(&self, name: &str) -> Result<()> {
        self.sim
            .invoke(method::DELETE_BUCKET, vec![arg(name)], |s| {
                s.delete_bucket(name)
            })
            .await
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        // Bodies are logged by size only, here and in GetObject results.
        let args = vec![arg(bucket), arg(key), arg(body.len())];
        self.sim
            .invoke(method::PUT_OBJECT, args, |s| s.put_object(bucket, key, body))
            .await
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.sim
            .invoke_summarized(
                method::GET_OBJECT,
                vec![arg(bucket), arg(key)],
                |s| s.get_object(bucket, key),
                |body: &Vec<u8>| Some(Value::from(body.len())),
            )
            .await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.sim
            .invoke(method::DELETE_OBJECT, vec![arg(bucket), arg(key)], |s| {
                s.delete_object(bucket, key)
            })
            .await
    }

    async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        self.sim
            .invoke(method::LIST_OBJECTS, vec![arg(bucket)], |s| {
                s.list_objects(bucket)
            })
            .await
    }
}

struct SimulatedDatabase {
    sim: ResourceSimulator,
}

#[async_trait]
impl DatabaseService for SimulatedDatabase {
    async fn create_db(&self, config: &DbConfig) -> Result<DbInstance> {
        let seeded = self.sim.config.db_responses.get(&config.name);
        self.sim
            .invoke(method::CREATE_DB, vec![arg(config)], |s| {
                s.create_db(config, seeded)
            })
            .await
    }

    async fn list_dbs(&self) -> Result<Vec<DbInstance>> {
        self.sim
            .invoke(method::LIST_DBS, Vec::new(), |s| Ok(s.list_dbs()))
            .await
    }

    async fn get_db(&self, id: &str) -> Result<DbInstance> {
        self.sim
            .invoke(method::GET_DB, vec![arg(id)], |s| s.get_db(id))
            .await
    }

    async fn delete_db(&self, id: &str) -> Result<()> {
        self.sim
            .invoke(method::DELETE_DB, vec![arg(id)], |s| s.delete_db(id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn method_table_covers_every_service() {
        for name in method::ALL {
            assert!(method::service_of(name).is_some(), "{name} has no service");
        }
        assert_eq!(method::service_of("Frobnicate"), None);
    }

    #[test]
    fn unsupported_service_accessor_fails() {
        let sim = ResourceSimulator::builder("us-east-1")
            .with_supported_services([ServiceType::Storage])
            .build();
        let err = sim.compute().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::ServiceNotSupported);
        assert!(sim.storage().is_ok());
    }

    #[tokio::test]
    async fn seeded_objects_are_readable() {
        let sim = ResourceSimulator::builder("us-east-1")
            .with_object("assets", "a.txt", "A")
            .with_bucket("empty")
            .build();
        let storage = sim.storage().unwrap();
        assert_eq!(storage.get_object("assets", "a.txt").await.unwrap(), b"A");
        assert_eq!(storage.list_buckets().await.unwrap(), vec!["assets", "empty"]);
    }

    #[tokio::test]
    async fn put_object_records_size_not_body() {
        let sim = ResourceSimulator::new("us-east-1");
        let storage = sim.storage().unwrap();
        let bucket = BucketConfig {
            name: "b".into(),
            ..Default::default()
        };
        storage.create_bucket(&bucket).await.unwrap();
        storage.put_object("b", "k", vec![0; 42]).await.unwrap();
        assert_eq!(
            sim.last_args(method::PUT_OBJECT),
            Some(vec![Value::from("b"), Value::from("k"), Value::from(42)])
        );
    }

    #[tokio::test]
    async fn tagging_requires_feature() {
        let plain = ResourceSimulator::new("us-east-1");
        assert!(plain.compute().unwrap().tagging().is_none());

        let tagged = ResourceSimulator::builder("us-east-1")
            .with_features([Feature::Tagging])
            .build();
        assert!(tagged.compute().unwrap().tagging().is_some());
    }
}
