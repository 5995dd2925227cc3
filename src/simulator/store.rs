//! In-memory resource tables and lifecycle transitions for the simulator.
//!
//! Every method is synchronous and returns owned copies; callers never get a
//! reference into the tables.

use crate::api::{
    BucketConfig, DbConfig, DbInstance, DbStatus, ObjectInfo, ResourceTag, TagFilter, Vm,
    VmConfig, VmState,
};
use crate::error::{CloudError, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

const COMPUTE: &str = "compute";
const STORAGE: &str = "storage";
const DATABASE: &str = "database";

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
    etag: String,
}

#[derive(Debug, Clone, Default)]
struct BucketRecord {
    objects: BTreeMap<String, StoredObject>,
}

/// Owned resource state of one simulator instance.
#[derive(Debug)]
pub(crate) struct Store {
    provider: String,
    region: String,
    next_seq: u64,
    vms: BTreeMap<String, Vm>,
    buckets: BTreeMap<String, BucketRecord>,
    dbs: BTreeMap<String, DbInstance>,
    /// Requested name -> stored id. Seeded responses may carry a different name.
    vm_names: BTreeMap<String, String>,
    db_names: BTreeMap<String, String>,
}

impl Store {
    pub(crate) fn new(provider: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            region: region.into(),
            next_seq: 0,
            vms: BTreeMap::new(),
            buckets: BTreeMap::new(),
            dbs: BTreeMap::new(),
            vm_names: BTreeMap::new(),
            db_names: BTreeMap::new(),
        }
    }

    /// Drop every resource. Id generation restarts as well.
    pub(crate) fn clear(&mut self) {
        self.next_seq = 0;
        self.vms.clear();
        self.buckets.clear();
        self.dbs.clear();
        self.vm_names.clear();
        self.db_names.clear();
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    fn not_found(&self, service: &str, resource: &str, id: &str) -> CloudError {
        CloudError::not_found(&self.provider, service, resource, id)
    }

    fn invalid(&self, service: &str, field: &str, reason: &str) -> CloudError {
        CloudError::invalid_config(&self.provider, service, field, reason)
    }

    fn require_name(&self, service: &str, field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(self.invalid(service, field, "must not be empty"));
        }
        Ok(())
    }

    /// Insert an empty bucket without validation.
    pub(crate) fn seed_bucket(&mut self, name: &str) {
        self.buckets.entry(name.to_string()).or_default();
    }

    /// Insert an object without validation, creating its bucket when missing.
    pub(crate) fn seed_object(&mut self, bucket: &str, key: &str, data: Vec<u8>) {
        let etag = etag_for(&data);
        self.buckets
            .entry(bucket.to_string())
            .or_default()
            .objects
            .insert(
                key.to_string(),
                StoredObject {
                    data,
                    last_modified: Utc::now(),
                    etag,
                },
            );
    }

    // -- compute --------------------------------------------------------

    pub(crate) fn create_vm(&mut self, config: &VmConfig, seeded: Option<&Vm>) -> Result<Vm> {
        self.require_name(COMPUTE, "name", &config.name)?;
        let taken = self.vm_names.contains_key(&config.name)
            || self.vms.values().any(|vm| vm.name == config.name)
            || seeded.is_some_and(|vm| self.vms.contains_key(&vm.id));
        if taken {
            return Err(CloudError::conflict(
                &self.provider,
                COMPUTE,
                "CreateVM",
                format!("VM '{}' already exists", config.name),
            )
            .with_suggestions([
                "Choose a different VM name",
                "Delete the existing VM first",
            ]));
        }

        let vm = match seeded {
            Some(vm) => vm.clone(),
            None => {
                let seq = self.next_seq();
                let host = seq % 254 + 1;
                Vm {
                    id: format!("i-{seq:017x}"),
                    name: config.name.clone(),
                    state: VmState::Running,
                    public_ip: Some(format!("203.0.113.{host}")),
                    private_ip: Some(format!("10.0.1.{host}")),
                    launch_time: Utc::now(),
                    tags: config.tags.clone(),
                }
            }
        };
        self.vm_names.insert(config.name.clone(), vm.id.clone());
        self.vms.insert(vm.id.clone(), vm.clone());
        Ok(vm)
    }

    pub(crate) fn list_vms(&self) -> Vec<Vm> {
        self.vms.values().cloned().collect()
    }

    pub(crate) fn get_vm(&self, id: &str) -> Result<Vm> {
        self.vms
            .get(id)
            .cloned()
            .ok_or_else(|| self.not_found(COMPUTE, "VM", id))
    }

    pub(crate) fn start_vm(&mut self, id: &str) -> Result<()> {
        let state = self.get_vm(id)?.state;
        let next = match state {
            VmState::Running => return Err(self.invalid(COMPUTE, "state", "VM is already running")),
            VmState::Terminated => return Err(self.invalid(COMPUTE, "state", "VM is terminated")),
            VmState::Pending | VmState::Stopped => VmState::Running,
        };
        self.set_vm_state(id, next);
        Ok(())
    }

    pub(crate) fn stop_vm(&mut self, id: &str) -> Result<()> {
        let state = self.get_vm(id)?.state;
        let next = match state {
            VmState::Stopped => return Err(self.invalid(COMPUTE, "state", "VM is already stopped")),
            VmState::Pending => return Err(self.invalid(COMPUTE, "state", "VM is not running yet")),
            VmState::Terminated => return Err(self.invalid(COMPUTE, "state", "VM is terminated")),
            VmState::Running => VmState::Stopped,
        };
        self.set_vm_state(id, next);
        Ok(())
    }

    fn set_vm_state(&mut self, id: &str, state: VmState) {
        if let Some(vm) = self.vms.get_mut(id) {
            vm.state = state;
        }
    }

    pub(crate) fn delete_vm(&mut self, id: &str) -> Result<()> {
        if self.get_vm(id)?.state == VmState::Terminated {
            return Err(self.invalid(COMPUTE, "state", "VM is already terminated"));
        }
        self.vms.remove(id);
        self.vm_names.retain(|_, vm_id| vm_id != id);
        Ok(())
    }

    // -- tagging --------------------------------------------------------

    fn require_vms(&self, resource_ids: &[String]) -> Result<()> {
        if resource_ids.is_empty() {
            return Err(self.invalid(COMPUTE, "resource_ids", "at least one resource id is required"));
        }
        match resource_ids.iter().find(|id| !self.vms.contains_key(id.as_str())) {
            Some(missing) => Err(self.not_found(COMPUTE, "VM", missing)),
            None => Ok(()),
        }
    }

    pub(crate) fn create_tags(
        &mut self,
        resource_ids: &[String],
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.require_vms(resource_ids)?;
        if tags.is_empty() {
            return Err(self.invalid(COMPUTE, "tags", "at least one tag is required"));
        }
        if tags.keys().any(|k| k.trim().is_empty()) {
            return Err(self.invalid(COMPUTE, "tags", "tag keys must not be empty"));
        }
        for id in resource_ids {
            if let Some(vm) = self.vms.get_mut(id) {
                vm.tags
                    .extend(tags.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
        }
        Ok(())
    }

    /// Removes `keys` from each resource; an empty key list removes every tag.
    pub(crate) fn delete_tags(&mut self, resource_ids: &[String], keys: &[String]) -> Result<()> {
        self.require_vms(resource_ids)?;
        for id in resource_ids {
            if let Some(vm) = self.vms.get_mut(id) {
                if keys.is_empty() {
                    vm.tags.clear();
                } else {
                    vm.tags.retain(|k, _| !keys.contains(k));
                }
            }
        }
        Ok(())
    }

    pub(crate) fn list_tags(&self, filter: &TagFilter) -> Vec<ResourceTag> {
        self.vms
            .values()
            .flat_map(|vm| {
                vm.tags.iter().map(|(key, value)| ResourceTag {
                    resource_id: vm.id.clone(),
                    resource_type: "instance".to_string(),
                    key: key.clone(),
                    value: value.clone(),
                })
            })
            .filter(|tag| filter.matches(tag))
            .collect()
    }

    // -- storage --------------------------------------------------------

    pub(crate) fn create_bucket(&mut self, config: &BucketConfig) -> Result<()> {
        self.require_name(STORAGE, "name", &config.name)?;
        if self.buckets.contains_key(&config.name) {
            return Err(CloudError::conflict(
                &self.provider,
                STORAGE,
                "CreateBucket",
                "Bucket already exists",
            )
            .with_suggestions([
                "Choose a different bucket name",
                "Delete the existing bucket first",
            ]));
        }
        self.buckets
            .insert(config.name.clone(), BucketRecord::default());
        Ok(())
    }

    pub(crate) fn list_buckets(&self) -> Vec<String> {
        self.buckets.keys().cloned().collect()
    }

    fn bucket(&self, name: &str) -> Result<&BucketRecord> {
        self.buckets
            .get(name)
            .ok_or_else(|| self.not_found(STORAGE, "bucket", name))
    }

    fn bucket_mut(&mut self, name: &str) -> Result<&mut BucketRecord> {
        let missing = self.not_found(STORAGE, "bucket", name);
        self.buckets.get_mut(name).ok_or(missing)
    }

    pub(crate) fn delete_bucket(&mut self, name: &str) -> Result<()> {
        if !self.bucket(name)?.objects.is_empty() {
            return Err(CloudError::conflict(
                &self.provider,
                STORAGE,
                "DeleteBucket",
                "Bucket is not empty",
            )
            .with_suggestions([
                "Delete all objects in the bucket first",
                "Use force delete if supported",
            ]));
        }
        self.buckets.remove(name);
        Ok(())
    }

    pub(crate) fn put_object(&mut self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.require_name(STORAGE, "key", key)?;
        let etag = etag_for(&data);
        self.bucket_mut(bucket)?.objects.insert(
            key.to_string(),
            StoredObject {
                data,
                last_modified: Utc::now(),
                etag,
            },
        );
        Ok(())
    }

    pub(crate) fn get_object(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.bucket(bucket)?
            .objects
            .get(key)
            .map(|obj| obj.data.clone())
            .ok_or_else(|| self.not_found(STORAGE, "object", key))
    }

    pub(crate) fn delete_object(&mut self, bucket: &str, key: &str) -> Result<()> {
        let missing = self.not_found(STORAGE, "object", key);
        self.bucket_mut(bucket)?
            .objects
            .remove(key)
            .map(|_| ())
            .ok_or(missing)
    }

    pub(crate) fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectInfo>> {
        Ok(self
            .bucket(bucket)?
            .objects
            .iter()
            .map(|(key, obj)| ObjectInfo {
                key: key.clone(),
                size: obj.data.len() as u64,
                last_modified: obj.last_modified,
                etag: obj.etag.clone(),
            })
            .collect())
    }

    // -- database -------------------------------------------------------

    pub(crate) fn create_db(&mut self, config: &DbConfig, seeded: Option<&DbInstance>) -> Result<DbInstance> {
        self.require_name(DATABASE, "name", &config.name)?;
        let id = seeded.map_or(config.name.as_str(), |db| db.id.as_str());
        let taken = self.db_names.contains_key(&config.name)
            || self.dbs.values().any(|db| db.name == config.name)
            || self.dbs.contains_key(id);
        if taken {
            return Err(CloudError::conflict(
                &self.provider,
                DATABASE,
                "CreateDB",
                "Database instance already exists",
            )
            .with_suggestions([
                "Choose a different database name",
                "Delete the existing database first",
            ]));
        }

        let db = match seeded {
            Some(db) => db.clone(),
            None => {
                let engine = EngineDefaults::for_engine(&config.engine);
                DbInstance {
                    id: config.name.clone(),
                    name: config.name.clone(),
                    engine: config.engine.clone(),
                    engine_version: config
                        .engine_version
                        .clone()
                        .unwrap_or_else(|| engine.version.to_string()),
                    status: DbStatus::Available,
                    endpoint: format!(
                        "{}.cluster-sim.{}.rds.amazonaws.com:{}",
                        config.name, self.region, engine.port
                    ),
                    created_at: Utc::now(),
                }
            }
        };
        self.db_names.insert(config.name.clone(), db.id.clone());
        self.dbs.insert(db.id.clone(), db.clone());
        Ok(db)
    }

    pub(crate) fn list_dbs(&self) -> Vec<DbInstance> {
        self.dbs.values().cloned().collect()
    }

    pub(crate) fn get_db(&self, id: &str) -> Result<DbInstance> {
        self.dbs
            .get(id)
            .cloned()
            .ok_or_else(|| self.not_found(DATABASE, "database instance", id))
    }

    pub(crate) fn delete_db(&mut self, id: &str) -> Result<()> {
        if self.dbs.remove(id).is_none() {
            return Err(self.not_found(DATABASE, "database instance", id));
        }
        self.db_names.retain(|_, db_id| db_id != id);
        Ok(())
    }
}

/// Default engine version and port for a database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct EngineDefaults {
    pub version: &'static str,
    pub port: u16,
}

impl EngineDefaults {
    pub(crate) fn for_engine(engine: &str) -> Self {
        let (version, port) = match engine {
            "postgres" => ("14.9", 5432),
            "mysql" => ("8.0.35", 3306),
            "mariadb" => ("10.6.15", 3306),
            "oracle-ee" | "oracle-se2" => ("19.0.0.0.ru-2023-10.rur-2023-10.r1", 1521),
            "sqlserver-ex" | "sqlserver-web" | "sqlserver-se" | "sqlserver-ee" => {
                ("15.00.4335.1.v1", 1433)
            }
            _ => ("1.0.0", 3306),
        };
        Self { version, port }
    }
}

/// Quoted hex SHA-256 of the object body.
fn etag_for(data: &[u8]) -> String {
    format!("\"{}\"", hex::encode(Sha256::digest(data)))
}
