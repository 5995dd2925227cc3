//! Provider-agnostic behavior checks.
//!
//! [`ContractSuite`] drives any [`CloudProvider`] through the same resource
//! lifecycles and collects every failed check instead of stopping at the
//! first one. Run it against the simulator and against real bindings; both
//! must pass unchanged.

use super::fixtures;
use crate::api::{ServiceType, VmState};
use crate::client::CloudClient;
use crate::error::{ErrorKind, Result};
use crate::traits::{CloudProvider, ComputeService, DatabaseService, StorageService};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

const VM_NAME: &str = "contract-test-vm";
const DB_NAME: &str = "contract-test-db";
const OBJECT_KEY: &str = "test-object.txt";
const OBJECT_BODY: &[u8] = b"Hello, World!";

/// Result of one contract case.
#[derive(Debug, Clone)]
pub struct CaseOutcome {
    pub name: &'static str,
    /// Set when the provider does not offer the service the case targets.
    pub skipped: bool,
    pub failures: Vec<String>,
    pub elapsed: Duration,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// All case outcomes for one provider.
#[derive(Debug, Clone)]
pub struct ContractReport {
    pub provider: String,
    pub cases: Vec<CaseOutcome>,
}

impl ContractReport {
    pub fn cases(&self) -> &[CaseOutcome] {
        &self.cases
    }

    pub fn case(&self, name: &str) -> Option<&CaseOutcome> {
        self.cases.iter().find(|c| c.name == name)
    }

    /// Every failure, prefixed with its case name.
    pub fn failures(&self) -> Vec<String> {
        self.cases
            .iter()
            .flat_map(|c| c.failures.iter().map(move |f| format!("{}: {f}", c.name)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.cases.iter().all(CaseOutcome::passed)
    }

    /// Panic with every failed check when any case failed.
    pub fn assert_passed(&self) {
        if !self.is_success() {
            panic!("{self}");
        }
    }
}

impl fmt::Display for ContractReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "contract report for provider '{}'", self.provider)?;
        for case in &self.cases {
            let status = match (case.skipped, case.passed()) {
                (true, _) => "SKIP",
                (false, true) => "PASS",
                (false, false) => "FAIL",
            };
            writeln!(f, "  [{status}] {} ({:?})", case.name, case.elapsed)?;
            for failure in &case.failures {
                writeln!(f, "      - {failure}")?;
            }
        }
        Ok(())
    }
}

/// Runs the contract cases against one provider.
pub struct ContractSuite {
    provider: Arc<dyn CloudProvider>,
    client: CloudClient,
    timeout: Duration,
}

impl ContractSuite {
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            client: CloudClient::from_arc(provider.clone()),
            provider,
            timeout: Duration::from_secs(120),
        }
    }

    /// Upper bound for each case. Defaults to two minutes.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub async fn run(&self) -> ContractReport {
        let supported = self.provider.supported_services();
        let mut cases = vec![
            self.case("provider_interface", async { self.provider_interface() })
                .await,
            self.case("service_availability", async { self.service_availability() })
                .await,
        ];
        cases.push(
            self.lifecycle("compute_lifecycle", supported.contains(ServiceType::Compute), async {
                let mut checks = Checks::default();
                if let Some(compute) = checks.ok("compute()", self.client.compute()) {
                    compute_lifecycle(compute.as_ref(), &mut checks).await;
                }
                checks
            })
            .await,
        );
        cases.push(
            self.lifecycle("storage_lifecycle", supported.contains(ServiceType::Storage), async {
                let mut checks = Checks::default();
                if let Some(storage) = checks.ok("storage()", self.client.storage()) {
                    storage_lifecycle(storage.as_ref(), &mut checks).await;
                }
                checks
            })
            .await,
        );
        cases.push(
            self.lifecycle(
                "database_lifecycle",
                supported.contains(ServiceType::Database),
                async {
                    let mut checks = Checks::default();
                    if let Some(database) = checks.ok("database()", self.client.database()) {
                        database_lifecycle(database.as_ref(), &mut checks).await;
                    }
                    checks
                },
            )
            .await,
        );

        let report = ContractReport {
            provider: self.provider.name().to_string(),
            cases,
        };
        tracing::info!(
            provider = %report.provider,
            success = report.is_success(),
            failures = report.failures().len(),
            "Contract suite finished"
        );
        report
    }

    async fn lifecycle(
        &self,
        name: &'static str,
        supported: bool,
        body: impl Future<Output = Checks>,
    ) -> CaseOutcome {
        if !supported {
            return CaseOutcome {
                name,
                skipped: true,
                failures: Vec::new(),
                elapsed: Duration::ZERO,
            };
        }
        self.case(name, body).await
    }

    async fn case(&self, name: &'static str, body: impl Future<Output = Checks>) -> CaseOutcome {
        let start = Instant::now();
        let failures = match tokio::time::timeout(self.timeout, body).await {
            Ok(checks) => checks.failures,
            Err(_) => vec![format!("timed out after {:?}", self.timeout)],
        };
        if !failures.is_empty() {
            tracing::warn!(case = name, failures = failures.len(), "Contract case failed");
        }
        CaseOutcome {
            name,
            skipped: false,
            failures,
            elapsed: start.elapsed(),
        }
    }

    fn provider_interface(&self) -> Checks {
        let mut checks = Checks::default();
        checks.check(!self.provider.name().is_empty(), || {
            "name() returned an empty string".into()
        });
        checks.check(!self.provider.region().is_empty(), || {
            "region() returned an empty string".into()
        });
        checks.check(!self.provider.supported_services().is_empty(), || {
            "supported_services() is empty".into()
        });
        for feature in self.provider.supported_features() {
            checks.check(self.client.supports(feature.service()), || {
                format!("feature '{feature}' declared without its '{}' service", feature.service())
            });
        }
        checks
    }

    fn service_availability(&self) -> Checks {
        let mut checks = Checks::default();
        for service in ServiceType::ALL {
            let outcome = match service {
                ServiceType::Compute => self.client.compute().map(drop),
                ServiceType::Storage => self.client.storage().map(drop),
                ServiceType::Database => self.client.database().map(drop),
            };
            if self.client.supports(service) {
                checks.ok(&format!("{service}() on a supported service"), outcome);
            } else {
                checks.expect_kind(
                    &format!("{service}() on an unsupported service"),
                    outcome,
                    ErrorKind::ServiceNotSupported,
                );
            }
        }
        checks
    }
}

impl fmt::Debug for ContractSuite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractSuite")
            .field("provider", &self.provider.name())
            .field("timeout", &self.timeout)
            .finish()
    }
}

async fn compute_lifecycle(compute: &dyn ComputeService, checks: &mut Checks) {
    checks.ok("list_vms before create", compute.list_vms().await);

    let Some(vm) = checks.ok("create_vm", compute.create_vm(&fixtures::vm_config(VM_NAME)).await)
    else {
        return;
    };
    checks.check(!vm.id.is_empty(), || "created VM has an empty id".into());
    checks.check(vm.name == VM_NAME, || {
        format!("created VM is named '{}', expected '{VM_NAME}'", vm.name)
    });

    if let Some(fetched) = checks.ok("get_vm", compute.get_vm(&vm.id).await) {
        checks.check(fetched.id == vm.id && fetched.name == vm.name, || {
            format!("get_vm returned {} ({}), expected {} ({})", fetched.id, fetched.name, vm.id, vm.name)
        });
    }

    if let Some(vms) = checks.ok("list_vms", compute.list_vms().await) {
        checks.check(vms.iter().any(|v| v.id == vm.id), || {
            format!("list_vms does not contain {}", vm.id)
        });
    }

    // Start/stop is optional: providers may reject it for their own reasons.
    if compute.stop_vm(&vm.id).await.is_ok() {
        if let Some(stopped) = checks.ok("get_vm after stop", compute.get_vm(&vm.id).await) {
            checks.check(stopped.state != VmState::Running, || {
                "VM still running after stop_vm".into()
            });
        }
        if compute.start_vm(&vm.id).await.is_ok() {
            if let Some(started) = checks.ok("get_vm after start", compute.get_vm(&vm.id).await) {
                checks.check(started.state != VmState::Stopped, || {
                    "VM still stopped after start_vm".into()
                });
            }
        }
    }

    checks.ok("delete_vm", compute.delete_vm(&vm.id).await);
    checks.expect_kind(
        "get_vm after delete",
        compute.get_vm(&vm.id).await,
        ErrorKind::ResourceNotFound,
    );
}

async fn storage_lifecycle(storage: &dyn StorageService, checks: &mut Checks) {
    checks.ok("list_buckets before create", storage.list_buckets().await);

    let bucket = fixtures::unique_bucket_name("contract");
    if checks
        .ok("create_bucket", storage.create_bucket(&fixtures::bucket_config(&bucket)).await)
        .is_none()
    {
        return;
    }

    if let Some(buckets) = checks.ok("list_buckets", storage.list_buckets().await) {
        checks.check(buckets.contains(&bucket), || {
            format!("list_buckets does not contain '{bucket}'")
        });
    }

    if checks
        .ok("put_object", storage.put_object(&bucket, OBJECT_KEY, OBJECT_BODY.to_vec()).await)
        .is_some()
    {
        if let Some(body) = checks.ok("get_object", storage.get_object(&bucket, OBJECT_KEY).await) {
            checks.check(body == OBJECT_BODY, || {
                format!(
                    "get_object returned {:?}, expected {:?}",
                    String::from_utf8_lossy(&body),
                    String::from_utf8_lossy(OBJECT_BODY)
                )
            });
        }

        if let Some(objects) = checks.ok("list_objects", storage.list_objects(&bucket).await) {
            match objects.iter().find(|o| o.key == OBJECT_KEY) {
                Some(info) => checks.check(info.size == OBJECT_BODY.len() as u64, || {
                    format!("object size is {}, expected {}", info.size, OBJECT_BODY.len())
                }),
                None => checks.fail(format!("list_objects does not contain '{OBJECT_KEY}'")),
            }
        }

        checks.ok("delete_object", storage.delete_object(&bucket, OBJECT_KEY).await);
    }

    checks.ok("delete_bucket", storage.delete_bucket(&bucket).await);
}

async fn database_lifecycle(database: &dyn DatabaseService, checks: &mut Checks) {
    checks.ok("list_dbs before create", database.list_dbs().await);

    let Some(db) = checks.ok("create_db", database.create_db(&fixtures::db_config(DB_NAME)).await)
    else {
        return;
    };
    for (field, value) in [
        ("id", &db.id),
        ("name", &db.name),
        ("engine", &db.engine),
        ("endpoint", &db.endpoint),
    ] {
        checks.check(!value.is_empty(), || format!("created database has an empty {field}"));
    }

    if let Some(fetched) = checks.ok("get_db", database.get_db(&db.id).await) {
        checks.check(fetched.id == db.id && fetched.name == db.name, || {
            format!("get_db returned {} ({}), expected {} ({})", fetched.id, fetched.name, db.id, db.name)
        });
    }

    if let Some(dbs) = checks.ok("list_dbs", database.list_dbs().await) {
        checks.check(dbs.iter().any(|d| d.id == db.id), || {
            format!("list_dbs does not contain {}", db.id)
        });
    }

    checks.ok("delete_db", database.delete_db(&db.id).await);
    checks.expect_kind(
        "get_db after delete",
        database.get_db(&db.id).await,
        ErrorKind::ResourceNotFound,
    );
}

/// Failure collector for one case.
#[derive(Debug, Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn fail(&mut self, message: String) {
        self.failures.push(message);
    }

    fn check(&mut self, condition: bool, message: impl FnOnce() -> String) {
        if !condition {
            self.fail(message());
        }
    }

    fn ok<T>(&mut self, step: &str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.fail(format!("{step} failed: {err}"));
                None
            }
        }
    }

    fn expect_kind<T>(&mut self, step: &str, result: Result<T>, kind: ErrorKind) {
        match result {
            Ok(_) => self.fail(format!("{step} succeeded, expected {}", kind.code())),
            Err(err) if err.kind() != kind => {
                self.fail(format!("{step} returned {}, expected {}", err.code(), kind.code()))
            }
            Err(_) => {}
        }
    }
}
