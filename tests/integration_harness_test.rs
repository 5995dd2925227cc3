use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uni_cloud::api::{DbInstance, DbStatus, Vm, VmState};
use uni_cloud::error::ErrorKind;
use uni_cloud::simulator::{ResourceSimulator, method};
use uni_cloud::testing::IntegrationHarness;
use uni_cloud::testing::assertions::{
    assert_called, assert_db_valid, assert_error_kind, assert_not_called, assert_vm_valid,
};
use uni_cloud::testing::integration::{measure_latency, run_concurrent};
use uni_cloud::traits::CloudProvider;
mod common;
use common::{REGION, simulator};

fn harness(sim: &ResourceSimulator) -> IntegrationHarness {
    IntegrationHarness::new(Arc::new(sim.clone()))
}

fn pending_vm(id: &str, name: &str) -> Vm {
    Vm {
        id: id.into(),
        name: name.into(),
        state: VmState::Pending,
        public_ip: None,
        private_ip: None,
        launch_time: Utc::now(),
        tags: BTreeMap::new(),
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_vm_state_polls_until_transition() {
    let sim = ResourceSimulator::builder(REGION)
        .with_vm_response("slow-boot", pending_vm("i-00000000000000b07", "slow-boot"))
        .build();
    let harness = harness(&sim).with_poll_interval(Duration::from_secs(10));
    let vm = harness.create_vm("slow-boot").await.unwrap();
    assert_eq!(vm.state, VmState::Pending);

    let compute = sim.compute().unwrap();
    let id = vm.id.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(25)).await;
        compute.start_vm(&id).await.unwrap();
    });

    let start = Instant::now();
    let running = harness
        .wait_for_vm_state(&vm.id, VmState::Running)
        .await
        .unwrap();
    assert_eq!(running.state, VmState::Running);
    // Polls at 0s, 10s, 20s, 30s.
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_secs(30), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(31), "{elapsed:?}");
    assert_called(&sim, method::GET_VM, 4);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_vm_state_times_out() {
    let sim = simulator();
    let harness = harness(&sim).with_timeout(Duration::from_secs(60));
    let vm = harness.create_vm("web").await.unwrap();

    let start = Instant::now();
    let res = harness.wait_for_vm_state(&vm.id, VmState::Stopped).await;
    assert_error_kind(&res, ErrorKind::NetworkTimeout);

    let err = res.unwrap_err();
    assert_eq!(err.message(), "Operation timed out");
    assert_eq!(err.operation(), "WaitForVMState");
    assert!(!err.should_retry());
    assert_eq!(err.metadata()["resource_id"], vm.id);
    assert!(start.elapsed() >= Duration::from_secs(60));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_db_status() {
    let creating = DbInstance {
        id: "db-warming".into(),
        name: "warming".into(),
        engine: "postgres".into(),
        engine_version: "14.9".into(),
        status: DbStatus::Creating,
        endpoint: "warming.internal:5432".into(),
        created_at: Utc::now(),
    };
    let sim = ResourceSimulator::builder(REGION)
        .with_db_response("warming", creating)
        .build();
    let harness = harness(&sim).with_timeout(Duration::from_secs(90));

    let ready = harness.create_db("ready").await.unwrap();
    assert_db_valid(&ready);
    let ready = harness
        .wait_for_db_status(&ready.id, DbStatus::Available)
        .await
        .unwrap();
    assert_eq!(ready.status, DbStatus::Available);

    let warming = harness.create_db("warming").await.unwrap();
    let res = harness
        .wait_for_db_status(&warming.id, DbStatus::Available)
        .await;
    assert_error_kind(&res, ErrorKind::NetworkTimeout);
}

#[tokio::test]
async fn test_cleanup_empties_buckets_and_deletes_everything() {
    let sim = simulator();
    let harness = harness(&sim);
    let vm = harness.create_vm("web").await.unwrap();
    assert_vm_valid(&vm);
    harness.create_bucket("assets").await.unwrap();
    harness.create_db("orders").await.unwrap();

    let storage = harness.client().storage().unwrap();
    storage.put_object("assets", "a.txt", b"a".to_vec()).await.unwrap();
    storage.put_object("assets", "b.txt", b"b".to_vec()).await.unwrap();

    let failures = harness.cleanup().await;
    assert!(failures.is_empty(), "{failures:?}");
    assert!(harness.tracked().is_empty());

    assert!(sim.compute().unwrap().list_vms().await.unwrap().is_empty());
    assert!(storage.list_buckets().await.unwrap().is_empty());
    assert!(sim.database().unwrap().list_dbs().await.unwrap().is_empty());
    assert_called(&sim, method::DELETE_OBJECT, 2);
}

#[tokio::test]
async fn test_cleanup_reports_failures_and_keeps_going() {
    let sim = simulator();
    let harness = harness(&sim);
    let vm = harness.create_vm("gone").await.unwrap();
    harness.create_db("orders").await.unwrap();

    // Removed behind the harness's back.
    sim.compute().unwrap().delete_vm(&vm.id).await.unwrap();

    let failures = harness.cleanup().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind(), ErrorKind::ResourceNotFound);
    assert!(sim.database().unwrap().list_dbs().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cleanup_can_be_disabled() {
    let sim = simulator();
    let harness = harness(&sim).with_cleanup(false);
    harness.create_bucket("keep-me").await.unwrap();

    assert!(harness.cleanup().await.is_empty());
    assert_not_called(&sim, method::DELETE_BUCKET);
    assert_eq!(
        sim.storage().unwrap().list_buckets().await.unwrap(),
        ["keep-me"]
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_run_concurrent_creates() {
    let sim = simulator();
    let results = run_concurrent(20, |id| {
        let compute = sim.compute().unwrap();
        async move {
            compute
                .create_vm(&uni_cloud::testing::fixtures::vm_config(&format!("worker-{id}")))
                .await
        }
    })
    .await;

    assert_eq!(results.len(), 20);
    let mut ids = HashSet::new();
    for (i, res) in results.into_iter().enumerate() {
        let vm = res.unwrap();
        assert_eq!(vm.name, format!("worker-{i}"));
        assert!(ids.insert(vm.id));
    }
    assert_called(&sim, method::CREATE_VM, 20);
}

#[tokio::test(start_paused = true)]
async fn test_measure_latency_includes_injected_delay() {
    let sim = ResourceSimulator::builder(REGION)
        .with_delay(method::LIST_DBS, Duration::from_millis(200))
        .build();
    let database = sim.database().unwrap();

    let (dbs, elapsed) = measure_latency("ListDBs", database.list_dbs()).await.unwrap();
    assert!(dbs.is_empty());
    assert!(elapsed >= Duration::from_millis(200));
}
