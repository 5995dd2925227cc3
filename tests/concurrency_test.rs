use std::collections::HashSet;
use std::time::Duration;
use uni_cloud::simulator::{ResourceSimulator, method};
use uni_cloud::testing::fixtures;
use uni_cloud::traits::CloudProvider;
mod common;
use common::{REGION, simulator};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_are_all_recorded() {
    let sim = simulator();
    let mut handles = Vec::new();
    for _ in 0..10 {
        let compute = sim.compute().unwrap();
        handles.push(tokio::spawn(async move { compute.list_vms().await }));
    }
    for handle in handles {
        let vms = handle.await.unwrap().unwrap();
        assert!(vms.is_empty());
    }
    assert_eq!(sim.call_count(method::LIST_VMS), 10);
    assert_eq!(sim.all_operations().len(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_get_distinct_ids() {
    let sim = simulator();
    let mut handles = Vec::new();
    for config in fixtures::vm_configs(50, "worker") {
        let compute = sim.compute().unwrap();
        handles.push(tokio::spawn(async move { compute.create_vm(&config).await }));
    }

    let mut ids = HashSet::new();
    for handle in handles {
        let vm = handle.await.unwrap().unwrap();
        assert!(ids.insert(vm.id));
    }

    let listed = sim.compute().unwrap().list_vms().await.unwrap();
    assert_eq!(listed.len(), 50);
    assert_eq!(sim.call_count(method::CREATE_VM), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_duplicate_name_race_has_exactly_one_winner() {
    let sim = simulator();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let storage = sim.storage().unwrap();
        handles.push(tokio::spawn(async move {
            storage.create_bucket(&fixtures::bucket_config("contended")).await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            successes += 1;
        }
    }
    assert_eq!(successes, 1);
    assert_eq!(sim.call_count(method::CREATE_BUCKET), 8);
}

#[tokio::test(start_paused = true)]
async fn test_delays_overlap_instead_of_serializing() {
    let sim = ResourceSimulator::builder(REGION)
        .with_delay(method::LIST_DBS, Duration::from_millis(200))
        .build();

    let start = tokio::time::Instant::now();
    let calls = (0..5).map(|_| {
        let database = sim.database().unwrap();
        async move { database.list_dbs().await }
    });
    for res in spawn_all(calls).await {
        res.unwrap();
    }

    // Five 200ms calls finish together, not one second later.
    assert!(start.elapsed() < Duration::from_millis(400));
    assert_eq!(sim.call_count(method::LIST_DBS), 5);
}

async fn spawn_all<F: Future>(futures: impl IntoIterator<Item = F>) -> Vec<F::Output>
where
    F: Send + 'static,
    F::Output: Send + 'static,
{
    let handles: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await.expect("task panicked"));
    }
    out
}
