use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use uni_cloud::api::{DbInstance, DbStatus, Feature, TagFilter, Vm, VmState};
use uni_cloud::error::ErrorKind;
use uni_cloud::simulator::{ResourceSimulator, SimulatorScenario, method};
use uni_cloud::testing::fixtures;
use uni_cloud::traits::CloudProvider;
mod common;
use common::{REGION, simulator, simulator_error};

#[tokio::test]
async fn test_vm_lifecycle_and_state_transitions() {
    let sim = simulator();
    let compute = sim.compute().unwrap();

    let vm = compute.create_vm(&fixtures::vm_config("web-1")).await.unwrap();
    assert!(vm.id.starts_with("i-"));
    assert_eq!(vm.id.len(), 19);
    assert_eq!(vm.state, VmState::Running);
    assert!(vm.public_ip.as_deref().unwrap().starts_with("203.0.113."));
    assert!(vm.private_ip.as_deref().unwrap().starts_with("10.0.1."));
    assert_eq!(vm.tags["Environment"], "test");

    let err = compute.start_vm(&vm.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);

    compute.stop_vm(&vm.id).await.unwrap();
    assert_eq!(compute.get_vm(&vm.id).await.unwrap().state, VmState::Stopped);

    let err = compute.stop_vm(&vm.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);

    compute.start_vm(&vm.id).await.unwrap();
    assert_eq!(compute.get_vm(&vm.id).await.unwrap().state, VmState::Running);

    compute.delete_vm(&vm.id).await.unwrap();
    let err = compute.get_vm(&vm.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert!(compute.list_vms().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_vm_ids_are_unique_and_names_conflict() {
    let sim = simulator();
    let compute = sim.compute().unwrap();

    let a = compute.create_vm(&fixtures::vm_config("a")).await.unwrap();
    let b = compute.create_vm(&fixtures::vm_config("b")).await.unwrap();
    assert_ne!(a.id, b.id);

    let err = compute.create_vm(&fixtures::vm_config("a")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceConflict);
    assert_eq!(compute.list_vms().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_operations_on_missing_vm_fail_with_not_found() {
    let compute = simulator().compute().unwrap();
    for res in [
        compute.start_vm("i-missing").await,
        compute.stop_vm("i-missing").await,
        compute.delete_vm("i-missing").await,
    ] {
        assert_eq!(res.unwrap_err().kind(), ErrorKind::ResourceNotFound);
    }
}

#[tokio::test]
async fn test_bucket_and_object_lifecycle() {
    let sim = simulator();
    let storage = sim.storage().unwrap();

    storage
        .create_bucket(&fixtures::bucket_config("assets"))
        .await
        .unwrap();
    let err = storage
        .create_bucket(&fixtures::bucket_config("assets"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceConflict);

    storage
        .put_object("assets", "logo.txt", b"hello".to_vec())
        .await
        .unwrap();
    assert_eq!(storage.get_object("assets", "logo.txt").await.unwrap(), b"hello");

    let objects = storage.list_objects("assets").await.unwrap();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].key, "logo.txt");
    assert_eq!(objects[0].size, 5);
    assert!(objects[0].etag.starts_with('"'));

    let err = storage.delete_bucket("assets").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceConflict);
    assert_eq!(err.message(), "Bucket is not empty");

    storage.delete_object("assets", "logo.txt").await.unwrap();
    storage.delete_bucket("assets").await.unwrap();
    assert!(storage.list_buckets().await.unwrap().is_empty());

    let err = storage.get_object("assets", "logo.txt").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
}

#[tokio::test]
async fn test_same_content_yields_same_etag() {
    let storage = simulator().storage().unwrap();
    storage.create_bucket(&fixtures::bucket_config("b")).await.unwrap();
    storage.put_object("b", "one", b"same".to_vec()).await.unwrap();
    storage.put_object("b", "two", b"same".to_vec()).await.unwrap();
    let objects = storage.list_objects("b").await.unwrap();
    assert_eq!(objects[0].etag, objects[1].etag);
}

#[tokio::test]
async fn test_database_lifecycle_uses_engine_defaults() {
    let sim = simulator();
    let database = sim.database().unwrap();

    let mut config = fixtures::db_config("orders");
    config.engine = "mysql".into();
    config.engine_version = None;
    let db = database.create_db(&config).await.unwrap();

    assert_eq!(db.id, "orders");
    assert_eq!(db.engine_version, "8.0.35");
    assert_eq!(db.status, DbStatus::Available);
    assert_eq!(
        db.endpoint,
        format!("orders.cluster-sim.{REGION}.rds.amazonaws.com:3306")
    );

    let err = database.create_db(&config).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceConflict);

    database.delete_db("orders").await.unwrap();
    let err = database.get_db("orders").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert_eq!(err.message(), "database instance 'orders' not found");
}

#[tokio::test]
async fn test_injected_error_takes_precedence_and_is_recorded() {
    let injected = simulator_error(ErrorKind::RateLimited, "compute", method::CREATE_VM);
    let sim = ResourceSimulator::builder(REGION)
        .with_error(method::CREATE_VM, injected)
        .build();
    let compute = sim.compute().unwrap();

    let err = compute
        .create_vm(&fixtures::vm_config("web"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RateLimited);
    assert!(compute.list_vms().await.unwrap().is_empty());

    assert_eq!(sim.call_count(method::CREATE_VM), 1);
    let ops = sim.operations_for(method::CREATE_VM);
    assert!(!ops[0].succeeded());
    assert_eq!(ops[0].args[0]["name"], "web");
}

#[tokio::test(start_paused = true)]
async fn test_injected_delay_precedes_the_call() {
    let sim = ResourceSimulator::builder(REGION)
        .with_delay(method::LIST_BUCKETS, Duration::from_millis(250))
        .build();
    let storage = sim.storage().unwrap();

    let start = tokio::time::Instant::now();
    storage.list_buckets().await.unwrap();
    assert!(start.elapsed() >= Duration::from_millis(250));
    assert!(sim.was_called(method::LIST_BUCKETS));
}

#[tokio::test]
async fn test_seeded_responses_are_returned_verbatim() {
    let canned_vm = Vm {
        id: "i-canned".into(),
        name: "golden".into(),
        state: VmState::Pending,
        public_ip: None,
        private_ip: None,
        launch_time: Utc::now(),
        tags: BTreeMap::new(),
    };
    let canned_db = DbInstance {
        id: "db-canned".into(),
        name: "ledger".into(),
        engine: "postgres".into(),
        engine_version: "15.4".into(),
        status: DbStatus::Creating,
        endpoint: "ledger.internal:5432".into(),
        created_at: Utc::now(),
    };
    let sim = ResourceSimulator::builder(REGION)
        .with_vm_response("golden", canned_vm.clone())
        .with_db_response("ledger", canned_db.clone())
        .build();

    let compute = sim.compute().unwrap();
    assert_eq!(
        compute.create_vm(&fixtures::vm_config("golden")).await.unwrap(),
        canned_vm
    );
    // A seeded VM is stored, so lifecycle rules apply to it.
    let err = compute.stop_vm("i-canned").await.unwrap_err();
    assert_eq!(err.message(), "Invalid configuration for field 'state': VM is not running yet");
    compute.start_vm("i-canned").await.unwrap();

    let database = sim.database().unwrap();
    assert_eq!(
        database.create_db(&fixtures::db_config("ledger")).await.unwrap(),
        canned_db
    );
    assert_eq!(database.get_db("db-canned").await.unwrap(), canned_db);
}

#[tokio::test]
async fn test_second_create_against_seeded_response_conflicts() {
    let seeded = DbInstance {
        id: "db-seeded".into(),
        name: "orders-prod".into(),
        engine: "postgres".into(),
        engine_version: "14.9".into(),
        status: DbStatus::Available,
        endpoint: "orders-prod.internal:5432".into(),
        created_at: Utc::now(),
    };
    let sim = ResourceSimulator::builder(REGION)
        .with_db_response("orders", seeded.clone())
        .build();
    let database = sim.database().unwrap();

    assert_eq!(
        database.create_db(&fixtures::db_config("orders")).await.unwrap(),
        seeded
    );
    let err = database
        .create_db(&fixtures::db_config("orders"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceConflict);
    assert_eq!(database.list_dbs().await.unwrap(), vec![seeded]);
}

#[tokio::test]
async fn test_object_bodies_are_logged_by_size() {
    let sim = simulator();
    let storage = sim.storage().unwrap();
    storage.create_bucket(&fixtures::bucket_config("b")).await.unwrap();
    storage.put_object("b", "k", vec![7u8; 4096]).await.unwrap();
    storage.get_object("b", "k").await.unwrap();

    assert_eq!(
        sim.last_args(method::PUT_OBJECT),
        Some(vec![json!("b"), json!("k"), json!(4096)])
    );
    let reads = sim.operations_for(method::GET_OBJECT);
    assert_eq!(reads[0].result, Some(json!(4096)));
}

#[tokio::test]
async fn test_recorder_queries() {
    let sim = simulator();
    let compute = sim.compute().unwrap();

    assert!(!sim.was_called(method::GET_VM));
    assert!(sim.last_args(method::GET_VM).is_none());

    let _ = compute.get_vm("i-1").await;
    let _ = compute.get_vm("i-2").await;
    compute.list_vms().await.unwrap();

    assert_eq!(sim.call_count(method::GET_VM), 2);
    assert_eq!(sim.last_args(method::GET_VM), Some(vec![json!("i-2")]));
    assert_eq!(sim.last_args(method::LIST_VMS), Some(vec![]));

    let all = sim.all_operations();
    let methods: Vec<_> = all.iter().map(|op| op.method.as_str()).collect();
    assert_eq!(methods, [method::GET_VM, method::GET_VM, method::LIST_VMS]);
    assert_eq!(all[2].result, Some(json!([])));

    // The snapshot is detached from later calls.
    compute.list_vms().await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(sim.all_operations().len(), 4);
}

#[tokio::test]
async fn test_reset_clears_resources_and_log() {
    let sim = ResourceSimulator::builder(REGION)
        .with_object("seeded", "a.txt", "A")
        .with_error(
            method::DELETE_BUCKET,
            simulator_error(ErrorKind::Authorization, "storage", method::DELETE_BUCKET),
        )
        .build();
    let compute = sim.compute().unwrap();
    let first = compute.create_vm(&fixtures::vm_config("web")).await.unwrap();

    sim.reset();

    assert!(sim.all_operations().is_empty());
    assert_eq!(sim.call_count(method::CREATE_VM), 0);
    assert!(compute.list_vms().await.unwrap().is_empty());
    let storage = sim.storage().unwrap();
    assert!(storage.list_buckets().await.unwrap().is_empty());

    // Id numbering restarts; injected errors survive.
    let again = compute.create_vm(&fixtures::vm_config("web")).await.unwrap();
    assert_eq!(again.id, first.id);
    let err = storage.delete_bucket("seeded").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
}

#[tokio::test]
async fn test_clones_share_state_and_instances_do_not() {
    let sim = simulator();
    let twin = sim.clone();
    let other = simulator();

    sim.storage()
        .unwrap()
        .create_bucket(&fixtures::bucket_config("shared"))
        .await
        .unwrap();

    assert_eq!(twin.storage().unwrap().list_buckets().await.unwrap(), ["shared"]);
    assert_eq!(twin.call_count(method::CREATE_BUCKET), 1);
    assert!(other.storage().unwrap().list_buckets().await.unwrap().is_empty());
    assert_eq!(other.call_count(method::CREATE_BUCKET), 0);
}

#[tokio::test]
async fn test_tagging_over_vm_tags() {
    let sim = ResourceSimulator::builder(REGION)
        .with_features([Feature::Tagging])
        .build();
    let compute = sim.compute().unwrap();
    let tagging = compute.tagging().unwrap();
    let vm = compute.create_vm(&fixtures::vm_config("web")).await.unwrap();
    let ids = vec![vm.id.clone()];

    let tags = BTreeMap::from([("Team".to_string(), "data".to_string())]);
    tagging.create_tags(&ids, &tags).await.unwrap();
    let listed = tagging
        .list_tags(&TagFilter {
            keys: vec!["Team".into()],
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].resource_id, vm.id);
    assert_eq!(listed[0].resource_type, "instance");
    assert_eq!(listed[0].value, "data");

    tagging.delete_tags(&ids, &[]).await.unwrap();
    assert!(compute.get_vm(&vm.id).await.unwrap().tags.is_empty());

    let err = tagging
        .create_tags(&["i-missing".to_string()], &tags)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    let err = tagging.create_tags(&[], &tags).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    let err = tagging.create_tags(&ids, &BTreeMap::new()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);

    assert_eq!(sim.call_count(method::CREATE_TAGS), 4);
}

#[tokio::test]
async fn test_scenario_configures_simulator() {
    let scenario = SimulatorScenario::from_json_str(
        r#"{
            "region": "eu-west-1",
            "supported_services": ["storage", "database"],
            "errors": {
                "CreateDB": {
                    "kind": "INVALID_CONFIGURATION",
                    "message": "engine not allowed",
                    "suggestions": ["Use postgres"]
                }
            },
            "buckets": { "assets": { "readme.txt": "hi" } }
        }"#,
    )
    .unwrap();
    let sim = ResourceSimulator::from_scenario(&scenario).unwrap();

    assert_eq!(sim.region(), "eu-west-1");
    assert_eq!(sim.compute().err().unwrap().kind(), ErrorKind::ServiceNotSupported);

    let storage = sim.storage().unwrap();
    assert_eq!(storage.get_object("assets", "readme.txt").await.unwrap(), b"hi");

    let err = sim
        .database()
        .unwrap()
        .create_db(&fixtures::db_config("x"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidConfig);
    assert_eq!(err.message(), "engine not allowed");
    assert_eq!(err.service(), "database");
    assert_eq!(err.suggestions(), ["Use postgres"]);
}
