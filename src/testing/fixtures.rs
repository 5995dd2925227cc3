//! Realistic request configs for tests and benchmarks.

use crate::api::{BucketConfig, DbConfig, VmConfig};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static BUCKET_SEQ: AtomicU64 = AtomicU64::new(0);

fn test_tags() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("Environment".to_string(), "test".to_string()),
        ("Purpose".to_string(), "testing".to_string()),
    ])
}

pub fn vm_config(name: &str) -> VmConfig {
    VmConfig {
        name: name.to_string(),
        image_id: "ami-0abcdef1234567890".to_string(),
        instance_type: "t3.micro".to_string(),
        key_name: Some("test-keypair".to_string()),
        security_groups: vec!["sg-test".to_string()],
        user_data: None,
        tags: test_tags(),
    }
}

pub fn bucket_config(name: &str) -> BucketConfig {
    BucketConfig {
        name: name.to_string(),
        region: Some("us-east-1".to_string()),
        versioning: false,
        acl: None,
    }
}

/// PostgreSQL 14.9 on `db.t3.micro` with 20 GB of storage.
pub fn db_config(name: &str) -> DbConfig {
    DbConfig {
        name: name.to_string(),
        engine: "postgres".to_string(),
        engine_version: Some("14.9".to_string()),
        instance_class: "db.t3.micro".to_string(),
        allocated_storage_gb: 20,
        master_username: "testuser".to_string(),
        master_password: "TestPassword123!".to_string(),
        db_name: Some("testdb".to_string()),
        vpc_security_groups: Vec::new(),
    }
}

/// `count` VM configs named `<prefix>-0`, `<prefix>-1`, ...
pub fn vm_configs(count: usize, prefix: &str) -> Vec<VmConfig> {
    (0..count)
        .map(|i| vm_config(&format!("{prefix}-{i}")))
        .collect()
}

/// Lowercase bucket name unique within this process: `<prefix>-test-<unix secs>-<seq>`.
pub fn unique_bucket_name(prefix: &str) -> String {
    let seq = BUCKET_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "{}-test-{}-{seq}",
        prefix.to_ascii_lowercase(),
        chrono::Utc::now().timestamp()
    )
}
