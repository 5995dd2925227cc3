#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use uni_cloud::api::{RetryPolicy, ServiceType};
use uni_cloud::client::CloudClient;
use uni_cloud::error::{CloudError, ErrorKind};
use uni_cloud::simulator::ResourceSimulator;

pub const REGION: &str = "us-east-1";

pub fn simulator() -> ResourceSimulator {
    ResourceSimulator::new(REGION)
}

pub fn client_for(sim: &ResourceSimulator) -> CloudClient {
    CloudClient::new(sim.clone())
}

/// Simulator that only declares `services`.
pub fn limited_simulator(services: &[ServiceType]) -> ResourceSimulator {
    ResourceSimulator::builder(REGION)
        .with_supported_services(services.iter().copied())
        .build()
}

/// Fast policy for tests: 10ms base delay, doubling, capped at 100ms.
pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay_ms: 10,
        max_delay_ms: 100,
        backoff_factor: 2.0,
    }
}

pub fn simulator_error(kind: ErrorKind, service: &str, operation: &str) -> CloudError {
    CloudError::new(kind, format!("injected {}", kind.code()), "mock", service, operation)
}

/// Operation stand-in that fails with a fixed error for its first
/// `failures` calls and then succeeds with the attempt number.
#[derive(Clone)]
pub struct FlakyOperation {
    calls: Arc<AtomicU32>,
    failures: u32,
    error: CloudError,
}

impl FlakyOperation {
    pub fn new(failures: u32, error: CloudError) -> Self {
        Self {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            error,
        }
    }

    pub fn always_failing(error: CloudError) -> Self {
        Self::new(u32::MAX, error)
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn call(&self) -> Result<u32, CloudError> {
        let attempt = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.failures {
            Err(self.error.clone())
        } else {
            Ok(attempt)
        }
    }
}
