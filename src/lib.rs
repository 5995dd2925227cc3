//! Provider-neutral reliability core for cloud SDK bindings.
//!
//! Uni-Cloud gives every provider binding the same error taxonomy, the same
//! retry engine, and the same behavioral test suite, and ships an in-memory
//! provider that satisfies that suite without touching a real cloud.
//!
//! # Key concepts
//!
//! - **[`CloudError`](error::CloudError)**: one error type for every provider, carrying an
//!   [`ErrorKind`](error::ErrorKind), the provider/service/operation it came from, and
//!   remediation hints. Only rate limiting and network timeouts are retryable.
//! - **[`ErrorClassifier`](classify::ErrorClassifier)**: maps a binding's native errors onto
//!   the taxonomy. [`AwsClassifier`](provider::aws::AwsClassifier) covers EC2, S3 and RDS codes.
//! - **[`RetryExecutor`](reliability::RetryExecutor)**: runs an operation under a
//!   [`RetryPolicy`](api::RetryPolicy) with exponential backoff, honoring a
//!   [`CancellationToken`] between attempts.
//! - **[`CloudProvider`](traits::CloudProvider)** and
//!   **[`CloudClient`](client::CloudClient)**: the provider contract and the capability guard
//!   that refuses services a provider does not declare.
//! - **[`ResourceSimulator`](simulator::ResourceSimulator)**: a stateful mock provider with
//!   error and latency injection and a call log.
//! - **[`ContractSuite`](testing::ContractSuite)**: lifecycle checks run identically against
//!   any provider.
//! - **[`IntegrationHarness`](testing::IntegrationHarness)**: tracked resource creation with
//!   cleanup and state polling for tests against live or simulated providers.
//!
//! # Quick start
//!
//! ```rust
//! use uni_cloud::client::CloudClient;
//! use uni_cloud::simulator::{method, ResourceSimulator};
//! use uni_cloud::testing::fixtures;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let sim = ResourceSimulator::new("us-east-1");
//! let client = CloudClient::new(sim.clone());
//!
//! let compute = client.compute()?;
//! let vm = compute.create_vm(&fixtures::vm_config("web-1")).await?;
//! compute.stop_vm(&vm.id).await?;
//!
//! assert_eq!(sim.call_count(method::CREATE_VM), 1);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod classify;
pub mod client;
pub mod error;
pub mod provider;
pub mod reliability;
pub mod simulator;
pub mod testing;
pub mod traits;

pub use tokio_util::sync::CancellationToken;
