//! Reusable verification helpers for provider implementations.
//!
//! - [`contract`]: the [`ContractSuite`] every provider must pass
//! - [`integration`]: tracked resource creation, cleanup, and state polling
//! - [`assertions`]: panicking checks for errors, resources, and call counts
//! - [`fixtures`]: realistic request configs

pub mod assertions;
pub mod contract;
pub mod fixtures;
pub mod integration;

pub use contract::{CaseOutcome, ContractReport, ContractSuite};
pub use integration::{IntegrationHarness, TrackedResources};
