//! Panicking assertions for provider tests.

use crate::api::{DbInstance, Vm};
use crate::error::{ErrorKind, Result};
use crate::simulator::ResourceSimulator;
use std::fmt::Debug;

/// Assert that `result` failed with `kind`.
#[track_caller]
pub fn assert_error_kind<T: Debug>(result: &Result<T>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {kind} error, got Ok({value:?})"),
        Err(err) if err.kind() != kind => panic!("expected {kind} error, got {err}"),
        Err(_) => {}
    }
}

/// Assert that a VM carries the identifying fields every provider must fill.
#[track_caller]
pub fn assert_vm_valid(vm: &Vm) {
    assert!(!vm.id.is_empty(), "VM id is empty: {vm:?}");
    assert!(!vm.name.is_empty(), "VM name is empty: {vm:?}");
}

/// Assert that a database instance carries id, name, engine, and endpoint.
#[track_caller]
pub fn assert_db_valid(db: &DbInstance) {
    assert!(!db.id.is_empty(), "database id is empty: {db:?}");
    assert!(!db.name.is_empty(), "database name is empty: {db:?}");
    assert!(!db.engine.is_empty(), "database engine is empty: {db:?}");
    assert!(!db.endpoint.is_empty(), "database endpoint is empty: {db:?}");
}

/// Assert that the simulator recorded `method` exactly `expected` times.
#[track_caller]
pub fn assert_called(sim: &ResourceSimulator, method: &str, expected: usize) {
    let actual = sim.call_count(method);
    assert_eq!(
        actual, expected,
        "expected {method} to be called {expected} times, got {actual}"
    );
}

#[track_caller]
pub fn assert_not_called(sim: &ResourceSimulator, method: &str) {
    assert!(!sim.was_called(method), "expected {method} not to be called");
}
