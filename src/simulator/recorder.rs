//! Append-only log of simulated calls.

use crate::error::CloudError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

/// One recorded call, successful or not.
#[derive(Debug, Clone, Serialize)]
pub struct Operation {
    pub method: String,
    pub args: Vec<Value>,
    /// Serialized return value; `None` for failures and unit results.
    pub result: Option<Value>,
    pub error: Option<CloudError>,
    pub timestamp: DateTime<Utc>,
}

impl Operation {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Call log plus per-method counters.
///
/// Not synchronized on its own: the simulator keeps it behind the same lock
/// as the resource tables, so a record and the state change it describes are
/// observed together.
#[derive(Debug, Default)]
pub struct OperationRecorder {
    operations: Vec<Operation>,
    call_counts: HashMap<String, usize>,
    last_args: HashMap<String, Vec<Value>>,
}

impl OperationRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        method: &str,
        args: Vec<Value>,
        result: Option<Value>,
        error: Option<CloudError>,
    ) {
        *self.call_counts.entry(method.to_string()).or_insert(0) += 1;
        self.last_args.insert(method.to_string(), args.clone());
        self.operations.push(Operation {
            method: method.to_string(),
            args,
            result,
            error,
            timestamp: Utc::now(),
        });
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.call_counts.get(method).copied().unwrap_or(0)
    }

    pub fn was_called(&self, method: &str) -> bool {
        self.call_count(method) > 0
    }

    pub fn last_args(&self, method: &str) -> Option<Vec<Value>> {
        self.last_args.get(method).cloned()
    }

    /// Copy of every recorded operation, oldest first.
    pub fn all_operations(&self) -> Vec<Operation> {
        self.operations.clone()
    }

    pub fn operations_for(&self, method: &str) -> Vec<Operation> {
        self.operations
            .iter()
            .filter(|op| op.method == method)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn clear(&mut self) {
        self.operations.clear();
        self.call_counts.clear();
        self.last_args.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    #[test]
    fn counts_and_last_args() {
        let mut rec = OperationRecorder::new();
        rec.record("GetVM", vec![json!("i-1")], Some(json!({"id": "i-1"})), None);
        rec.record("GetVM", vec![json!("i-2")], None, None);
        rec.record("ListVMs", vec![], Some(json!([])), None);

        assert_eq!(rec.call_count("GetVM"), 2);
        assert_eq!(rec.call_count("DeleteVM"), 0);
        assert!(rec.was_called("ListVMs"));
        assert!(!rec.was_called("StartVM"));
        assert_eq!(rec.last_args("GetVM"), Some(vec![json!("i-2")]));
        assert_eq!(rec.last_args("StopVM"), None);
        assert_eq!(rec.len(), 3);
        assert_eq!(rec.operations_for("GetVM").len(), 2);
    }

    #[test]
    fn failures_are_recorded() {
        let mut rec = OperationRecorder::new();
        let err = CloudError::not_found("mock", "compute", "VM", "i-9");
        rec.record("GetVM", vec![json!("i-9")], None, Some(err));
        let ops = rec.all_operations();
        assert!(!ops[0].succeeded());
        assert_eq!(
            ops[0].error.as_ref().map(|e| e.kind()),
            Some(ErrorKind::ResourceNotFound)
        );
    }

    #[test]
    fn snapshot_is_detached() {
        let mut rec = OperationRecorder::new();
        rec.record("ListBuckets", vec![], None, None);
        let snapshot = rec.all_operations();
        rec.record("ListBuckets", vec![], None, None);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(rec.len(), 2);
    }

    #[test]
    fn clear_resets_everything() {
        let mut rec = OperationRecorder::new();
        rec.record("CreateDB", vec![json!({"name": "db"})], None, None);
        rec.clear();
        assert!(rec.is_empty());
        assert_eq!(rec.call_count("CreateDB"), 0);
        assert!(rec.last_args("CreateDB").is_none());
    }
}
