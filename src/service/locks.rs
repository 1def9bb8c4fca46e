//! Per-plan mutation locks.
//!
//! Mutating operations on the same plan are serialized so two concurrent
//! requests can never interleave a read-modify-write on the same ledger.
//! Reads never take these locks.

use crate::domain::PlanId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Lazily populated map of plan id to its mutation lock.
#[derive(Debug, Default)]
pub struct PlanLocks {
    inner: Mutex<HashMap<i64, Arc<tokio::sync::Mutex<()>>>>,
}

impl PlanLocks {
    pub fn new() -> Self {
        PlanLocks::default()
    }

    /// Get (or create) the lock for a plan. The caller holds the returned
    /// Arc and awaits the inner mutex; the map lock is only held long enough
    /// to look up the entry.
    pub fn lock_for(&self, plan_id: PlanId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry(plan_id.as_i64())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the lock entry for a plan that no longer exists. Callers still
    /// holding the Arc keep a working mutex; a later `lock_for` on the same
    /// id starts fresh.
    pub fn remove(&self, plan_id: PlanId) {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(&plan_id.as_i64());
    }
}
