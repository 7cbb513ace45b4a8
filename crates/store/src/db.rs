use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tibber_exporter_core::model::snapshot::MeasurementSnapshot;
use tibber_exporter_core::policy::PolicyTable;

#[derive(Clone)]
pub struct MeasurementStore {
    state: Arc<RwLock<StoreState>>,
    policy: Arc<PolicyTable>,
}

#[derive(Debug, Default)]
pub(crate) struct StoreState {
    pub(crate) snapshot: MeasurementSnapshot,
    pub(crate) samples_applied: u64,
    pub(crate) last_applied_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StoreStatus {
    pub samples_applied: u64,
    pub last_sample_ts: Option<DateTime<Utc>>,
    pub last_applied_at: Option<DateTime<Utc>>,
}

impl MeasurementStore {
    pub fn new(policy: PolicyTable) -> Self {
        Self {
            state: Arc::new(RwLock::new(StoreState::default())),
            policy: Arc::new(policy),
        }
    }

    pub fn policy(&self) -> &PolicyTable {
        &self.policy
    }

    pub fn read(&self) -> MeasurementSnapshot {
        self.state_read().snapshot
    }

    pub fn status(&self) -> StoreStatus {
        self.state_read().status()
    }

    pub fn read_with_status(&self) -> (MeasurementSnapshot, StoreStatus) {
        let state = self.state_read();
        (state.snapshot, state.status())
    }

    // `apply` never panics while holding the lock, so a poisoned lock still
    // guards a consistent snapshot.
    fn state_read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn state_write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StoreState {
    fn status(&self) -> StoreStatus {
        StoreStatus {
            samples_applied: self.samples_applied,
            last_sample_ts: self.snapshot.timestamp,
            last_applied_at: self.last_applied_at,
        }
    }
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new(PolicyTable::default())
    }
}
